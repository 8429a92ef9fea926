//! Asset embed HTML: the media block at the top of an entry page.
//!
//! Dispatch is a plain `match` on the closed [`Asset`] enum. Images become
//! a `<picture>` element with one `<source>` per MIME type (srcset entries
//! carry checksum cache-busters and pixel widths) and an `<img>` fallback
//! pointing at the default source. Video ids become 640×360 iframes; a
//! YouTube id may carry a `#t=<seconds>` suffix which is translated to the
//! embed player's `?start=` parameter.

use crate::types::{Asset, ImageAsset, ImageInfo};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Embed width in pixels; height follows at 16:9.
pub const EMBED_WIDTH: u32 = 640;

/// Render the embed HTML for an asset.
pub fn asset_html(asset: &Asset) -> String {
    match asset {
        Asset::Image(image) => picture_html(image),
        Asset::Youtube(video) => {
            let (id, start) = split_start_time(&video.id);
            let src = match start {
                Some(seconds) => {
                    format!("https://www.youtube.com/embed/{}?start={seconds}", escape(id))
                }
                None => format!("https://www.youtube.com/embed/{}", escape(id)),
            };
            iframe_html(&src)
        }
        Asset::Vimeo(video) => {
            iframe_html(&format!("https://player.vimeo.com/video/{}", escape(&video.id)))
        }
    }
}

/// Comma-separated srcset for a list of images: `url?checksum widthw` each.
pub fn srcset(images: &[ImageInfo]) -> String {
    images
        .iter()
        .map(|image| format!("{}?{} {}w", image.path, image.checksum, image.size.x))
        .collect::<Vec<_>>()
        .join(", ")
}

fn picture_html(image: &ImageAsset) -> String {
    // Group alternative sources by MIME type, preserving author order
    // within each group; browsers pick the first <source> they support.
    let mut by_mime: BTreeMap<&str, Vec<&ImageInfo>> = BTreeMap::new();
    for source in &image.sources {
        by_mime.entry(source.mime.as_str()).or_default().push(source);
    }

    let mut html = String::from("<picture>\n");
    for (mime, sources) in &by_mime {
        let entries: Vec<String> = sources
            .iter()
            .map(|s| format!("{}?{} {}w", s.path, s.checksum, s.size.x))
            .collect();
        let _ = writeln!(
            html,
            "  <source type=\"{}\" srcset=\"{}\">",
            escape(mime),
            escape(&entries.join(", "))
        );
    }
    let default = &image.default;
    let _ = writeln!(
        html,
        "  <img src=\"{}?{}\" width=\"{}\" height=\"{}\" alt=\"\">",
        escape(&default.path),
        escape(&default.checksum),
        default.size.x,
        default.size.y
    );
    html.push_str("</picture>\n");
    html
}

fn iframe_html(src: &str) -> String {
    let height = EMBED_WIDTH * 9 / 16;
    format!(
        "<iframe width=\"{EMBED_WIDTH}\" height=\"{height}\" src=\"{src}\" \
         frameborder=\"0\" allowfullscreen></iframe>\n"
    )
}

/// Split a `#t=<seconds>` suffix off a video id, keeping only well-formed
/// numeric start times.
fn split_start_time(id: &str) -> (&str, Option<u64>) {
    if let Some((head, tail)) = id.split_once("#t=") {
        if let Ok(seconds) = tail.parse::<u64>() {
            return (head, Some(seconds));
        }
    }
    (id, None)
}

/// Minimal attribute-value escaping for text interpolated into markup.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
