//! Template loading and rendering.
//!
//! All nine templates are loaded once at startup from `--dir-templates`;
//! a missing or unparsable file is a startup failure, not a request-time
//! surprise. Pages extend `layout.html` and include the partials
//! (`thumbnails`, `breadcrumbs`, `navbar`, `yearlynavigation`), so the
//! whole set is registered together and Tera resolves the inheritance
//! chain up front.
//!
//! Registered template helpers:
//!
//! | helper | kind | purpose |
//! |---|---|---|
//! | `by` | filter | "Title by Author" label, author omitted when empty |
//! | `cut` | filter | soft-wrap long words, trim to a limit with `…` |
//! | `srcset` | filter | image list → srcset string with cache-busters |
//! | `attr` | function | emit ` name="value"` or nothing when empty |
//! | `data_uri` | function | inline a small file as a `data:` URI |
//!
//! Rendering goes into a pre-sized 64 KiB buffer; the largest production
//! pages sit well under that, so a page is normally a single allocation.

use crate::embed;
use crate::types::ImageInfo;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tera::{Tera, Value};
use thiserror::Error;

/// The complete template set; startup fails if any of these is absent.
pub const TEMPLATE_FILES: &[&str] = &[
    "layout.html",
    "main.html",
    "year.html",
    "section.html",
    "entry.html",
    "thumbnails.html",
    "breadcrumbs.html",
    "navbar.html",
    "yearlynavigation.html",
];

/// Render buffer size. Pages render fully into this buffer before the
/// response is written.
const RENDER_BUFFER_BYTES: usize = 64 * 1024;

/// Words longer than this get zero-width break opportunities.
const LONG_WORD: usize = 23;

/// Files up to this size may be inlined as data URIs.
const MAX_INLINE_BYTES: u64 = 32 * 1024;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to load templates: {0}")]
    Load(#[source] tera::Error),
    #[error("failed to render '{template}': {source}")]
    Render {
        template: String,
        #[source]
        source: tera::Error,
    },
}

/// A loaded template set, shared read-only by all worker threads.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Load every template in [`TEMPLATE_FILES`] from `dir` and register
    /// the helper filters and functions.
    pub fn load(dir: &Path) -> Result<Renderer, RenderError> {
        let mut tera = Tera::default();
        let files: Vec<_> = TEMPLATE_FILES
            .iter()
            .map(|name| (dir.join(name), Some(*name)))
            .collect();
        tera.add_template_files(files).map_err(RenderError::Load)?;

        tera.register_filter("by", by_filter);
        tera.register_filter("cut", cut_filter);
        tera.register_filter("srcset", srcset_filter);
        tera.register_function("attr", AttrFunction);
        tera.register_function("data_uri", data_uri_function);
        Ok(Renderer { tera })
    }

    /// Render `template` against `context` into a fresh page buffer.
    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<Vec<u8>, RenderError> {
        let context = tera::Context::from_serialize(context).map_err(|source| {
            RenderError::Render {
                template: template.to_string(),
                source,
            }
        })?;
        let mut buffer = Vec::with_capacity(RENDER_BUFFER_BYTES);
        self.tera
            .render_to(template, &context, &mut buffer)
            .map_err(|source| RenderError::Render {
                template: template.to_string(),
                source,
            })?;
        Ok(buffer)
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// `{{ title | by(author=entry.author) }}` → `Title by Author`.
///
/// The output goes through Tera's normal HTML escaping; the helper only
/// decides the wording, dropping the suffix when the author is empty.
fn by_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let title = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("by: value must be a string"))?;
    let author = args.get("author").and_then(Value::as_str).unwrap_or("");
    if author.is_empty() {
        Ok(Value::String(title.to_string()))
    } else {
        Ok(Value::String(format!("{title} by {author}")))
    }
}

/// `{{ text | cut(limit=60) }}` — see [`cut_string`].
fn cut_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("cut: value must be a string"))?;
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(80) as usize;
    Ok(Value::String(cut_string(text, limit)))
}

/// Word-based trim with soft wrap points.
///
/// Words longer than [`LONG_WORD`] characters get a zero-width space every
/// [`LONG_WORD`] characters so the browser can break them. Whole words are
/// accumulated until `limit` characters (zero-width spaces not counted);
/// when the text is trimmed an `…` is appended. A first word that alone
/// exceeds the limit is hard-cut so something is always shown.
pub fn cut_string(text: &str, limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for word in text.split_whitespace() {
        let length = word.chars().count();
        let space = usize::from(!out.is_empty());
        if used + space + length > limit {
            if out.is_empty() {
                out.extend(word.chars().take(limit));
            }
            out.push('…');
            return out;
        }
        if space == 1 {
            out.push(' ');
        }
        out.push_str(&soften_word(word));
        used += space + length;
    }
    out
}

fn soften_word(word: &str) -> String {
    if word.chars().count() <= LONG_WORD {
        return word.to_string();
    }
    let mut out = String::new();
    for (index, c) in word.chars().enumerate() {
        if index > 0 && index % LONG_WORD == 0 {
            out.push('\u{200B}');
        }
        out.push(c);
    }
    out
}

/// `{{ images | srcset }}` over a serialized `Vec<ImageInfo>`.
fn srcset_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let images: Vec<ImageInfo> = serde_json::from_value(value.clone())
        .map_err(|err| tera::Error::msg(format!("srcset: not an image list: {err}")))?;
    Ok(Value::String(embed::srcset(&images)))
}

/// `{{ attr(name="class", value=css_class) }}` — emits ` name="value"`,
/// or nothing at all when the value is empty, so templates don't end up
/// with dangling empty attributes.
struct AttrFunction;

impl tera::Function for AttrFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("attr: missing 'name'"))?;
        let value = args.get("value").and_then(Value::as_str).unwrap_or("");
        if value.is_empty() {
            return Ok(Value::String(String::new()));
        }
        Ok(Value::String(format!(
            " {name}=\"{}\"",
            embed::escape(value)
        )))
    }

    // The helper escapes its interpolations itself; without this the
    // emitted quotes would be entity-encoded.
    fn is_safe(&self) -> bool {
        true
    }
}

/// `{{ data_uri(path=image.fs_path, type=image.mime, fallback=image.path) }}`
///
/// Inlines small above-the-fold images as `data:` URIs to save a request;
/// anything unreadable or larger than [`MAX_INLINE_BYTES`] falls back to
/// the plain URL.
fn data_uri_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = args
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("data_uri: missing 'path'"))?;
    let mime = args
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("data_uri: missing 'type'"))?;
    let fallback = args.get("fallback").and_then(Value::as_str).unwrap_or("");

    match fs::metadata(path) {
        Ok(stat) if stat.len() <= MAX_INLINE_BYTES => match fs::read(path) {
            Ok(bytes) => Ok(Value::String(format!(
                "data:{mime};base64,{}",
                STANDARD.encode(bytes)
            ))),
            Err(_) => Ok(Value::String(fallback.to_string())),
        },
        _ => Ok(Value::String(fallback.to_string())),
    }
}
