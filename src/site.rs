//! The read side: URL routing, page handlers, file serving, cache policy.
//!
//! Routing is a small state machine over the path below the site mount,
//! tried most-specific first:
//!
//! ```text
//! YYYY/slug/slug[/]   entry page
//! YYYY/slug[/]        section page (accepts ?offset=N)
//! YYYY[/]             year page
//! (empty)             main page
//! _data/...           media files from the data directory
//! _static/...         assets from the static directory
//! ```
//!
//! Anything else is a 404. Handlers snapshot the state under a short read
//! lock, assemble a context, and render — the lock is never held while a
//! template runs.
//!
//! # Cache policy
//!
//! Year, section, and entry pages are good for a minute
//! (`public, max-age=60`). Served files get the long immutable lifetime
//! only when the request carries a query string of six or more characters,
//! the conventional sign of a checksum cache-buster; an un-busted URL must
//! stay revalidatable. Section and entry pages also emit `Link:
//! rel=prefetch` hints for their prev/next siblings, which are cacheable
//! by the same policy.

use crate::context;
use crate::http::Reply;
use crate::render::Renderer;
use crate::settings::Settings;
use crate::state::Store;
use crate::types::{is_valid_slug, SiteState, YearKey};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Minimum query-string length that marks a cache-busted file URL.
const CACHE_BUSTER_MIN_LEN: usize = 6;

/// Resolved route below the site mount.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Main,
    Year(&'a str),
    Section(&'a str, &'a str),
    Entry(&'a str, &'a str, &'a str),
    NoMatch,
}

/// Handle a request to the site mount. `path` is the URL path with the
/// mount prefix stripped and no leading slash; `query` is the raw query
/// string, if any.
pub fn handle(
    settings: &Settings,
    store: &Store,
    renderer: &Renderer,
    method: &str,
    path: &str,
    query: Option<&str>,
) -> Reply {
    if method != "GET" {
        return Reply::text(405, "Method Not Allowed.\n");
    }

    if let Some(rest) = path.strip_prefix("_data/") {
        return serve_file(&settings.data_dir, rest, query);
    }
    if let Some(rest) = path.strip_prefix("_static/") {
        return serve_file(&settings.static_dir, rest, query);
    }

    let snapshot = store.snapshot();
    match resolve(path) {
        Route::Main => main_page(&snapshot, renderer),
        Route::Year(year) => year_page(settings, &snapshot, renderer, year),
        Route::Section(year, section) => {
            section_page(settings, &snapshot, renderer, year, section, query)
        }
        Route::Entry(year, section, entry) => {
            entry_page(settings, &snapshot, renderer, year, section, entry)
        }
        Route::NoMatch => not_found(path),
    }
}

/// Match the path against the route patterns. Shape only — existence is
/// the handlers' concern.
fn resolve(path: &str) -> Route<'_> {
    // The patterns allow at most one trailing slash.
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Route::Main;
    }
    let segments: Vec<&str> = path.split('/').collect();

    let year_shaped =
        |text: &str| text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit());

    match segments.as_slice() {
        [year] if year_shaped(year) => Route::Year(year),
        [year, section] if year_shaped(year) && is_valid_slug(section) => {
            Route::Section(year, section)
        }
        [year, section, entry]
            if year_shaped(year) && is_valid_slug(section) && is_valid_slug(entry) =>
        {
            Route::Entry(year, section, entry)
        }
        _ => Route::NoMatch,
    }
}

// =========================================================================
// Page handlers
// =========================================================================

fn main_page(state: &SiteState, renderer: &Renderer) -> Reply {
    let ctx = context::main_context(state);
    render_page(renderer, "main.html", &ctx, false)
}

fn year_page(settings: &Settings, state: &SiteState, renderer: &Renderer, year: &str) -> Reply {
    let Some(year) = YearKey::parse(year).and_then(|key| state.year(key)) else {
        return not_found(year);
    };
    let ctx = context::year_context(&settings.site_root, state, year);
    render_page(renderer, "year.html", &ctx, true)
}

fn section_page(
    settings: &Settings,
    state: &SiteState,
    renderer: &Renderer,
    year: &str,
    section: &str,
    query: Option<&str>,
) -> Reply {
    let Some(year) = YearKey::parse(year).and_then(|key| state.year(key)) else {
        return not_found(year);
    };
    let Some(section) = year.section(section) else {
        return not_found(section);
    };
    let ctx = context::section_context(&settings.site_root, state, year, section, query);
    let reply = render_page(renderer, "section.html", &ctx, true);
    with_prefetch(reply, &ctx.prev, &ctx.next)
}

fn entry_page(
    settings: &Settings,
    state: &SiteState,
    renderer: &Renderer,
    year: &str,
    section: &str,
    entry: &str,
) -> Reply {
    let Some(year) = YearKey::parse(year).and_then(|key| state.year(key)) else {
        return not_found(year);
    };
    let Some(section) = year.section(section) else {
        return not_found(section);
    };
    let Some(entry) = section.entry(entry) else {
        return not_found(entry);
    };
    let ctx = context::entry_context(&settings.site_root, state, year, section, entry);
    let reply = render_page(renderer, "entry.html", &ctx, true);
    with_prefetch(reply, &ctx.prev, &ctx.next)
}

fn render_page<T: Serialize>(
    renderer: &Renderer,
    template: &str,
    ctx: &T,
    cacheable: bool,
) -> Reply {
    match renderer.render(template, ctx) {
        Ok(html) => {
            let reply = Reply::html(200, html);
            if cacheable {
                reply.with_header("Cache-Control", "public, max-age=60")
            } else {
                reply
            }
        }
        Err(err) => {
            error!(template, error = %err, "render failed");
            Reply::text(500, "Internal server error!\n")
        }
    }
}

fn with_prefetch(
    mut reply: Reply,
    prev: &Option<context::NavLink>,
    next: &Option<context::NavLink>,
) -> Reply {
    for link in [prev, next].into_iter().flatten() {
        reply = reply.with_header("Link", &format!("<{}>; rel=prefetch", link.href));
    }
    reply
}

fn not_found(what: &str) -> Reply {
    info!(what, "not found");
    Reply::text(404, "Not found.\n")
}

// =========================================================================
// File serving
// =========================================================================

/// Serve one file strictly below `root`.
///
/// The relative path must consist of plain segments: no `..`, no empty
/// segments (`//`), no `.`. Directories are not listed.
fn serve_file(root: &Path, rel: &str, query: Option<&str>) -> Reply {
    let rel = rel.strip_suffix('/').unwrap_or(rel);
    if rel.is_empty()
        || rel
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return not_found(rel);
    }

    let path = root.join(rel);
    if !path.is_file() {
        return not_found(rel);
    }
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read file");
            return Reply::text(500, "Internal server error!\n");
        }
    };

    let reply = Reply::data(200, mime_for(rel), bytes);
    if query.is_some_and(|q| q.len() >= CACHE_BUSTER_MIN_LEN) {
        reply.with_header("Cache-Control", "immutable, public, max-age=2592000")
    } else {
        reply
    }
}

fn mime_for(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("");
    match extension {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "mp4" => "video/mp4",
        "zip" => "application/zip",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
