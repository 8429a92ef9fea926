//! Content entities shared across the crate.
//!
//! The archive is a three-level tree: [`Year`] → [`Section`] → [`Entry`].
//! Entities are immutable once installed; an ingestion replaces a whole
//! year or a whole section, never an entry in place. Everything derives
//! `Serialize`/`Deserialize` so a parsed [`Section`] can round-trip through
//! the on-disk aggregate cache, and `PartialEq` so tests can deep-compare
//! the cached and freshly-parsed forms.
//!
//! No entity stores a pointer back to its parent. Handlers re-derive parent
//! context from the request URL, which keeps the tree trivially
//! serializable and cycle-free.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Oldest year the archive accepts. Directory names below this are not
/// year-shaped and are skipped during the startup scan.
pub const YEAR_KEY_MIN: u16 = 1992;

/// Largest four-digit year key.
pub const YEAR_KEY_MAX: u16 = 9999;

/// A validated four-digit year key in `[1992, 9999]`.
///
/// Construction goes through [`YearKey::parse`], which accepts exactly four
/// ASCII digits inside the valid range. The key doubles as the year's
/// directory name and URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearKey(u16);

impl YearKey {
    /// Parse a year key from a path or URL segment.
    ///
    /// Returns `None` for anything that is not exactly four digits, and for
    /// four-digit values outside `[YEAR_KEY_MIN, YEAR_KEY_MAX]`. Callers
    /// that scan the data directory treat `None` as "not a year, skip".
    pub fn parse(text: &str) -> Option<YearKey> {
        if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u16 = text.parse().ok()?;
        if (YEAR_KEY_MIN..=YEAR_KEY_MAX).contains(&value) {
            Some(YearKey(value))
        } else {
            None
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The range starts at 1992, so the plain decimal form is already
        // four digits wide.
        write!(f, "{}", self.0)
    }
}

/// Check a section or entry slug: `^[a-z][a-z0-9-]*[a-z0-9]$`.
///
/// Slugs are URL path segments and directory names at the same time, so the
/// alphabet is deliberately narrow: lowercase start, lowercase/digit end,
/// dashes only in the middle, minimum length two.
pub fn is_valid_slug(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return false;
    }
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    let last = bytes[bytes.len() - 1];
    if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

/// A single servable image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Public URL of the image, rooted at the site prefix.
    pub path: String,
    /// Location on disk, for on-the-fly reads (data-URI inlining).
    pub fs_path: PathBuf,
    /// URL-safe base64 prefix of the file's SHA-256, ≥ 6 characters.
    /// Appended to URLs as a cache-buster.
    pub checksum: String,
    pub size: Resolution,
    /// MIME type, e.g. `image/jpeg`.
    pub mime: String,
}

/// Default thumbnail plus alternative sources in author order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnails {
    pub default: ImageInfo,
    pub sources: Vec<ImageInfo>,
}

/// The primary media payload of an entry.
///
/// A closed set of variants; rendering dispatches on the tag with a plain
/// `match`. Unknown tags are rejected at manifest load time, so a stored
/// entry always has one of these shapes. The manifest's `{"type", "data"}`
/// wire shape is decoded by hand in the loader; this enum's own serde form
/// (externally tagged) only travels through the binary aggregate cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Asset {
    Image(ImageAsset),
    Youtube(YoutubeAsset),
    Vimeo(VimeoAsset),
}

/// Full-size image with alternative sources, same shape as [`Thumbnails`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub default: ImageInfo,
    pub sources: Vec<ImageInfo>,
}

/// Opaque YouTube id; may carry a `#t=<seconds>` start-time suffix that the
/// embed renderer translates into a `?start=` query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoutubeAsset {
    pub id: String,
}

/// Opaque Vimeo id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VimeoAsset {
    pub id: String,
}

/// One link inside an external-links section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub href: String,
    pub contents: String,
    pub notes: String,
}

/// A named group of external links, e.g. "Download" or "View on".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLinksSection {
    pub name: String,
    pub links: Vec<ExternalLink>,
}

/// A single archive entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Slug; also the entry's directory name.
    pub key: String,
    /// Public URL of the entry page.
    pub path: String,
    pub title: String,
    pub author: String,
    /// Raw description HTML from the manifest.
    pub description: String,
    pub external_links: Vec<ExternalLinksSection>,
    pub thumbnails: Thumbnails,
    pub asset: Asset,
}

/// An ordered collection of entries within a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Slug; also the section's directory name.
    pub key: String,
    /// Public URL of the section page.
    pub path: String,
    pub name: String,
    pub description: String,
    /// Ranked sections preserve a jury order; the year page previews their
    /// top entries instead of sampling at random.
    pub is_ranked: bool,
    /// Ongoing sections have no final ranking yet, so ranked previews stay
    /// off until the flag drops.
    pub is_ongoing: bool,
    /// Entries in author-defined manifest order.
    pub entries: Vec<Entry>,
}

/// One archive year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Year {
    pub key: YearKey,
    /// Public URL of the year page.
    pub path: String,
    /// Display name. The year manifest carries no name field, so this is
    /// the decimal key as text.
    pub name: String,
    /// Sections in manifest order.
    pub sections: Vec<Section>,
}

impl Year {
    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key == key)
    }
}

impl Section {
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// Root of the in-memory archive: all years, strictly descending by key.
///
/// Years are held behind `Arc` so a reader's snapshot is a handful of
/// pointer clones taken under a short read lock; replacing a year is a
/// single slot swap.
#[derive(Debug, Clone, Default)]
pub struct SiteState {
    pub years: Vec<Arc<Year>>,
}

impl SiteState {
    pub fn new() -> SiteState {
        SiteState { years: Vec::new() }
    }

    pub fn year(&self, key: YearKey) -> Option<&Arc<Year>> {
        self.years.iter().find(|y| y.key == key)
    }

    pub fn year_index(&self, key: YearKey) -> Option<usize> {
        self.years.iter().position(|y| y.key == key)
    }

    /// "Oldest-newest" label for the main page breadcrumb, e.g.
    /// `1992-2024`. A single year collapses to its own key; an empty
    /// archive yields an empty label.
    pub fn range_label(&self) -> String {
        let newest = match self.years.first() {
            Some(year) => year.key,
            None => return String::new(),
        };
        // The list is descending, so the last element is the oldest.
        let oldest = self.years[self.years.len() - 1].key;
        if oldest == newest {
            newest.to_string()
        } else {
            format!("{oldest}-{newest}")
        }
    }
}
