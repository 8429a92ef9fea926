//! `meta.json` loaders for the three levels of the archive tree.
//!
//! Each level of the on-disk layout carries a manifest:
//!
//! ```text
//! 2003/meta.json                     {"sections": ["demo", "music"]}
//! 2003/demo/meta.json                {"name": ..., "entries": ["hugi", ...]}
//! 2003/demo/hugi/meta.json           {"title": ..., "asset": ..., "thumbnails": ...}
//! 2003/demo/hugi/thumbnail.png       media referenced by the entry manifest
//! ```
//!
//! All loaders share the same discipline: bounded read (a manifest larger
//! than [`MAX_MANIFEST_SIZE`] is rejected before parsing), JSON decode into
//! a raw schema struct, field validation, then conversion into the typed
//! entities of [`crate::types`] with URL and filesystem path prefixes
//! attached.
//!
//! # Read location vs. live location
//!
//! During ingestion, manifests are read out of a *staging* directory while
//! the entities they produce must point at the tree's final home (the live
//! data directory and its public URL). [`Location`] carries both: the
//! loaders read from `read_dir` but bake `live_dir`/URL prefixes into the
//! produced entities. At startup the two coincide.
//!
//! # Checksums
//!
//! Image checksums are content-derived: the URL-safe unpadded base64 of the
//! file's SHA-256. A manifest value is accepted when it is a prefix of the
//! encoded digest and at least six characters long, so authoring tools may
//! truncate at any length they like. A mismatch fails the whole entry —
//! a wrong checksum would poison long-lived caches downstream.

use crate::cache;
use crate::types::{
    is_valid_slug, Asset, Entry, ExternalLink, ExternalLinksSection, ImageAsset, ImageInfo,
    Resolution, Section, Thumbnails, VimeoAsset, Year, YearKey, YoutubeAsset,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Upper bound for a single `meta.json`: 4096 entry keys at ~50 bytes each,
/// rounded up generously.
pub const MAX_MANIFEST_SIZE: u64 = 128 * 1024;

/// Shortest accepted checksum text in a manifest.
pub const MIN_CHECKSUM_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("manifest {0} exceeds the {MAX_MANIFEST_SIZE} byte limit")]
    TooLarge(PathBuf),
    #[error("malformed manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown asset type '{0}'")]
    UnknownAssetType(String),
    #[error("invalid image metadata for '{filename}': {reason}")]
    InvalidImage {
        filename: String,
        reason: &'static str,
    },
    #[error("checksum mismatch for {path}: manifest has '{expected}'")]
    ChecksumMismatch { path: PathBuf, expected: String },
    #[error("illegal child key '{0}'")]
    IllegalChildKey(String),
    #[error("children of {dir} do not match the manifest: listed {listed:?}, found {found:?}")]
    ChildMismatch {
        dir: PathBuf,
        listed: Vec<String>,
        found: Vec<String>,
    },
}

/// Where a subtree is read from and where it will live.
///
/// `read_dir` is the directory the loader actually reads (staged during
/// ingestion, live at startup). `live_dir` and the URL prefixes describe
/// the subtree's post-install home and are what gets baked into entities.
#[derive(Debug, Clone)]
pub struct Location {
    pub read_dir: PathBuf,
    pub live_dir: PathBuf,
    /// Public URL of the page at this level, no trailing slash.
    pub page_url: String,
    /// Public URL prefix of the media files at this level.
    pub data_url: String,
}

impl Location {
    pub fn new(
        read_dir: PathBuf,
        live_dir: PathBuf,
        page_url: String,
        data_url: String,
    ) -> Location {
        Location {
            read_dir,
            live_dir,
            page_url,
            data_url,
        }
    }

    /// A location whose read and live directories coincide (startup scan).
    pub fn live(dir: PathBuf, page_url: String, data_url: String) -> Location {
        Location {
            read_dir: dir.clone(),
            live_dir: dir,
            page_url,
            data_url,
        }
    }

    /// Location of a child directory one level down.
    pub fn child(&self, segment: &str) -> Location {
        Location {
            read_dir: self.read_dir.join(segment),
            live_dir: self.live_dir.join(segment),
            page_url: format!("{}/{segment}", self.page_url),
            data_url: format!("{}/{segment}", self.data_url),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.read_dir.join("meta.json")
    }
}

// =========================================================================
// Raw JSON schemas
// =========================================================================

#[derive(Deserialize)]
struct YearMeta {
    sections: Vec<String>,
}

#[derive(Deserialize)]
struct SectionMeta {
    name: String,
    description: String,
    #[serde(rename = "is-ranked")]
    is_ranked: bool,
    #[serde(rename = "is-ongoing")]
    is_ongoing: bool,
    entries: Vec<String>,
}

#[derive(Deserialize)]
struct EntryMeta {
    title: String,
    author: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "external-links", default)]
    external_links: Vec<ExternalLinksSectionMeta>,
    asset: AssetMeta,
    thumbnails: ThumbnailsMeta,
}

#[derive(Deserialize)]
struct ExternalLinksSectionMeta {
    name: String,
    links: Vec<ExternalLinkMeta>,
}

#[derive(Deserialize)]
struct ExternalLinkMeta {
    href: String,
    contents: String,
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
struct AssetMeta {
    #[serde(rename = "type")]
    kind: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct IdMeta {
    id: String,
}

#[derive(Deserialize)]
struct ImageAssetMeta {
    default: ImageMeta,
    #[serde(default)]
    sources: Vec<ImageMeta>,
}

#[derive(Deserialize)]
struct ThumbnailsMeta {
    default: ImageMeta,
    #[serde(default)]
    sources: Vec<ImageMeta>,
}

#[derive(Deserialize)]
struct ImageMeta {
    filename: String,
    #[serde(rename = "type")]
    mime: String,
    checksum: String,
    size: SizeMeta,
}

#[derive(Deserialize)]
struct SizeMeta {
    #[serde(rename = "X")]
    x: u32,
    #[serde(rename = "Y")]
    y: u32,
}

// =========================================================================
// Loaders
// =========================================================================

/// Load a year from its directory: parse `meta.json`, then load every
/// listed section in manifest order.
pub fn load_year(loc: &Location, key: YearKey) -> Result<Year, ManifestError> {
    let meta: YearMeta = read_manifest(loc)?;
    for section_key in &meta.sections {
        if !is_valid_slug(section_key) {
            return Err(ManifestError::IllegalChildKey(section_key.clone()));
        }
    }
    verify_children_exact(&loc.read_dir, &meta.sections)?;

    let mut sections = Vec::with_capacity(meta.sections.len());
    for section_key in &meta.sections {
        sections.push(load_section(&loc.child(section_key), section_key)?);
    }

    Ok(Year {
        key,
        path: loc.page_url.clone(),
        name: key.to_string(),
        sections,
    })
}

/// Load a section from its directory.
///
/// Consults the on-disk aggregate cache first: if a cache file is present
/// and its entry-key list matches the manifest's, the cached section is
/// returned without touching the entry directories. Otherwise every listed
/// entry is loaded (the expensive path — one JSON parse plus image
/// validation per entry) and a fresh cache is written next to `meta.json`.
pub fn load_section(loc: &Location, key: &str) -> Result<Section, ManifestError> {
    let meta: SectionMeta = read_manifest(loc)?;
    for entry_key in &meta.entries {
        if !is_valid_slug(entry_key) {
            return Err(ManifestError::IllegalChildKey(entry_key.clone()));
        }
    }
    verify_children_exact(&loc.read_dir, &meta.entries)?;

    if let Some(section) = cache::load(&loc.read_dir, key, &loc.page_url, &meta.entries) {
        return Ok(section);
    }

    let mut entries = Vec::with_capacity(meta.entries.len());
    for entry_key in &meta.entries {
        entries.push(load_entry(&loc.child(entry_key), entry_key)?);
    }

    let section = Section {
        key: key.to_string(),
        path: loc.page_url.clone(),
        name: meta.name,
        description: meta.description,
        is_ranked: meta.is_ranked,
        is_ongoing: meta.is_ongoing,
        entries,
    };

    // The cache is derived data; failing to write it costs speed, not
    // correctness.
    if let Err(err) = cache::store(&loc.read_dir, &section) {
        warn!(dir = %loc.read_dir.display(), error = %err, "failed to write aggregate cache");
    }

    Ok(section)
}

/// Load a single entry from its directory.
pub fn load_entry(loc: &Location, key: &str) -> Result<Entry, ManifestError> {
    let meta: EntryMeta = read_manifest(loc)?;

    let asset = decode_asset(loc, meta.asset)?;
    let thumbnails = Thumbnails {
        default: image_info(loc, &meta.thumbnails.default)?,
        sources: meta
            .thumbnails
            .sources
            .iter()
            .map(|m| image_info(loc, m))
            .collect::<Result<_, _>>()?,
    };

    Ok(Entry {
        key: key.to_string(),
        path: loc.page_url.clone(),
        title: meta.title,
        author: meta.author,
        description: meta.description,
        external_links: meta
            .external_links
            .into_iter()
            .map(|s| ExternalLinksSection {
                name: s.name,
                links: s
                    .links
                    .into_iter()
                    .map(|l| ExternalLink {
                        href: l.href,
                        contents: l.contents,
                        notes: l.notes,
                    })
                    .collect(),
            })
            .collect(),
        thumbnails,
        asset,
    })
}

/// URL-safe unpadded base64 of a file's SHA-256.
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

// =========================================================================
// Internals
// =========================================================================

fn read_manifest<T: serde::de::DeserializeOwned>(loc: &Location) -> Result<T, ManifestError> {
    let path = loc.manifest_path();
    let stat = fs::metadata(&path).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    if stat.len() > MAX_MANIFEST_SIZE {
        return Err(ManifestError::TooLarge(path));
    }
    let bytes = fs::read(&path).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ManifestError::Json { path, source })
}

/// Enforce the tree invariant: the manifest's child list and the set of
/// subdirectories that contain a `meta.json` must be identical.
fn verify_children_exact(dir: &Path, listed: &[String]) -> Result<(), ManifestError> {
    let mut found = BTreeSet::new();
    let read = fs::read_dir(dir).map_err(|source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for dir_entry in read {
        let dir_entry = dir_entry.map_err(|source| ManifestError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir_entry.path();
        if path.is_dir() && path.join("meta.json").is_file() {
            if let Some(name) = dir_entry.file_name().to_str() {
                found.insert(name.to_string());
            }
        }
    }
    let wanted: BTreeSet<String> = listed.iter().cloned().collect();
    if found != wanted {
        return Err(ManifestError::ChildMismatch {
            dir: dir.to_path_buf(),
            listed: listed.to_vec(),
            found: found.into_iter().collect(),
        });
    }
    Ok(())
}

fn decode_asset(loc: &Location, meta: AssetMeta) -> Result<Asset, ManifestError> {
    let path = loc.manifest_path();
    match meta.kind.as_str() {
        "image" => {
            let raw: ImageAssetMeta =
                serde_json::from_value(meta.data).map_err(|source| ManifestError::Json {
                    path,
                    source,
                })?;
            Ok(Asset::Image(ImageAsset {
                default: image_info(loc, &raw.default)?,
                sources: raw
                    .sources
                    .iter()
                    .map(|m| image_info(loc, m))
                    .collect::<Result<_, _>>()?,
            }))
        }
        "youtube" => {
            let raw: IdMeta = serde_json::from_value(meta.data)
                .map_err(|source| ManifestError::Json { path, source })?;
            Ok(Asset::Youtube(YoutubeAsset { id: raw.id }))
        }
        "vimeo" => {
            let raw: IdMeta = serde_json::from_value(meta.data)
                .map_err(|source| ManifestError::Json { path, source })?;
            Ok(Asset::Vimeo(VimeoAsset { id: raw.id }))
        }
        other => Err(ManifestError::UnknownAssetType(other.to_string())),
    }
}

/// Validate one image's metadata and verify its checksum against the file.
fn image_info(loc: &Location, meta: &ImageMeta) -> Result<ImageInfo, ManifestError> {
    validate_image_meta(meta)?;

    let read_path = loc.read_dir.join(&meta.filename);
    let actual = file_checksum(&read_path).map_err(|source| ManifestError::Io {
        path: read_path.clone(),
        source,
    })?;
    if !actual.starts_with(&meta.checksum) {
        return Err(ManifestError::ChecksumMismatch {
            path: read_path,
            expected: meta.checksum.clone(),
        });
    }

    Ok(ImageInfo {
        path: format!("{}/{}", loc.data_url, meta.filename),
        fs_path: loc.live_dir.join(&meta.filename),
        checksum: meta.checksum.clone(),
        size: Resolution {
            x: meta.size.x,
            y: meta.size.y,
        },
        mime: meta.mime.clone(),
    })
}

fn validate_image_meta(meta: &ImageMeta) -> Result<(), ManifestError> {
    let fail = |reason| ManifestError::InvalidImage {
        filename: meta.filename.clone(),
        reason,
    };
    // "a.png" is the shortest sensible filename, "image/x…" the shortest
    // sensible MIME type.
    if meta.filename.len() < 5 {
        return Err(fail("filename too short"));
    }
    if meta.filename.contains('/') || meta.filename.contains("..") {
        return Err(fail("filename is not a plain name"));
    }
    if meta.mime.len() < 9 {
        return Err(fail("image type too short"));
    }
    if meta.checksum.len() < MIN_CHECKSUM_LEN {
        return Err(fail("checksum too short"));
    }
    if meta.size.x < 16 || meta.size.y < 16 {
        return Err(fail("image dimensions below 16 pixels"));
    }
    Ok(())
}
