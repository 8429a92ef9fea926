//! Per-section aggregate cache.
//!
//! Loading a populous section is the expensive part of a cold start: one
//! JSON parse plus image checksum verification per entry, hundreds of times
//! over. This module caches the fully-parsed [`Section`] in a single binary
//! file `meta.aggregate.bincode` next to the section's `meta.json`, so the
//! next load is one read and one decode.
//!
//! # Validity
//!
//! A cache file is used only when it decodes cleanly, carries the current
//! format version, and its entry-key list matches the section manifest's
//! list exactly (same keys, same order, same count). Anything else is a
//! miss: the stale file is deleted and the caller takes the slow path,
//! which rewrites the cache on success.
//!
//! # Atomicity
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so a reader never sees a torn cache and a crash mid-write
//! leaves the previous cache (or none) in place.

use crate::types::Section;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Cache filename; the suffix names the serialization format.
pub const AGGREGATE_FILENAME: &str = "meta.aggregate.bincode";

/// Bump to invalidate every existing cache when the entity shape or the
/// encoding changes.
const FORMAT_VERSION: u8 = 1;

/// Try to load a cached section from `dir`.
///
/// `expected_keys` is the entry-key list from the section's current
/// `meta.json`. Returns `None` (after removing the stale file) unless the
/// cache matches it exactly — and was written for this very section at
/// this very URL, so a cache file that arrived inside an upload or
/// survived a tree move can never smuggle foreign paths into the state.
pub fn load(dir: &Path, key: &str, page_url: &str, expected_keys: &[String]) -> Option<Section> {
    let path = dir.join(AGGREGATE_FILENAME);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(_) => return None,
    };

    let section = decode(&bytes).filter(|section| {
        section.key == key
            && section.path == page_url
            && section.entries.len() == expected_keys.len()
            && section
                .entries
                .iter()
                .zip(expected_keys)
                .all(|(entry, key)| &entry.key == key)
    });

    if section.is_none() {
        debug!(path = %path.display(), "removing stale aggregate cache");
        let _ = fs::remove_file(&path);
    }
    section
}

/// Write a fresh cache for `section` into `dir` via tmpfile + rename.
pub fn store(dir: &Path, section: &Section) -> io::Result<()> {
    let encoded =
        bincode::serialize(section).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&[FORMAT_VERSION])?;
    file.write_all(&encoded)?;
    file.persist(dir.join(AGGREGATE_FILENAME))
        .map_err(|err| err.error)?;
    Ok(())
}

fn decode(bytes: &[u8]) -> Option<Section> {
    match bytes.split_first() {
        Some((&FORMAT_VERSION, rest)) => bincode::deserialize(rest).ok(),
        _ => None,
    }
}
