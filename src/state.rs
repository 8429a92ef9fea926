//! The live [`SiteState`] and its replacement operations.
//!
//! A single [`Store`] is created at startup and shared by every handler.
//! Readers take a short read lock, clone the `Vec<Arc<Year>>` snapshot,
//! and render from that — the lock is never held across I/O or template
//! execution. Ingestion swaps a whole year (one slot) or one section
//! inside a rebuilt year, and only after the on-disk rename has committed,
//! so a rolled-back request leaves memory matching disk.
//!
//! # Startup scan
//!
//! `load_initial` looks at the immediate children of the data directory.
//! Names that parse as a year key (exactly four digits, within range) are
//! loaded and must succeed; everything else — `lost+found`, editor
//! droppings, out-of-range numbers — is skipped with a debug log. A
//! year-shaped directory that fails to load aborts startup: serving a
//! silently incomplete archive would be worse than not starting.

use crate::manifest::{self, Location, ManifestError};
use crate::types::{Section, SiteState, Year, YearKey};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to scan data directory {path}: {source}", path = .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to load year {key}: {source}")]
    Year {
        key: YearKey,
        #[source]
        source: ManifestError,
    },
    #[error("no such year: {0}")]
    NoSuchYear(YearKey),
    #[error("year {year} has no section '{section}'")]
    NoSuchSection { year: YearKey, section: String },
}

/// Process-wide archive state behind a read/write lock.
#[derive(Debug)]
pub struct Store {
    state: RwLock<SiteState>,
}

impl Store {
    /// An empty store, for a blank data directory or for tests.
    pub fn new(state: SiteState) -> Store {
        Store {
            state: RwLock::new(state),
        }
    }

    /// Scan `data_dir` and parse every year found there.
    ///
    /// `site_root` is the public URL prefix pages mount under (`/site`);
    /// it gets baked into every entity path. The directory is created if
    /// missing so a first boot starts from an empty archive.
    pub fn load_initial(data_dir: &Path, site_root: &str) -> Result<Store, StateError> {
        fs::create_dir_all(data_dir).map_err(|source| StateError::Scan {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let mut keys = Vec::new();
        let entries = fs::read_dir(data_dir).map_err(|source| StateError::Scan {
            path: data_dir.to_path_buf(),
            source,
        })?;
        for dir_entry in entries {
            let dir_entry = dir_entry.map_err(|source| StateError::Scan {
                path: data_dir.to_path_buf(),
                source,
            })?;
            if !dir_entry.path().is_dir() {
                continue;
            }
            let name = dir_entry.file_name();
            match name.to_str().and_then(YearKey::parse) {
                Some(key) => keys.push(key),
                None => {
                    debug!(name = %name.to_string_lossy(), "skipping non-year directory");
                }
            }
        }
        keys.sort_unstable_by(|a, b| b.cmp(a));

        let mut years = Vec::with_capacity(keys.len());
        for key in keys {
            let loc = year_location(data_dir, site_root, key);
            let year =
                manifest::load_year(&loc, key).map_err(|source| StateError::Year { key, source })?;
            info!(year = %key, sections = year.sections.len(), "loaded year");
            years.push(Arc::new(year));
        }

        Ok(Store::new(SiteState { years }))
    }

    /// Cheap copy of the current state: a clone of the `Arc` list.
    pub fn snapshot(&self) -> SiteState {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Insert `year` at its descending-sorted position, or overwrite the
    /// existing year with the same key.
    pub fn replace_year(&self, year: Year) {
        let year = Arc::new(year);
        let mut state = self.state.write().expect("state lock poisoned");
        match state.years.iter().position(|y| y.key <= year.key) {
            Some(index) if state.years[index].key == year.key => state.years[index] = year,
            Some(index) => state.years.insert(index, year),
            None => state.years.push(year),
        }
    }

    /// Replace one section inside the named year.
    ///
    /// The year must exist and its manifest must already list the section
    /// key; a section upload never grows a year's section list, because
    /// the year's own `meta.json` on disk would no longer match its
    /// subdirectories.
    pub fn replace_section(&self, year_key: YearKey, section: Section) -> Result<(), StateError> {
        let mut state = self.state.write().expect("state lock poisoned");
        let index = state
            .year_index(year_key)
            .ok_or(StateError::NoSuchYear(year_key))?;

        let slot = state.years[index]
            .sections
            .iter()
            .position(|s| s.key == section.key)
            .ok_or_else(|| StateError::NoSuchSection {
                year: year_key,
                section: section.key.clone(),
            })?;

        // Years are immutable behind their Arc; build the successor and
        // swap the slot.
        let mut year = (*state.years[index]).clone();
        year.sections[slot] = section;
        state.years[index] = Arc::new(year);
        Ok(())
    }

    /// Whether a year with this key is currently loaded.
    pub fn has_year(&self, key: YearKey) -> bool {
        self.state
            .read()
            .expect("state lock poisoned")
            .year(key)
            .is_some()
    }
}

/// The [`Location`] of a year that already lives in the data directory.
pub fn year_location(data_dir: &Path, site_root: &str, key: YearKey) -> Location {
    Location::live(
        data_dir.join(key.to_string()),
        format!("{site_root}/{key}"),
        format!("{site_root}/_data/{key}"),
    )
}
