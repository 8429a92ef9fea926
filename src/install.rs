//! Atomic promotion of a staged tree into the live tree.
//!
//! The rename dance:
//!
//! ```text
//! 1. target      → old       (only if target exists)
//! 2. staged_new  → target
//! 3. old         → target    (rollback, only if step 2 failed)
//! ```
//!
//! Each step is a single `rename(2)`, atomic within a filesystem. The
//! ingestion controller places `staged_new` and `old` inside a temp
//! directory that is itself a sibling of `target` under the data dir, so
//! all three paths share a filesystem and rename never degrades to a copy.
//!
//! A reader that races the swap sees either the old tree or the new tree
//! (or, for the instant between steps 1 and 2, no tree); never a mix of
//! the two.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("failed to set aside '{target}': {source}", target = .target.display())]
    SetAside {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to promote staged tree into '{target}': {source}", target = .target.display())]
    Promote {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "failed to promote staged tree into '{target}' ({source}) and rollback failed too: {rollback}",
        target = .target.display()
    )]
    RollbackFailed {
        target: PathBuf,
        source: io::Error,
        rollback: io::Error,
    },
}

/// Install `staged_new` at `target`, using `old` as the rollback
/// reservation for a displaced previous tree.
///
/// On success the previous tree (if any) sits at `old`; the caller owns
/// its disposal — in practice `old` lives inside the request's staging
/// temp dir and vanishes with it.
pub fn install(target: &Path, staged_new: &Path, old: &Path) -> Result<(), InstallError> {
    let displaced = target.exists();
    if displaced {
        fs::rename(target, old).map_err(|source| InstallError::SetAside {
            target: target.to_path_buf(),
            source,
        })?;
    }

    if let Err(source) = fs::rename(staged_new, target) {
        if displaced {
            if let Err(rollback) = fs::rename(old, target) {
                return Err(InstallError::RollbackFailed {
                    target: target.to_path_buf(),
                    source,
                    rollback,
                });
            }
        }
        return Err(InstallError::Promote {
            target: target.to_path_buf(),
            source,
        });
    }
    Ok(())
}
