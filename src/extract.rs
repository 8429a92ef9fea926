//! Hardened gzip+tar extraction into a staging directory.
//!
//! Uploads arrive as `application/x-tar+gzip` request bodies. The stream is
//! decoded entry by entry and written under the staging target, with the
//! path rules applied to every header name *before* anything touches disk:
//!
//! - names starting with `/` (absolute paths),
//! - names containing `../` (directory traversal),
//! - names containing `//` (path confusion),
//!
//! each abort the extraction. Only regular files and directories are
//! supported; anything else (symlinks, devices, FIFOs) is rejected —
//! a symlink inside the tree could redirect a later entry outside it.
//!
//! On any failure the staging target is removed again, so a rejected
//! archive leaves nothing behind for the caller to half-trust.

use filetime::FileTime;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid gzip or tar stream: {0}")]
    Archive(#[source] io::Error),
    #[error("unsafe path in archive: '{0}'")]
    UnsafePath(String),
    #[error("unsupported entry type for '{0}'")]
    Unsupported(String),
    #[error("failed to extract '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Decode a gzipped tar stream into `dest`.
///
/// `dest` need not exist; parent directories of regular files are created
/// with mode 0755 as they appear. Each extracted file and directory gets
/// its modification time restored from the tar header. On error, `dest`
/// is removed entirely.
pub fn extract_tarball<R: Read>(gzip_stream: R, dest: &Path) -> Result<(), ExtractError> {
    let result = extract_inner(gzip_stream, dest);
    if result.is_err() {
        // Leave no partial tree behind; the error already tells the caller
        // everything about why.
        let _ = fs::remove_dir_all(dest);
    }
    result
}

fn extract_inner<R: Read>(gzip_stream: R, dest: &Path) -> Result<(), ExtractError> {
    let decoder = GzDecoder::new(gzip_stream);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries().map_err(ExtractError::Archive)? {
        let mut entry = entry.map_err(ExtractError::Archive)?;
        let name = entry_name(&entry)?;
        check_name(&name)?;

        let target = dest.join(&name);
        let mtime = entry.header().mtime().map_err(ExtractError::Archive)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                make_dirs(&target).map_err(|source| ExtractError::Write {
                    path: target.clone(),
                    source,
                })?;
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    make_dirs(parent).map_err(|source| ExtractError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                let mut file = File::create(&target).map_err(|source| ExtractError::Write {
                    path: target.clone(),
                    source,
                })?;
                io::copy(&mut entry, &mut file).map_err(|source| ExtractError::Write {
                    path: target.clone(),
                    source,
                })?;
            }
            _ => return Err(ExtractError::Unsupported(name)),
        }

        filetime::set_file_mtime(&target, FileTime::from_unix_time(mtime as i64, 0)).map_err(
            |source| ExtractError::Write {
                path: target.clone(),
                source,
            },
        )?;
    }
    Ok(())
}

/// Header name as UTF-8 text. Non-UTF-8 names are rejected outright; every
/// legitimate manifest path is ASCII.
fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String, ExtractError> {
    let bytes = entry.path_bytes();
    match std::str::from_utf8(&bytes) {
        Ok(name) => Ok(name.to_string()),
        Err(_) => Err(ExtractError::UnsafePath(
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
    }
}

fn check_name(name: &str) -> Result<(), ExtractError> {
    if name.starts_with('/') || name.contains("../") || name.contains("//") {
        return Err(ExtractError::UnsafePath(name.to_string()));
    }
    Ok(())
}

fn make_dirs(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}
