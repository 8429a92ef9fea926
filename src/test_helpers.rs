//! Shared test utilities for the yearbook test suite.
//!
//! Provides on-disk fixture builders for the three manifest levels,
//! in-memory entity factories for context/cache tests, gzipped tarball
//! construction for extractor and ingestion tests, and a tree digest for
//! rollback assertions.

use crate::types::{
    Asset, Entry, ImageInfo, Resolution, Section, Thumbnails, Year, YearKey, YoutubeAsset,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

// =========================================================================
// On-disk fixtures
// =========================================================================

/// Write an image file and return its full content checksum (URL-safe
/// unpadded base64 SHA-256), ready to paste into a manifest.
pub fn write_image(dir: &Path, filename: &str, contents: &[u8]) -> String {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(filename);
    fs::write(&path, contents).unwrap();
    crate::manifest::file_checksum(&path).unwrap()
}

/// Minimal valid entry manifest JSON with a YouTube asset and a single
/// default thumbnail.
pub fn entry_meta_json(title: &str, author: &str, thumb: &str, checksum: &str) -> String {
    format!(
        r#"{{
            "title": "{title}",
            "author": "{author}",
            "description": "",
            "asset": {{"type": "youtube", "data": {{"id": "abc"}}}},
            "thumbnails": {{"default": {{
                "filename": "{thumb}", "type": "image/png",
                "checksum": "{checksum}", "size": {{"X": 160, "Y": 90}}
            }}}}
        }}"#
    )
}

/// Write a complete entry directory: `meta.json` plus its thumbnail.
pub fn write_entry_tree(dir: &Path, key: &str) {
    let checksum = write_image(dir, "thumb.png", format!("png-of-{key}").as_bytes());
    fs::write(
        dir.join("meta.json"),
        entry_meta_json(&format!("Title {key}"), "Author", "thumb.png", &checksum),
    )
    .unwrap();
}

/// Write a complete section directory with the given entry keys in order.
pub fn write_section_tree(dir: &Path, name: &str, entry_keys: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    let listed: Vec<String> = entry_keys.iter().map(|k| format!("\"{k}\"")).collect();
    fs::write(
        dir.join("meta.json"),
        format!(
            r#"{{"name": "{name}", "description": "", "is-ranked": false,
                "is-ongoing": false, "entries": [{}]}}"#,
            listed.join(", ")
        ),
    )
    .unwrap();
    for key in entry_keys {
        write_entry_tree(&dir.join(key), key);
    }
}

/// Write a complete year directory with one empty section per key.
pub fn write_year_tree(dir: &Path, section_keys: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    let listed: Vec<String> = section_keys.iter().map(|k| format!("\"{k}\"")).collect();
    fs::write(
        dir.join("meta.json"),
        format!(r#"{{"sections": [{}]}}"#, listed.join(", ")),
    )
    .unwrap();
    for key in section_keys {
        write_section_tree(&dir.join(key), key, &[]);
    }
}

// =========================================================================
// In-memory entity factories
// =========================================================================

pub fn sample_image(url_prefix: &str, filename: &str) -> ImageInfo {
    ImageInfo {
        path: format!("{url_prefix}/{filename}"),
        fs_path: PathBuf::from(format!("_data{url_prefix}/{filename}")),
        checksum: "c2Vla3Jl".to_string(),
        size: Resolution { x: 160, y: 90 },
        mime: "image/png".to_string(),
    }
}

pub fn sample_entry(section_url: &str, key: &str) -> Entry {
    let url = format!("{section_url}/{key}");
    Entry {
        key: key.to_string(),
        path: url.clone(),
        title: format!("Title {key}"),
        author: "Author".to_string(),
        description: String::new(),
        external_links: Vec::new(),
        thumbnails: Thumbnails {
            default: sample_image(&url, "thumb.png"),
            sources: Vec::new(),
        },
        asset: Asset::Youtube(YoutubeAsset {
            id: "abc".to_string(),
        }),
    }
}

pub fn sample_section(key: &str, entry_keys: &[&str]) -> Section {
    let url = format!("/site/2001/{key}");
    Section {
        key: key.to_string(),
        path: url.clone(),
        name: format!("Section {key}"),
        description: String::new(),
        is_ranked: false,
        is_ongoing: false,
        entries: entry_keys.iter().map(|k| sample_entry(&url, k)).collect(),
    }
}

pub fn sample_year(key: &str, sections: Vec<Section>) -> Year {
    let key = YearKey::parse(key).unwrap();
    Year {
        key,
        path: format!("/site/{key}"),
        name: key.to_string(),
        sections,
    }
}

// =========================================================================
// Tarball construction
// =========================================================================

/// One file or directory destined for a test tarball.
pub struct TarFile {
    path: String,
    data: Vec<u8>,
    mtime: u64,
    is_dir: bool,
    /// Write the name bytes straight into the header, bypassing the tar
    /// crate's path validation — required to smuggle unsafe names in.
    raw_name: bool,
}

impl TarFile {
    pub fn new(path: &str, data: &str) -> TarFile {
        TarFile {
            path: path.to_string(),
            data: data.as_bytes().to_vec(),
            mtime: 1_234_567_890,
            is_dir: false,
            raw_name: false,
        }
    }

    pub fn dir(path: &str) -> TarFile {
        TarFile {
            path: path.to_string(),
            data: Vec::new(),
            mtime: 1_234_567_890,
            is_dir: true,
            raw_name: false,
        }
    }

    pub fn with_mtime(mut self, mtime: u64) -> TarFile {
        self.mtime = mtime;
        self
    }
}

/// A tarball entry whose header name is written verbatim, however unsafe.
pub fn raw_name_entry(name: &str, data: &str) -> TarFile {
    TarFile {
        path: name.to_string(),
        data: data.as_bytes().to_vec(),
        mtime: 1_234_567_890,
        is_dir: false,
        raw_name: true,
    }
}

/// Build a gzipped tarball from the given files, in order.
pub fn gz_tarball(files: &[TarFile]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for file in files {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(file.mtime);
        if file.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_path(&file.path).unwrap();
            header.set_cksum();
            builder.append(&header, std::io::empty()).unwrap();
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(file.data.len() as u64);
            if file.raw_name {
                let gnu = header.as_gnu_mut().unwrap();
                let bytes = file.path.as_bytes();
                assert!(bytes.len() <= 100, "raw name too long for a GNU header");
                gnu.name[..bytes.len()].copy_from_slice(bytes);
            } else {
                header.set_path(&file.path).unwrap();
            }
            header.set_cksum();
            builder.append(&header, &file.data[..]).unwrap();
        }
    }
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// A tarball holding a complete year tree with the given sections, each
/// with the given entries.
pub fn year_tarball(sections: &[(&str, &[&str])]) -> Vec<u8> {
    let mut files = Vec::new();
    let listed: Vec<String> = sections.iter().map(|(k, _)| format!("\"{k}\"")).collect();
    files.push(TarFile::new(
        "meta.json",
        &format!(r#"{{"sections": [{}]}}"#, listed.join(", ")),
    ));
    for (section, entries) in sections {
        push_section_files(&mut files, &format!("{section}/"), section, entries);
    }
    gz_tarball(&files)
}

/// A tarball holding a complete section tree with the given entries.
pub fn section_tarball(name: &str, entries: &[&str]) -> Vec<u8> {
    let mut files = Vec::new();
    push_section_files(&mut files, "", name, entries);
    gz_tarball(&files)
}

fn push_section_files(files: &mut Vec<TarFile>, prefix: &str, name: &str, entries: &[&str]) {
    let listed: Vec<String> = entries.iter().map(|k| format!("\"{k}\"")).collect();
    files.push(TarFile::new(
        &format!("{prefix}meta.json"),
        &format!(
            r#"{{"name": "{name}", "description": "", "is-ranked": false,
                "is-ongoing": false, "entries": [{}]}}"#,
            listed.join(", ")
        ),
    ));
    for entry in entries {
        let png = format!("png-of-{entry}");
        let digest = Sha256::digest(png.as_bytes());
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let checksum = URL_SAFE_NO_PAD.encode(digest);
        files.push(TarFile::new(&format!("{prefix}{entry}/thumb.png"), &png));
        files.push(TarFile::new(
            &format!("{prefix}{entry}/meta.json"),
            &entry_meta_json(&format!("Title {entry}"), "Author", "thumb.png", &checksum),
        ));
    }
}

// =========================================================================
// Tree digest
// =========================================================================

/// Stable digest of a directory tree: relative paths plus file contents,
/// in sorted order. Two trees with the same digest are identical.
pub fn tree_digest(dir: &Path) -> String {
    let mut paths = Vec::new();
    collect_files(dir, dir, &mut paths);
    paths.sort();

    let mut hasher = Sha256::new();
    for rel in &paths {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(fs::read(dir.join(rel)).unwrap());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).unwrap();
            out.push(rel.to_string_lossy().into_owned());
        }
    }
}
