//! Fixture builders shared by the integration tests: gzipped tarballs
//! shaped like real year and section uploads.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::Write;

/// URL-safe unpadded base64 SHA-256 of some bytes, as the manifests carry.
pub fn checksum(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

/// Build a gzipped tarball from (path, content) pairs.
pub fn gz_tar(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mtime(1_234_567_890);
        header.set_path(path).unwrap();
        header.set_cksum();
        builder.append(&header, &content[..]).unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Manifest + media files for one section subtree.
pub fn section_files(
    prefix: &str,
    name: &str,
    ranked: bool,
    ongoing: bool,
    entries: &[&str],
) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let listed: Vec<String> = entries.iter().map(|key| format!("\"{key}\"")).collect();
    files.push((
        format!("{prefix}meta.json"),
        format!(
            r#"{{"name": "{name}", "description": "", "is-ranked": {ranked},
                "is-ongoing": {ongoing}, "entries": [{}]}}"#,
            listed.join(", ")
        )
        .into_bytes(),
    ));
    for key in entries {
        let png = format!("png-of-{key}").into_bytes();
        let sum = checksum(&png);
        files.push((format!("{prefix}{key}/thumb.png"), png));
        files.push((
            format!("{prefix}{key}/meta.json"),
            format!(
                r#"{{
                    "title": "Title {key}",
                    "author": "Author",
                    "description": "",
                    "asset": {{"type": "youtube", "data": {{"id": "vid-{key}"}}}},
                    "thumbnails": {{"default": {{
                        "filename": "thumb.png", "type": "image/png",
                        "checksum": "{sum}", "size": {{"X": 160, "Y": 90}}
                    }}}}
                }}"#
            )
            .into_bytes(),
        ));
    }
    files
}

/// A complete year tarball: `(section_key, ranked, ongoing, entries)`.
pub fn year_tar(sections: &[(&str, bool, bool, &[&str])]) -> Vec<u8> {
    let mut files = Vec::new();
    let listed: Vec<String> = sections
        .iter()
        .map(|(key, _, _, _)| format!("\"{key}\""))
        .collect();
    files.push((
        "meta.json".to_string(),
        format!(r#"{{"sections": [{}]}}"#, listed.join(", ")).into_bytes(),
    ));
    for (key, ranked, ongoing, entries) in sections {
        files.extend(section_files(
            &format!("{key}/"),
            key,
            *ranked,
            *ongoing,
            entries,
        ));
    }
    gz_tar(&files)
}

/// A standalone section tarball.
pub fn section_tar(name: &str, entries: &[&str]) -> Vec<u8> {
    gz_tar(&section_files("", name, false, false, entries))
}
