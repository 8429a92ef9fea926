//! The write path: `PUT /api/YYYY` and `PUT /api/YYYY/<slug>`.
//!
//! One request replaces one whole year or one whole section. The pipeline
//! per request:
//!
//! ```text
//! body ─→ extract (staging) ─→ manifest load (validate) ─→ atomic install ─→ state update
//! ```
//!
//! The staging directory is a [`TempDir`] created *inside* the data
//! directory — same filesystem, so the final rename is atomic — and is
//! removed on every exit path, success included (by then its `new` subtree
//! has been renamed away and only the displaced `old` tree remains to be
//! discarded). The in-memory state is updated strictly after the rename
//! commits: if anything fails before that, memory still matches disk.
//!
//! Error policy: anything the client could have caused (bad archive, bad
//! manifest, bad URL shape, missing parent year) is a 400 with a readable
//! message and no server-side stack; filesystem trouble is a 500 with the
//! full chain logged.

use crate::extract;
use crate::http::Reply;
use crate::install;
use crate::manifest::{self, Location};
use crate::settings::Settings;
use crate::state::Store;
use crate::types::{is_valid_slug, YearKey};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;
use tracing::{error, info};

/// Handle a request to the API mount. `path` is the URL path with the
/// `/api/` prefix already stripped and no leading slash.
pub fn handle(
    settings: &Settings,
    store: &Store,
    method: &str,
    path: &str,
    body: &mut dyn Read,
) -> Reply {
    if method != "PUT" {
        return Reply::text(405, "Method Not Allowed.\n");
    }

    let path = path.split('?').next().unwrap_or("");
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 2 {
        return bad_request("Can only update either a year or a section!");
    }

    let year_text = parts[0];
    if year_text.len() != 4 || !year_text.bytes().all(|b| b.is_ascii_digit()) {
        return bad_request(&format!("Year '{year_text}' is not a number!"));
    }
    let key = match YearKey::parse(year_text) {
        Some(key) => key,
        None => return bad_request(&format!("Year '{year_text}' is out of range!")),
    };

    if parts.len() == 1 {
        return put_year(settings, store, key, body);
    }

    let slug = parts[1];
    if !is_valid_slug(slug) {
        return bad_request(&format!("Illegal section name '{slug}'!"));
    }
    put_section(settings, store, key, slug, body)
}

fn put_year(settings: &Settings, store: &Store, key: YearKey, body: &mut dyn Read) -> Reply {
    let staging = match stage(&settings.data_dir) {
        Ok(staging) => staging,
        Err(reply) => return reply,
    };
    let new_dir = staging.path().join("new");

    if let Err(err) = extract::extract_tarball(body, &new_dir) {
        return bad_request(&format!("Invalid tar file: {err}"));
    }

    let target = settings.data_dir.join(key.to_string());
    let loc = Location::new(
        new_dir.clone(),
        target.clone(),
        format!("{}/{key}", settings.site_root),
        format!("{}/_data/{key}", settings.site_root),
    );
    let year = match manifest::load_year(&loc, key) {
        Ok(year) => year,
        Err(err) => return bad_request(&format!("Invalid year archive: {err}")),
    };

    if let Err(err) = install::install(&target, &new_dir, &staging.path().join("old")) {
        error!(year = %key, error = %err, "failed to install year");
        return ise();
    }

    info!(year = %key, sections = year.sections.len(), "installed year");
    store.replace_year(year);
    Reply::text(200, "OK\n")
}

fn put_section(
    settings: &Settings,
    store: &Store,
    key: YearKey,
    slug: &str,
    body: &mut dyn Read,
) -> Reply {
    // The parent year must exist and its manifest must list this section;
    // the upload only ever replaces a listed subtree. Checked before any
    // disk work so a refused request stages nothing.
    let snapshot = store.snapshot();
    let year = match snapshot.year(key) {
        Some(year) => year,
        None => return bad_request(&format!("Year '{key}' does not exist!")),
    };
    if year.section(slug).is_none() {
        return bad_request(&format!("Year '{key}' has no section '{slug}'!"));
    }

    let staging = match stage(&settings.data_dir) {
        Ok(staging) => staging,
        Err(reply) => return reply,
    };
    let new_dir = staging.path().join("new");

    if let Err(err) = extract::extract_tarball(body, &new_dir) {
        return bad_request(&format!("Invalid tar file: {err}"));
    }

    let target = settings.data_dir.join(key.to_string()).join(slug);
    let loc = Location::new(
        new_dir.clone(),
        target.clone(),
        format!("{}/{key}/{slug}", settings.site_root),
        format!("{}/_data/{key}/{slug}", settings.site_root),
    );
    let section = match manifest::load_section(&loc, slug) {
        Ok(section) => section,
        Err(err) => return bad_request(&format!("Invalid section archive: {err}")),
    };

    if let Err(err) = install::install(&target, &new_dir, &staging.path().join("old")) {
        error!(year = %key, section = slug, error = %err, "failed to install section");
        return ise();
    }

    info!(year = %key, section = slug, entries = section.entries.len(), "installed section");
    if let Err(err) = store.replace_section(key, section) {
        // Disk and memory can only disagree here if another writer removed
        // the year between our check and now; the next restart reconciles.
        error!(year = %key, section = slug, error = %err, "state update failed after install");
        return ise();
    }
    Reply::text(200, "OK\n")
}

fn stage(data_dir: &Path) -> Result<TempDir, Reply> {
    TempDir::with_prefix_in(".upload-", data_dir).map_err(|err| {
        error!(dir = %data_dir.display(), error = %err, "failed to create staging directory");
        ise()
    })
}

fn bad_request(message: &str) -> Reply {
    Reply::text(400, &format!("{message}\n"))
}

fn ise() -> Reply {
    Reply::text(500, "Internal server error!\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Store;
    use crate::test_helpers::{section_tarball, year_tarball};
    use crate::types::SiteState;
    use tempfile::TempDir;

    fn settings_for(data_dir: &Path) -> Settings {
        Settings {
            data_dir: data_dir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn put(settings: &Settings, store: &Store, path: &str, body: &[u8]) -> Reply {
        handle(settings, store, "PUT", path, &mut &body[..])
    }

    // =========================================================================
    // URL shape filtering
    // =========================================================================

    #[test]
    fn rejects_bad_url_shapes() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());
        let tarball = year_tarball(&[]);

        for path in ["2001/section/entry", "2001/Section", "20001", "abcd", ""] {
            let reply = put(&settings, &store, path, &tarball);
            assert_eq!(reply.status, 400, "path {path:?} should be rejected");
        }
        // Nothing was staged or written.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn rejects_non_put_methods() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());

        let reply = handle(&settings, &store, "GET", "2001", &mut &b""[..]);
        assert_eq!(reply.status, 405);
        assert_eq!(reply.body_text(), "Method Not Allowed.\n");
    }

    // =========================================================================
    // Year upload scenarios
    // =========================================================================

    #[test]
    fn year_upload_installs_files_and_state() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());
        let tarball = year_tarball(&[("section", &[])]);

        let reply = put(&settings, &store, "2001", &tarball);
        assert_eq!(reply.status, 200, "{}", reply.body_text());
        assert_eq!(reply.body_text(), "OK\n");

        assert!(tmp.path().join("2001/meta.json").is_file());
        assert!(tmp.path().join("2001/section/meta.json").is_file());
        assert!(store.has_year(YearKey::parse("2001").unwrap()));
        // Staging directories are gone.
        let stray: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".upload-")
            })
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn year_upload_with_bad_archive_leaves_no_trace() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());

        let reply = put(&settings, &store, "2001", b"not a tarball");
        assert_eq!(reply.status, 400);
        assert!(!tmp.path().join("2001").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn year_upload_replaces_previous_year() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());

        put(&settings, &store, "2001", &year_tarball(&[("first", &[])]));
        let reply = put(&settings, &store, "2001", &year_tarball(&[("second", &[])]));
        assert_eq!(reply.status, 200);

        assert!(!tmp.path().join("2001/first").exists());
        assert!(tmp.path().join("2001/second/meta.json").is_file());

        let state = store.snapshot();
        let year = state.year(YearKey::parse("2001").unwrap()).unwrap();
        assert_eq!(year.sections.len(), 1);
        assert_eq!(year.sections[0].key, "second");
    }

    // =========================================================================
    // Section upload scenarios
    // =========================================================================

    #[test]
    fn section_upload_without_year_is_rejected_with_no_files() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());

        let reply = put(&settings, &store, "2001/section", &section_tarball("Compo", &[]));
        assert_eq!(reply.status, 400);
        assert!(!tmp.path().join("2001").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn section_upload_after_year_installs_entry_files() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());

        let reply = put(&settings, &store, "2001", &year_tarball(&[("section", &[])]));
        assert_eq!(reply.status, 200, "{}", reply.body_text());

        let reply = put(
            &settings,
            &store,
            "2001/section",
            &section_tarball("Compo", &["entry"]),
        );
        assert_eq!(reply.status, 200, "{}", reply.body_text());
        assert!(tmp.path().join("2001/section/entry/meta.json").is_file());

        let state = store.snapshot();
        let year = state.year(YearKey::parse("2001").unwrap()).unwrap();
        assert_eq!(year.sections[0].entries.len(), 1);
        assert_eq!(year.sections[0].entries[0].key, "entry");
        assert_eq!(
            year.sections[0].entries[0].path,
            "/site/2001/section/entry"
        );
    }

    #[test]
    fn section_upload_accepts_dashed_slugs() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());
        put(&settings, &store, "2001", &year_tarball(&[("valid-slug", &[])]));

        let reply = put(
            &settings,
            &store,
            "2001/valid-slug",
            &section_tarball("Compo", &["entry"]),
        );
        assert_eq!(reply.status, 200, "{}", reply.body_text());
        assert!(tmp.path().join("2001/valid-slug/entry/meta.json").is_file());
    }

    #[test]
    fn section_upload_for_unlisted_section_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());
        put(&settings, &store, "2001", &year_tarball(&[("section", &[])]));

        let reply = put(
            &settings,
            &store,
            "2001/uninvited",
            &section_tarball("Compo", &[]),
        );
        assert_eq!(reply.status, 400);
        assert!(!tmp.path().join("2001/uninvited").exists());
    }

    #[test]
    fn bad_manifest_in_year_tarball_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        let store = Store::new(SiteState::new());
        let tarball = crate::test_helpers::gz_tarball(&[crate::test_helpers::TarFile::new(
            "meta.json",
            "not json at all",
        )]);

        let reply = put(&settings, &store, "2001", &tarball);
        assert_eq!(reply.status, 400);
        assert!(!tmp.path().join("2001").exists());
    }
}
