//! Runtime settings shared by every handler.

use std::path::PathBuf;

/// Everything the handlers need to know about where things live.
///
/// Built once from the CLI in `main` and passed by reference; no global.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Live content tree; also hosts per-request staging directories so
    /// the final rename stays on one filesystem.
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub authfile: PathBuf,
    /// Development mode: enables `GET /exit/`.
    pub dev: bool,
    /// URL prefix the read-side pages mount under.
    pub site_root: String,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            host: "localhost".to_string(),
            port: 8080,
            data_dir: PathBuf::from("_data"),
            static_dir: PathBuf::from("_static"),
            templates_dir: PathBuf::from("templates"),
            authfile: PathBuf::from("auth.txt"),
            dev: false,
            site_root: "/site".to_string(),
        }
    }
}
