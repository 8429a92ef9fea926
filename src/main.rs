//! # Yearbook
//!
//! Archive server binary. Loads the content tree and templates, checks
//! the auth file, and serves until killed (or until `GET /exit/` in dev
//! mode).
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: localhost:8080, content in _data/, templates in templates/
//! yearbook
//!
//! # Everything explicit
//! yearbook --host 0.0.0.0 --port 8080 \
//!     --dir-data /srv/archive/data \
//!     --dir-static /srv/archive/static \
//!     --dir-templates /srv/archive/templates \
//!     --authfile /srv/archive/auth.txt
//!
//! # Development: auto-exit endpoint enabled
//! yearbook --dev
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yearbook::render::Renderer;
use yearbook::server::{self, App};
use yearbook::settings::Settings;
use yearbook::state::Store;
use yearbook::auth;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "yearbook")]
#[command(about = "Archive server: yearly tarball uploads in, HTML pages out")]
#[command(long_about = "\
Archive server: yearly tarball uploads in, HTML pages out

Content is a three-level tree of years, sections, and entries, each level
described by a meta.json manifest:

  _data/
  ├── 2003/
  │   ├── meta.json                    # {\"sections\": [\"demo\", \"music\"]}
  │   ├── demo/
  │   │   ├── meta.json                # name, flags, ordered entry list
  │   │   ├── meta.aggregate.bincode   # derived cache, safe to delete
  │   │   └── hugi/
  │   │       ├── meta.json            # title, author, asset, thumbnails
  │   │       └── thumb.png
  │   └── music/ ...
  └── 2002/ ...

Uploads replace a whole year (PUT /api/YYYY) or a whole section
(PUT /api/YYYY/<slug>) as a gzipped tarball, protected by Basic Auth
against --authfile (username:password lines, owner-readable only).
Pages are served under /site/ from templates loaded at startup.")]
#[command(version = version_string())]
struct Cli {
    /// Interface to bind
    #[arg(long, default_value = "localhost")]
    host: String,

    /// TCP port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Live content tree; also hosts upload staging directories
    #[arg(long = "dir-data", default_value = "_data")]
    dir_data: PathBuf,

    /// Static assets served under /site/_static/
    #[arg(long = "dir-static", default_value = "_static")]
    dir_static: PathBuf,

    /// HTML templates, loaded once at startup
    #[arg(long = "dir-templates", default_value = "templates")]
    dir_templates: PathBuf,

    /// Basic-Auth credentials, one username:password per line
    #[arg(long, default_value = "auth.txt")]
    authfile: PathBuf,

    /// Development mode: enables GET /exit/
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings {
        host: cli.host,
        port: cli.port,
        data_dir: cli.dir_data,
        static_dir: cli.dir_static,
        templates_dir: cli.dir_templates,
        authfile: cli.authfile,
        dev: cli.dev,
        site_root: "/site".to_string(),
    };

    // A wide-open credential file is a refusal, not a warning.
    auth::ensure_authfile_secure(&settings.authfile)?;

    let renderer = Renderer::load(&settings.templates_dir)?;
    let store = Store::load_initial(&settings.data_dir, &settings.site_root)?;
    let state = store.snapshot();
    info!(
        years = state.years.len(),
        range = %state.range_label(),
        "archive loaded"
    );

    server::serve(Arc::new(App {
        settings,
        store,
        renderer,
    }))?;
    Ok(())
}
