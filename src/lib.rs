//! # Yearbook
//!
//! A read-mostly archive server. Content is organized as
//! **Year → Section → Entry**, authored elsewhere, and delivered as
//! gzipped tarballs over an authenticated HTTP API; the server installs
//! each upload atomically, keeps the whole archive parsed in memory, and
//! renders the public HTML pages from that in-memory tree.
//!
//! # Architecture: One Tree, Two Paths
//!
//! ```text
//! write:  PUT /api/YYYY[/slug] → extract → validate → atomic rename → state swap
//! read:   GET /site/...        → route → snapshot → assemble context → render
//! ```
//!
//! The two paths meet only at the state store. Writers prepare a complete
//! new subtree in a staging directory, rename it into place (old tree
//! parked for rollback), and only then swap the in-memory reference —
//! so a reader always sees either the previous archive or the new one,
//! never a torn mix, on disk and in memory alike.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Content entities, key validation, the in-memory [`types::SiteState`] |
//! | [`manifest`] | `meta.json` loaders: bounded reads, schema checks, image checksums |
//! | [`cache`] | Per-section aggregate cache (`meta.aggregate.bincode`) |
//! | [`extract`] | Hardened gzip+tar extraction into staging |
//! | [`install`] | The atomic rename dance with rollback |
//! | [`state`] | The shared store: startup scan, year/section replacement |
//! | [`ingest`] | Write-path orchestration and error → status mapping |
//! | [`site`] | Read-path routing, page handlers, file serving, cache headers |
//! | [`context`] | Breadcrumbs, sibling navigation, yearly window, preview selection |
//! | [`embed`] | Asset embed HTML: `<picture>`/srcset, video iframes |
//! | [`render`] | Tera template loading and helper filters |
//! | [`auth`] | Credential file, permission checks, constant-time Basic Auth |
//! | [`server`] | tiny_http accept loop, worker pool, top-level dispatch |
//! | [`http`] | Socket-free request/reply types so handlers test without ports |
//!
//! # Design Decisions
//!
//! ## Whole-Subtree Replacement
//!
//! The only write unit is a year or a section. Entities are immutable once
//! installed and carry no parent pointers; replacing content means parsing
//! a complete new subtree and swapping one `Arc` slot. This keeps readers
//! lock-free against each other (a snapshot is a handful of pointer
//! clones) and makes every entity trivially serializable for the
//! aggregate cache.
//!
//! ## Staging Inside the Data Directory
//!
//! Upload staging directories are created *inside* the data directory,
//! not in `/tmp`: `rename(2)` is only atomic within one filesystem, and
//! the whole ingestion design leans on that atomicity. The staging
//! directory doubles as the rollback reservation for the displaced old
//! tree and is removed on every exit path.
//!
//! ## Runtime Templates Over Compile-Time HTML
//!
//! Pages render through Tera templates loaded at startup from
//! `--dir-templates`. The template files are deployment artifacts — the
//! archive's operators restyle pages without rebuilding the binary — so a
//! compile-time HTML macro system was out; the renderer treats templates
//! as config, validated once at boot.
//!
//! ## Derived Data Is Disposable
//!
//! The per-section aggregate cache is the only derived file the server
//! writes into the content tree. It is validated against the manifest's
//! entry list on every use and deleted on any mismatch; losing it costs a
//! slow load, never correctness.

pub mod auth;
pub mod cache;
pub mod context;
pub mod embed;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod install;
pub mod manifest;
pub mod render;
pub mod server;
pub mod settings;
pub mod site;
pub mod state;
#[cfg(test)]
pub(crate) mod test_helpers;
pub mod types;
