//! Basic-Auth credential checking for the write API.
//!
//! Credentials live in a flat file of `username:password` lines. The file
//! is consulted on every protected request, so rotating a password needs
//! no restart. Two safety properties:
//!
//! - the file must not be group- or world-readable (mode bits `0044`
//!   clear); violated at startup the process refuses to run, violated at
//!   request time the request is a 500;
//! - password comparison is constant-time, so a probe can't bisect a
//!   password byte by byte off the response latency.
//!
//! A *missing* (but well-permissioned) auth file is not an error — it
//! yields an empty credential set, which simply rejects everyone.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("auth file {path} must only be readable by its owner", path = .0.display())]
    WideOpen(PathBuf),
    #[error("malformed auth file line (no colon): '{0}'")]
    MissingColon(String),
    #[error("failed to read auth file {path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of checking one request's credentials.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthCheck {
    Authorized,
    /// Missing, malformed, or wrong credentials: 401.
    Unauthorized,
    /// The server's own auth data is unusable: 500.
    Failure,
}

/// Whether the file's permission bits grant group or other read access.
///
/// A stat failure reports `false` — a missing auth file is handled (and
/// rejected) later, by the credential lookup finding nobody.
pub fn is_file_wide_open(path: &Path) -> bool {
    let Ok(stat) = fs::metadata(path) else {
        return false;
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        return stat.permissions().mode() & 0o044 != 0;
    }
    #[cfg(not(unix))]
    {
        let _ = stat;
        false
    }
}

/// Startup gate: refuse to run with a wide-open auth file.
pub fn ensure_authfile_secure(path: &Path) -> Result<(), AuthError> {
    if is_file_wide_open(path) {
        return Err(AuthError::WideOpen(path.to_path_buf()));
    }
    Ok(())
}

/// Read the credential file into a map.
///
/// Wide-open permissions are an error; an unreadable file only warns and
/// yields an empty map.
pub fn read_auth_data(path: &Path) -> Result<HashMap<String, String>, AuthError> {
    if is_file_wide_open(path) {
        return Err(AuthError::WideOpen(path.to_path_buf()));
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unable to read auth data");
            return Ok(HashMap::new());
        }
    };

    let mut users = HashMap::new();
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        let (user, password) = line
            .split_once(':')
            .ok_or_else(|| AuthError::MissingColon(line.to_string()))?;
        users.insert(user.to_string(), password.to_string());
    }
    Ok(users)
}

/// Constant-time password check against the credential map.
pub fn has_username_password(
    users: &HashMap<String, String>,
    username: &str,
    password: &str,
) -> bool {
    // Keyed lookup makes username enumeration possible in principle; the
    // original server accepted that and so does this one.
    let Some(stored) = users.get(username) else {
        return false;
    };
    password.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Decode an `Authorization: Basic <blob>` header value.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let blob = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(blob.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Check one request: parse the header, load the file, verify.
pub fn check_request(authfile: &Path, authorization: Option<&str>) -> AuthCheck {
    let Some((user, password)) = authorization.and_then(parse_basic) else {
        return AuthCheck::Unauthorized;
    };
    match read_auth_data(authfile) {
        Ok(users) => {
            if has_username_password(&users, &user, &password) {
                AuthCheck::Authorized
            } else {
                AuthCheck::Unauthorized
            }
        }
        Err(err) => {
            warn!(error = %err, "auth data unavailable");
            AuthCheck::Failure
        }
    }
}
