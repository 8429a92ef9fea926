//! HTTP host glue: the accept loop, worker threads, top-level dispatch.
//!
//! Everything interesting happens in the handler modules; this one owns
//! the sockets. A single [`tiny_http::Server`] is shared by a fixed pool
//! of worker threads (one per available core), each blocking on
//! `recv()` — read handlers run fully in parallel and only synchronize on
//! the state store's read lock.
//!
//! Mounts:
//!
//! ```text
//! /api/...      write API, Basic-Auth protected   → crate::ingest
//! /site/...     HTML pages and served files        → crate::site
//! /teapot/      RFC 2324 compliance                → 418
//! /exit/        dev-mode shutdown, else 403
//! ```

use crate::auth::{self, AuthCheck};
use crate::http::Reply;
use crate::ingest;
use crate::render::Renderer;
use crate::settings::Settings;
use crate::site;
use crate::state::Store;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tiny_http::{Header, Request, Response, StatusCode};
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Everything a worker needs, shared behind one `Arc`.
pub struct App {
    pub settings: Settings,
    pub store: Store,
    pub renderer: Renderer,
}

/// Bind and serve forever.
pub fn serve(app: Arc<App>) -> Result<(), ServerError> {
    let addr = format!("{}:{}", app.settings.host, app.settings.port);
    let server = tiny_http::Server::http(&addr).map_err(|err| ServerError::Bind {
        addr: addr.clone(),
        reason: err.to_string(),
    })?;
    let server = Arc::new(server);

    let workers = thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4);
    info!(addr = %addr, workers, "serving");

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let server = Arc::clone(&server);
        let app = Arc::clone(&app);
        handles.push(thread::spawn(move || loop {
            match server.recv() {
                Ok(request) => dispatch(&app, request),
                Err(err) => error!(error = %err, "accept failed"),
            }
        }));
    }
    for handle in handles {
        // Workers loop forever; joining keeps the main thread alive.
        let _ = handle.join();
    }
    Ok(())
}

/// Route one request and send the response.
fn dispatch(app: &App, mut request: Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url.as_str(), None),
    };

    let reply = if let Some(rest) = mount_rest(path, "/api") {
        let rest = rest.to_string();
        api_request(app, &mut request, &method, &rest)
    } else if let Some(rest) = mount_rest(path, "/site") {
        site::handle(&app.settings, &app.store, &app.renderer, &method, rest, query)
    } else if path == "/teapot" || path == "/teapot/" {
        Reply::text(418, "I'm a teapot.\n")
    } else if path == "/exit" || path == "/exit/" {
        if app.settings.dev {
            info!("dev exit requested, shutting down");
            let _ = request.respond(to_response(Reply::text(200, "Bye.\n")));
            std::process::exit(0);
        }
        Reply::text(403, "Forbidden.\n")
    } else {
        Reply::text(404, "Not found.\n")
    };

    info!(method = %method, url = %url, status = reply.status, "request");
    if let Err(err) = request.respond(to_response(reply)) {
        warn!(error = %err, "failed to write response");
    }
}

/// Basic-Auth gate in front of the ingestion controller.
fn api_request(app: &App, request: &mut Request, method: &str, rest: &str) -> Reply {
    let authorization = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Authorization"))
        .map(|header| header.value.as_str().to_string());

    match auth::check_request(&app.settings.authfile, authorization.as_deref()) {
        AuthCheck::Authorized => {}
        AuthCheck::Unauthorized => {
            return Reply::text(401, "Unauthorised.\n")
                .with_header("WWW-Authenticate", "Basic realm=\"Archive API\"");
        }
        AuthCheck::Failure => return Reply::text(500, "Internal server error!\n"),
    }

    ingest::handle(
        &app.settings,
        &app.store,
        method,
        rest,
        request.as_reader(),
    )
}

/// Path below a mount point: `/site/2001/x` under `/site` is `2001/x`.
/// `None` when the path is outside the mount.
fn mount_rest<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(mount)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        // "/siteX" is not under "/site".
        return None;
    }
    Some(rest.trim_start_matches('/'))
}

fn to_response(reply: Reply) -> Response<Cursor<Vec<u8>>> {
    let mut response =
        Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    for (name, value) in reply.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!(name = %name, value = %value, "dropping malformed header"),
        }
    }
    response
}
