//! Socket-free request/reply currency for the handlers.
//!
//! Handlers take plain strings and readers and return a [`Reply`]; the
//! tiny_http adapter in [`crate::server`] is the only code that touches
//! real sockets. Tests drive the full ingestion and page pipelines by
//! calling handlers directly and asserting on the `Reply`.

/// A complete HTTP response: status, headers, body.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    /// Plain-text response (`text/plain; charset=utf-8`).
    pub fn text(status: u16, body: &str) -> Reply {
        Reply {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.as_bytes().to_vec(),
        }
    }

    /// HTML response (`text/html; charset=utf-8`).
    pub fn html(status: u16, body: Vec<u8>) -> Reply {
        Reply {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string(),
            )],
            body,
        }
    }

    /// Raw response with an explicit content type.
    pub fn data(status: u16, content_type: &str, body: Vec<u8>) -> Reply {
        Reply {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Reply {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header with this name, case-insensitive. Test convenience.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text. Test convenience.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
