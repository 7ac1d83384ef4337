//! A finished HTTP/1.1 response and its wire encoding.
//!
//! Handlers never build these directly: they write through a
//! [`ResponseWriter`](crate::writer::ResponseWriter), which turns into a
//! `Response` once the middleware chain returns. The server then serializes it
//! with [`Response::into_bytes`].

use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// Status, headers and a fully buffered body.
///
/// ```
/// use vista::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
    // HEAD: headers describe the body but the bytes are not sent.
    omit_body: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self::from_parts(status, Headers::new(), Vec::new())
    }

    /// Assembles a response from what a response writer collected.
    pub fn from_parts(status: StatusCode, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            keep_alive: true,
            omit_body: false,
        }
    }

    /// Appends a header; repeated names are kept.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Chooses between `Connection: keep-alive` (the default) and `Connection: close`.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Keeps the headers (including `Content-Length`) but skips the body bytes
    /// on the wire, as required for answers to `HEAD`.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The buffered body, present even when [`without_body`](Self::without_body)
    /// was applied.
    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Encodes the status line, headers and body.
    ///
    /// `Connection` is always written. A non-empty body without a
    /// `Content-Type` gets `text/plain; charset=utf-8`. Statuses that carry no
    /// body (1xx, 204, 304) lose their body and get no `Content-Length`; every
    /// other status ends its headers with `Content-Length`.
    pub fn into_bytes(mut self) -> BytesMut {
        let has_body = self.status.allows_body();
        if !has_body {
            self.body.clear();
        }
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .set("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers.set(
            "Connection",
            if self.keep_alive { "keep-alive" } else { "close" },
        );

        let mut head = format!("HTTP/1.1 {}\r\n{}", self.status, self.headers);
        if has_body {
            let _ = write!(head, "Content-Length: {}\r\n", self.body.len());
        }
        head.push_str("\r\n");

        let sent = if self.omit_body { 0 } else { self.body.len() };
        let mut buf = BytesMut::with_capacity(head.len() + sent);
        buf.put(head.as_bytes());
        if sent > 0 {
            buf.put(self.body.as_slice());
        }
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(r: Response) -> String {
        String::from_utf8(r.into_bytes().to_vec()).unwrap()
    }

    // ── Framing ───────────────────────────────────────────────────────────────

    #[test]
    fn length_is_the_last_header() {
        let s = wire(
            Response::new(StatusCode::Ok)
                .header("X-Request-Id", "abc-123")
                .body("Hello"),
        );
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("X-Request-Id: abc-123\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.ends_with("Content-Length: 5\r\n\r\nHello"));
    }

    #[test]
    fn empty_body_has_zero_length_and_no_type() {
        let s = wire(Response::new(StatusCode::Ok));
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_header_is_not_duplicated() {
        let s = wire(
            Response::new(StatusCode::NotFound)
                .header("Connection", "keep-alive")
                .keep_alive(false),
        );
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(s.matches("Connection:").count(), 1);
        assert!(s.contains("Connection: close\r\n"));
    }

    // ── Bodiless answers ──────────────────────────────────────────────────────

    #[test]
    fn not_modified_has_no_length_or_body() {
        let s = wire(
            Response::new(StatusCode::NotModified)
                .header("ETag", "\"abc\"")
                .body("stale"),
        );
        assert!(s.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(!s.contains("Content-Type"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn head_keeps_length_but_drops_bytes() {
        let s = wire(Response::new(StatusCode::Ok).body("Hello").without_body());
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }
}
