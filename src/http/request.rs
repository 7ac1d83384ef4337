//! Incoming requests, parsed with [`httparse`] or built in code.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffer could not be read as a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The header block has not fully arrived; read more and retry.
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// An HTTP/1.x request with its body fully buffered.
///
/// ```
/// use vista::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.host(), "localhost");
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Reads the request line and headers from `buf`.
    ///
    /// Returns the request and the offset where its body starts. The body is
    /// whatever follows the headers in `buf`, capped at `Content-Length`; the
    /// caller waits until `offset + content_length()` bytes are buffered.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the header block is complete,
    /// [`RequestError::Parse`] for malformed input and
    /// [`RequestError::MissingField`] when the request line lacks a part.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut slots);
        let httparse::Status::Complete(offset) = raw.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let method = raw.method.ok_or(RequestError::MissingField { field: "method" })?;
        let target = raw.path.ok_or(RequestError::MissingField { field: "path" })?;
        let version = raw.version.ok_or(RequestError::MissingField { field: "version" })?;

        let mut request = Self::new(Method::from_token(method), target);
        request.version = version;
        request.headers = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            // Non-UTF-8 values cannot be matched against anyway.
            if let Ok(value) = std::str::from_utf8(header.value) {
                request.headers.insert(header.name, value);
            }
        }

        let rest = &buf[offset..];
        let len = request.content_length().unwrap_or(0).min(rest.len());
        request.body = Bytes::copy_from_slice(&rest[..len]);
        Ok((request, offset))
    }

    /// Builds an HTTP/1.1 request without headers or body. `target` may carry
    /// a query string.
    ///
    /// ```
    /// use vista::http::{Method, Request};
    ///
    /// let req = Request::new(Method::Get, "/users?page=2").with_header("Host", "abc.com");
    /// assert_eq!(req.path(), "/users");
    /// assert_eq!(req.query_param("page"), Some("2"));
    /// assert_eq!(req.host(), "abc.com");
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };
        let params = query.as_deref().map(parse_query).unwrap_or_default();
        Self {
            method,
            path,
            version: 1,
            headers: Headers::new(),
            query,
            body: Bytes::new(),
            params,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path without its query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP minor version (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The first value of a header, or `""` when absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name).unwrap_or("")
    }

    /// The `Host` header without its port. Routes match on this.
    pub fn host(&self) -> &str {
        let host = self.header("host");
        match host.rfind(':') {
            // Leave bracketed IPv6 literals without a port untouched.
            Some(pos) if !host[pos..].contains(']') => &host[..pos],
            _ => host,
        }
    }

    /// The raw query string, without the leading `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// HTTP/1.1 keeps the connection open unless told otherwise; HTTP/1.0
    /// closes it unless `Connection: keep-alive` is sent.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

// `+` decodes to a space; percent escapes are left as they are.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}
