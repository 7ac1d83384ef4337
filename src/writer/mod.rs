//! Buffered response writers.
//!
//! Handlers and viewers write through a [`ResponseWriter`]; the application
//! turns the finished writer into a [`Response`]. A [`Compressor`] chosen from
//! `Accept-Encoding` may wrap the plain writer so the body is encoded as it is
//! written.

use std::io;
use std::sync::Arc;

use crate::http::{Headers, Response, StatusCode};

mod compress;

pub use compress::{DeflateCompressor, GzipCompressor};

/// Destination for one response.
///
/// Status and headers can be changed until the body is finalized by
/// [`finish`](Self::finish). Only the first [`write_status`](Self::write_status)
/// takes effect, and writing body bytes before any status implies `200 OK`.
pub trait ResponseWriter: io::Write + Send {
    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    /// Commits the status code unless one is already committed.
    fn write_status(&mut self, status: StatusCode);

    /// The committed status, if any.
    fn status_code(&self) -> Option<StatusCode>;

    /// Body bytes accepted so far, before any content encoding.
    fn body_bytes_sent(&self) -> usize;

    /// Drops the body written so far and un-commits the status, so the next
    /// [`write_status`](Self::write_status) takes effect. Headers stay.
    fn reset(&mut self);

    /// Flushes encoder framing. Runs exactly once, on request exit.
    fn close(&mut self) -> io::Result<()>;

    /// Produces the response. A writer that never committed a status yields
    /// `200 OK`.
    fn finish(self: Box<Self>) -> Response;
}

/// The plain, uncompressed writer.
#[derive(Debug, Default)]
pub struct StdResponseWriter {
    status: Option<StatusCode>,
    headers: Headers,
    body: Vec<u8>,
}

impl StdResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl io::Write for StdResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::Ok);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for StdResponseWriter {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    fn body_bytes_sent(&self) -> usize {
        self.body.len()
    }

    fn reset(&mut self) {
        self.status = None;
        self.body.clear();
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> Response {
        let this = *self;
        Response::from_parts(this.status.unwrap_or(StatusCode::Ok), this.headers, this.body)
    }
}

/// A content encoding that can wrap a response writer.
pub trait Compressor: Send + Sync {
    /// The `Accept-Encoding` / `Content-Encoding` token, e.g. `gzip`.
    fn accept_encoding(&self) -> &'static str;

    /// Wraps `inner` and sets `Content-Encoding` on it.
    fn wrap(&self, inner: Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter>;
}

/// Picks the compressor for an `Accept-Encoding` header.
///
/// `*` selects the first registered compressor; otherwise the first
/// registered compressor whose token the client lists wins. Codings with
/// `q=0` are treated as refused.
pub fn negotiate<'a>(
    accept_encoding: &str,
    compressors: &'a [Arc<dyn Compressor>],
) -> Option<&'a Arc<dyn Compressor>> {
    let accepted: Vec<&str> = accept_encoding
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let token = parts.next()?.trim();
            let refused = parts.any(|p| {
                p.trim()
                    .strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            });
            (!token.is_empty() && !refused).then_some(token)
        })
        .collect();

    if accepted.contains(&"*") {
        return compressors.first();
    }
    compressors.iter().find(|c| {
        accepted
            .iter()
            .any(|token| token.eq_ignore_ascii_case(c.accept_encoding()))
    })
}
