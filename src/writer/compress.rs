//! gzip and deflate writers built on `flate2`.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};

use super::{Compressor, ResponseWriter};
use crate::http::{Headers, Response, StatusCode};

/// `Content-Encoding: gzip`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for GzipCompressor {
    fn accept_encoding(&self) -> &'static str {
        "gzip"
    }

    fn wrap(&self, inner: Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter> {
        Box::new(CompressedWriter::new(inner, Codec::Gzip, self.level))
    }
}

/// `Content-Encoding: deflate`.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCompressor {
    level: Compression,
}

impl DeflateCompressor {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for DeflateCompressor {
    fn accept_encoding(&self) -> &'static str {
        "deflate"
    }

    fn wrap(&self, inner: Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter> {
        Box::new(CompressedWriter::new(inner, Codec::Deflate, self.level))
    }
}

#[derive(Debug, Clone, Copy)]
enum Codec {
    Gzip,
    Deflate,
}

enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Encoder {
    fn new(codec: Codec, level: Compression) -> Self {
        match codec {
            Codec::Gzip => Self::Gzip(GzEncoder::new(Vec::new(), level)),
            Codec::Deflate => Self::Deflate(DeflateEncoder::new(Vec::new(), level)),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Gzip(e) => e.write_all(buf),
            Self::Deflate(e) => e.write_all(buf),
        }
    }

    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(e) => e.finish(),
            Self::Deflate(e) => e.finish(),
        }
    }
}

/// Encodes body bytes into the wrapped writer. The framing trailer is
/// written by [`close`](ResponseWriter::close).
struct CompressedWriter {
    inner: Box<dyn ResponseWriter>,
    codec: Codec,
    level: Compression,
    encoder: Option<Encoder>,
    written: usize,
}

impl CompressedWriter {
    fn new(mut inner: Box<dyn ResponseWriter>, codec: Codec, level: Compression) -> Self {
        let token = match codec {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        };
        let headers = inner.headers_mut();
        headers.set("Content-Encoding", token);
        headers.insert("Vary", "Accept-Encoding");
        Self {
            inner,
            codec,
            level,
            encoder: Some(Encoder::new(codec, level)),
            written: 0,
        }
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "response writer closed"));
        };
        self.inner.write_status(StatusCode::Ok);
        encoder.write_all(buf)?;
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for CompressedWriter {
    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.inner.write_status(status);
    }

    fn status_code(&self) -> Option<StatusCode> {
        self.inner.status_code()
    }

    fn body_bytes_sent(&self) -> usize {
        self.written
    }

    fn reset(&mut self) {
        self.encoder = Some(Encoder::new(self.codec, self.level));
        self.written = 0;
        self.inner.reset();
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        // Content-Encoding is stripped from 304s and error envelopes; those
        // carry no encoded payload.
        if !self.inner.headers().contains("content-encoding") {
            return Ok(());
        }
        let framed = encoder.finish()?;
        self.inner.write_all(&framed)
    }

    fn finish(mut self: Box<Self>) -> Response {
        if self.encoder.is_some() {
            let _ = self.close();
        }
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::{DeflateDecoder, GzDecoder};

    use super::*;
    use crate::writer::StdResponseWriter;

    fn run(compressor: &dyn Compressor, body: &[u8]) -> Response {
        let mut w = compressor.wrap(Box::new(StdResponseWriter::new()));
        w.headers_mut().set("Content-Type", "text/html; charset=utf-8");
        w.write_all(body).unwrap();
        assert_eq!(w.body_bytes_sent(), body.len());
        w.close().unwrap();
        w.finish()
    }

    #[test]
    fn gzip_round_trips() {
        let body = b"<html><body>hello hello hello</body></html>";
        let resp = run(&GzipCompressor::default(), body);
        assert_eq!(resp.headers().get("content-encoding"), Some("gzip"));
        assert_eq!(resp.headers().get("vary"), Some("Accept-Encoding"));

        let mut decoded = Vec::new();
        GzDecoder::new(resp.body_ref()).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn deflate_round_trips() {
        let body = b"deflate me, deflate me";
        let resp = run(&DeflateCompressor::new(9), body);
        assert_eq!(resp.headers().get("content-encoding"), Some("deflate"));

        let mut decoded = Vec::new();
        DeflateDecoder::new(resp.body_ref()).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn close_is_idempotent() {
        let mut w = GzipCompressor::default().wrap(Box::new(StdResponseWriter::new()));
        w.write_all(b"x").unwrap();
        w.close().unwrap();
        w.close().unwrap();
        assert!(w.write_all(b"late").is_err());
    }

    #[test]
    fn reset_restarts_the_stream() {
        let mut w = GzipCompressor::default().wrap(Box::new(StdResponseWriter::new()));
        w.write_all(b"garbage").unwrap();
        w.reset();
        assert_eq!(w.status_code(), None);
        w.write_all(b"clean").unwrap();
        w.close().unwrap();
        let resp = w.finish();

        let mut decoded = String::new();
        GzDecoder::new(resp.body_ref()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "clean");
    }
}
