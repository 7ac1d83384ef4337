//! Entity tags and conditional GET handling (RFC 7232).

use crc32fast::Hasher;

use super::{Headers, Method, StatusCode};

/// Computes a strong entity tag for `content`: the CRC32 (IEEE) of the bytes
/// in lower-case hex, wrapped in double quotes.
///
/// ```
/// let tag = vista::http::etag::compute(b"hello");
/// assert_eq!(tag, "\"3610a686\"");
/// ```
pub fn compute(content: &[u8]) -> String {
    format!("\"{}\"", checksum(content))
}

/// The bare CRC32 of `content` as eight hex digits, as used in asset
/// fingerprints.
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    format!("{:08x}", hasher.finalize())
}

/// Returns `true` when the `If-None-Match` request header matches the `ETag`
/// already present in `response_headers`.
///
/// Only `GET` and `HEAD` requests are considered.
pub fn if_none_match(method: &Method, request_headers: &Headers, response_headers: &Headers) -> bool {
    if !matches!(method, Method::Get | Method::Head) {
        return false;
    }
    let Some(header) = request_headers.get("if-none-match") else {
        return false;
    };
    let current = response_headers.get("etag").unwrap_or("");

    let mut buf = header;
    loop {
        buf = buf.trim_matches(|c| c == ' ' || c == '\t');
        if buf.is_empty() {
            return false;
        }
        if let Some(rest) = buf.strip_prefix(',') {
            buf = rest;
            continue;
        }
        if buf.starts_with('*') {
            return true;
        }
        let Some((tag, remain)) = scan(buf) else {
            return false;
        };
        if weak_match(tag, current) {
            return true;
        }
        buf = remain;
    }
}

/// Strips representation headers for a `304 Not Modified` answer and returns
/// the status to write.
///
/// `Last-Modified` is only dropped when an `ETag` is present, since a cache
/// can still use it to validate otherwise.
pub fn strip_for_not_modified(headers: &mut Headers) -> StatusCode {
    headers.remove("content-type");
    headers.remove("content-length");
    headers.remove("content-encoding");
    if headers.contains("etag") {
        headers.remove("last-modified");
    }
    StatusCode::NotModified
}

// Scans one entity tag (`"x"` or `W/"x"`) at the start of `s`.
fn scan(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let start = if s.starts_with("W/") { 2 } else { 0 };
    if bytes.len() < start + 2 || bytes[start] != b'"' {
        return None;
    }
    for (i, &c) in bytes.iter().enumerate().skip(start + 1) {
        match c {
            0x21 | 0x23..=0x7E | 0x80..=0xFF => {}
            b'"' => return Some((&s[..=i], &s[i + 1..])),
            _ => return None,
        }
    }
    None
}

fn weak_match(a: &str, b: &str) -> bool {
    a.strip_prefix("W/").unwrap_or(a) == b.strip_prefix("W/").unwrap_or(b)
}
