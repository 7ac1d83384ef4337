use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use super::{MimeType, Viewer, mime};
use crate::context::Context;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::http::{StatusCode, date, etag};

/// Serves one file with conditional and range support.
///
/// On an immutable file system the content and its CRC32 entity tag are
/// captured once at construction. Otherwise the file is read per request and
/// `Last-Modified` drives `If-Modified-Since`.
pub struct FileViewer {
    fsys: Arc<dyn FileSystem>,
    path: String,
    etag: Option<String>,
    cache: Option<Bytes>,
}

impl FileViewer {
    pub fn new(fsys: Arc<dyn FileSystem>, path: impl Into<String>) -> Self {
        let path = path.into();
        let cache = if fsys.is_immutable() {
            fsys.read(&path).ok()
        } else {
            None
        };
        let etag = cache.as_deref().map(etag::compute);
        Self {
            fsys,
            path,
            etag,
            cache,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The precomputed entity tag, present only for immutable file systems.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn load(&self) -> io::Result<(Bytes, Option<std::time::SystemTime>)> {
        if let Some(cache) = &self.cache {
            return Ok((cache.clone(), None));
        }
        let meta = self.fsys.metadata(&self.path)?;
        if meta.is_dir {
            return Err(crate::fs::not_found(&self.path));
        }
        Ok((self.fsys.read(&self.path)?, meta.modified))
    }
}

impl Viewer for FileViewer {
    fn mime_type(&self) -> MimeType {
        MimeType::any()
    }

    fn render(&self, ctx: &mut Context, _data: &Value) -> Result<()> {
        let (content, modified) = match self.load() {
            Ok(loaded) => loaded,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ctx.write_header("Content-Type", "text/plain; charset=utf-8");
                ctx.write_status(StatusCode::NotFound);
                ctx.response_mut().write_all(b"404 page not found\n")?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let compressed = ctx.response().headers().contains("content-encoding");
        if !ctx.response().headers().contains("content-type") {
            let content_type = mime::detect(&self.path, &content).header_value();
            ctx.write_header("Content-Type", &content_type);
        }
        if let Some(tag) = &self.etag {
            // An encoded body is a different representation of the same bytes.
            let tag = if compressed { format!("W/{tag}") } else { tag.clone() };
            ctx.write_header("ETag", &tag);
        }
        if let Some(modified) = modified {
            ctx.write_header("Last-Modified", &date::format(modified));
        }

        if not_modified(ctx, modified) {
            let status = etag::strip_for_not_modified(ctx.response_mut().headers_mut());
            ctx.write_status(status);
            return Ok(());
        }

        if compressed {
            ctx.response_mut().write_all(&content)?;
            return Ok(());
        }

        ctx.write_header("Accept-Ranges", "bytes");
        let len = content.len() as u64;
        match parse_range(ctx.request().header("range"), len) {
            None => ctx.response_mut().write_all(&content)?,
            Some(Ok((start, end))) => {
                ctx.write_header("Content-Range", &format!("bytes {start}-{end}/{len}"));
                ctx.write_status(StatusCode::PartialContent);
                ctx.response_mut()
                    .write_all(&content[start as usize..=end as usize])?;
            }
            Some(Err(())) => {
                ctx.write_header("Content-Range", &format!("bytes */{len}"));
                ctx.write_status(StatusCode::RangeNotSatisfiable);
            }
        }
        Ok(())
    }
}

// If-None-Match takes precedence; If-Modified-Since is consulted only without it.
fn not_modified(ctx: &Context, modified: Option<std::time::SystemTime>) -> bool {
    let req = ctx.request();
    if req.headers().contains("if-none-match") {
        return etag::if_none_match(req.method(), req.headers(), ctx.response().headers());
    }
    if !matches!(req.method(), crate::http::Method::Get | crate::http::Method::Head) {
        return false;
    }
    match (modified, date::parse(req.header("if-modified-since"))) {
        (Some(modified), Some(since)) => date::truncate(modified) <= since,
        _ => false,
    }
}

/// Parses a single `bytes=` range against a body of `len` bytes.
///
/// `None` means the header is absent or not something we serve partially
/// (other units, several ranges); `Some(Err(()))` means unsatisfiable.
fn parse_range(header: &str, len: u64) -> Option<Result<(u64, u64), ()>> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());
    if len == 0 {
        return Some(Err(()));
    }

    let range = if first.is_empty() {
        match last.parse::<u64>() {
            Ok(0) | Err(_) => Err(()),
            Ok(n) => Ok((len.saturating_sub(n), len - 1)),
        }
    } else {
        match first.parse::<u64>() {
            Ok(start) if start < len => {
                if last.is_empty() {
                    Ok((start, len - 1))
                } else {
                    match last.parse::<u64>() {
                        Ok(end) if end >= start => Ok((start, end.min(len - 1))),
                        _ => Err(()),
                    }
                }
            }
            _ => Err(()),
        }
    };
    Some(range)
}
