//! Content-type detection by extension, then by content sniffing.

use super::MimeType;

/// The charset suffix applied to textual types without one.
pub const UTF8: &str = "; charset=utf-8";

// Only this much of the content is inspected.
const SNIFF_LEN: usize = 512;

/// A detected content type: the bare media type plus its parameter suffix
/// (`"; charset=utf-8"` or empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub mime: MimeType,
    pub charset: String,
}

impl ContentType {
    /// The full header value, e.g. `text/css; charset=utf-8`.
    pub fn header_value(&self) -> String {
        format!("{}{}", self.mime, self.charset)
    }
}

/// Detects the content type of `path`, looking at the extension first and
/// sniffing `content` when the extension is unknown.
///
/// Textual types get [`UTF8`] unless sniffing already produced a charset.
///
/// ```
/// use vista::view::mime::detect;
///
/// assert_eq!(detect("a/style.css", b"").header_value(), "text/css; charset=utf-8");
/// assert_eq!(detect("logo.png", b"").header_value(), "image/png");
/// assert_eq!(detect("README", b"plain words").header_value(), "text/plain; charset=utf-8");
/// ```
pub fn detect(path: &str, content: &[u8]) -> ContentType {
    let by_ext = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_owned());
    let raw = match by_ext {
        Some(essence) => essence,
        None => sniff(content).to_owned(),
    };

    let (essence, params) = match raw.split_once(';') {
        Some((essence, params)) => (essence.trim().to_owned(), format!(";{params}")),
        None => (raw.clone(), String::new()),
    };
    let mime = MimeType::parse(&essence);
    let charset = if !params.is_empty() {
        params
    } else if is_textual(&mime) {
        UTF8.to_owned()
    } else {
        String::new()
    };
    ContentType { mime, charset }
}

/// Returns `true` for types whose bodies are text.
pub fn is_textual(mime: &MimeType) -> bool {
    mime.kind.eq_ignore_ascii_case("text")
        || matches!(
            mime.subtype.as_str(),
            "json" | "javascript" | "xml" | "xhtml+xml" | "manifest+json" | "ld+json" | "svg+xml"
        )
}

/// Guesses a content type from leading bytes.
///
/// Byte-order marks and markup are recognized here; binary formats (images,
/// archives, fonts, ...) are left to [`infer`]'s magic-number matchers. Data
/// without binary bytes falls back to `text/plain`, anything else to
/// `application/octet-stream`. Empty content is `text/plain`.
pub fn sniff(content: &[u8]) -> &'static str {
    let data = &content[..content.len().min(SNIFF_LEN)];
    if data.is_empty() {
        return "text/plain; charset=utf-8";
    }

    for (bom, mime) in BOMS {
        if data.starts_with(bom) {
            return mime;
        }
    }

    let text = trim_leading_ws(data);
    if starts_with_ignore_case(text, b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    for tag in HTML_TAGS {
        if starts_with_ignore_case(text, tag)
            && text
                .get(tag.len())
                .is_some_and(|&b| b == b' ' || b == b'>')
        {
            return "text/html; charset=utf-8";
        }
    }
    if text.starts_with(b"<!--") {
        return "text/html; charset=utf-8";
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }
    if data.iter().any(|&b| is_binary(b)) {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

const BOMS: &[(&[u8], &str)] = &[
    (b"\xEF\xBB\xBF", "text/plain; charset=utf-8"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
];

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
];

fn trim_leading_ws(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── detect ────────────────────────────────────────────────────────────────

    #[test]
    fn extension_wins_over_content() {
        let ct = detect("data.json", b"<html>");
        assert_eq!(ct.mime, MimeType::new("application", "json"));
        assert_eq!(ct.charset, UTF8);
    }

    #[test]
    fn unknown_extension_is_sniffed() {
        assert_eq!(
            detect("robots", b"<!DOCTYPE html><html>").header_value(),
            "text/html; charset=utf-8"
        );
        assert_eq!(detect("blob", b"\x00\x01\x02").header_value(), "application/octet-stream");
    }

    #[test]
    fn sniffed_charset_is_kept() {
        let ct = detect("notes", b"\xFF\xFEh\x00i\x00");
        assert_eq!(ct.charset, "; charset=utf-16le");
    }

    // ── sniff ─────────────────────────────────────────────────────────────────

    #[test]
    fn sniff_signatures() {
        assert_eq!(sniff(b"GIF89a..."), "image/gif");
        assert_eq!(sniff(b"\x89PNG\r\n\x1A\n...."), "image/png");
        assert_eq!(sniff(b"%PDF-1.7"), "application/pdf");
        assert_eq!(sniff(b"\xEF\xBB\xBFhello"), "text/plain; charset=utf-8");
        assert_eq!(sniff(b"  <?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        assert_eq!(sniff(b"\n<p>hello</p>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<pre>"), "text/plain; charset=utf-8");
        assert_eq!(sniff(b""), "text/plain; charset=utf-8");
    }
}
