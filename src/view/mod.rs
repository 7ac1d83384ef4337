//! Viewers: per-MIME renderers selected by content negotiation.
//!
//! A route carries an ordered list of viewers plus an optional default. For a
//! request, [`Context::view`](crate::context::Context::view) walks the
//! `Accept` list in order and picks the first route viewer whose
//! [`MimeType`] matches, falling back to the default.

use std::fmt;

use serde_json::Value;

use crate::context::Context;
use crate::error::Result;

mod file;
mod html;
mod json;
pub mod mime;
mod string;
mod text;
mod xml;

pub use file::FileViewer;
pub use html::HtmlViewer;
pub use json::JsonViewer;
pub use string::StringViewer;
pub use text::{TextTemplate, TextViewer};
pub use xml::XmlViewer;

/// Renders data into the response and advertises the MIME type it produces.
pub trait Viewer: Send + Sync {
    fn mime_type(&self) -> MimeType;

    /// Writes headers and body for `data`.
    ///
    /// Viewers never overwrite a status the handler already committed.
    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()>;
}

/// A `type/subtype` pair without parameters. Either slot may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    pub kind: String,
    pub subtype: String,
}

impl MimeType {
    pub fn new(kind: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subtype: subtype.into(),
        }
    }

    /// `*/*`.
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parses a media type, dropping parameters. A missing subtype is `*`.
    ///
    /// ```
    /// use vista::view::MimeType;
    ///
    /// assert_eq!(MimeType::parse("text/html; q=0.9"), MimeType::new("text", "html"));
    /// assert_eq!(MimeType::parse(" image "), MimeType::new("image", "*"));
    /// ```
    pub fn parse(s: &str) -> Self {
        let essence = s.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            return Self::any();
        }
        match essence.split_once('/') {
            Some((kind, subtype)) => Self::new(kind.trim(), non_empty(subtype.trim())),
            None => Self::new(essence, "*"),
        }
    }

    /// Symmetric match: each slot matches when equal (ignoring case) or when
    /// either side is `*`.
    pub fn matches(&self, other: &MimeType) -> bool {
        slot(&self.kind, &other.kind) && slot(&self.subtype, &other.subtype)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() { "*" } else { s }
}

fn slot(a: &str, b: &str) -> bool {
    a == "*" || b == "*" || a.eq_ignore_ascii_case(b)
}

/// Parses an `Accept` header into media types in header order. An empty
/// header means `*/*`.
pub fn parse_accept(header: &str) -> Vec<MimeType> {
    let types: Vec<MimeType> = header
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(MimeType::parse)
        .collect();
    if types.is_empty() {
        vec![MimeType::any()]
    } else {
        types
    }
}
