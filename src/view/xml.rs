use std::io::Write;

use serde_json::Value;

use super::{MimeType, Viewer};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::Method;

/// Encodes data as XML under a configurable root element.
///
/// Objects become child elements per key and arrays repeat their parent
/// element, following `quick-xml`'s serde mapping.
#[derive(Debug, Clone)]
pub struct XmlViewer {
    root: String,
}

impl XmlViewer {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for XmlViewer {
    fn default() -> Self {
        Self::new("response")
    }
}

impl Viewer for XmlViewer {
    fn mime_type(&self) -> MimeType {
        MimeType::new("text", "xml")
    }

    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()> {
        ctx.write_header("Content-Type", "text/xml; charset=utf-8");
        if matches!(ctx.request().method(), Method::Head) {
            return Ok(());
        }
        let body = quick_xml::se::to_string_with_root(&self.root, data)
            .map_err(|e| Error::Xml(e.to_string()))?;
        ctx.response_mut().write_all(body.as_bytes())?;
        Ok(())
    }
}
