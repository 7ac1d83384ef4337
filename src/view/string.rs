use std::io::Write;

use serde_json::Value;

use super::{MimeType, Viewer};
use crate::context::Context;
use crate::error::Result;
use crate::http::Method;
use crate::template;

/// Writes data as plain text: strings verbatim, other values in their JSON
/// form, `null` as nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringViewer;

impl Viewer for StringViewer {
    fn mime_type(&self) -> MimeType {
        MimeType::new("text", "plain")
    }

    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()> {
        ctx.write_header("Content-Type", "text/plain; charset=utf-8");
        if matches!(ctx.request().method(), Method::Head) || data.is_null() {
            return Ok(());
        }
        let text = template::display(data);
        ctx.response_mut().write_all(text.as_bytes())?;
        Ok(())
    }
}
