use std::io::Write;

use serde_json::Value;

use super::{MimeType, Viewer};
use crate::context::Context;
use crate::error::Result;

/// Encodes data as JSON followed by a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonViewer;

impl Viewer for JsonViewer {
    fn mime_type(&self) -> MimeType {
        MimeType::new("application", "json")
    }

    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()> {
        let mut body = serde_json::to_vec(data)?;
        body.push(b'\n');
        ctx.write_header("Content-Type", "application/json");
        ctx.response_mut().write_all(&body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{Method, Request, StatusCode};

    #[test]
    fn encodes_with_trailing_newline() {
        let mut ctx = Context::for_test(Request::new(Method::Get, "/"));
        JsonViewer
            .render(&mut ctx, &json!([{"id": 1}, {"id": 2}]))
            .unwrap();
        let resp = ctx.into_writer().finish();
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.headers().get("content-type"), Some("application/json"));
        assert_eq!(resp.text(), "[{\"id\":1},{\"id\":2}]\n");
    }
}
