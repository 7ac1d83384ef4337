use std::io::Write;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use super::mime::ContentType;
use super::{MimeType, Viewer};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pool::BUF_POOL;
use crate::template::TemplateSet;

/// A compiled text template and the content type it is served as.
#[derive(Debug)]
pub struct TextTemplate {
    pub set: TemplateSet,
    pub content_type: ContentType,
}

/// Renders a text template (`text/sitemap.xml`, `text/robots.txt`, ...)
/// with the content type detected for its file.
#[derive(Clone)]
pub struct TextViewer {
    template: Arc<ArcSwap<TextTemplate>>,
}

impl TextViewer {
    pub fn new(template: Arc<ArcSwap<TextTemplate>>) -> Self {
        Self { template }
    }
}

impl Viewer for TextViewer {
    fn mime_type(&self) -> MimeType {
        self.template.load().content_type.mime.clone()
    }

    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()> {
        let template = self.template.load();
        let mut out = BUF_POOL.get();
        let result = match template.set.render_to(data, &mut out) {
            Ok(()) => {
                ctx.write_header("Content-Type", &template.content_type.header_value());
                ctx.response_mut().write_all(&out).map_err(Error::from)
            }
            Err(e) => Err(Error::Render(e)),
        };
        BUF_POOL.put(out);
        result
    }
}
