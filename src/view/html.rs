use std::io::Write;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use super::{MimeType, Viewer};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pool::BUF_POOL;
use crate::template::TemplateSet;

/// Renders an HTML template.
///
/// The viewer shares its template slot with the engine that compiled it, so a
/// reload is visible to the next request without re-registering the route.
/// Output is rendered into a pooled buffer first; a failing template writes
/// nothing.
#[derive(Clone)]
pub struct HtmlViewer {
    template: Arc<ArcSwap<TemplateSet>>,
}

impl HtmlViewer {
    pub fn new(template: Arc<ArcSwap<TemplateSet>>) -> Self {
        Self { template }
    }

    /// A viewer over a fixed set.
    pub fn from_set(set: TemplateSet) -> Self {
        Self::new(Arc::new(ArcSwap::from_pointee(set)))
    }

    /// The currently published template.
    pub fn template(&self) -> Arc<TemplateSet> {
        self.template.load_full()
    }
}

impl Viewer for HtmlViewer {
    fn mime_type(&self) -> MimeType {
        MimeType::new("text", "html")
    }

    fn render(&self, ctx: &mut Context, data: &Value) -> Result<()> {
        let mut out = BUF_POOL.get();
        let result = match self.template.load().render_to(data, &mut out) {
            Ok(()) => {
                ctx.write_header("Content-Type", "text/html; charset=utf-8");
                ctx.response_mut().write_all(&out).map_err(Error::from)
            }
            Err(e) => Err(Error::Render(e)),
        };
        BUF_POOL.put(out);
        result
    }
}
