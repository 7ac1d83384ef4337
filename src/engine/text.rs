use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use super::{ViewEngine, files_under};
use crate::app::App;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::template::{FuncMap, Mode, TemplateSet};
use crate::view::mime::{self, ContentType};
use crate::view::{MimeType, TextTemplate, TextViewer};
use crate::watcher::{Event, Op};

const ROOT: &str = "text/";

/// Registers every file under `text/` as a viewer named by its full path
/// (`text/sitemap.xml`), for handlers to pick with
/// [`Context::view_with`](crate::context::Context::view_with).
#[derive(Default)]
pub struct TextViewEngine {
    slots: HashMap<String, Arc<ArcSwap<TextTemplate>>>,
}

impl TextViewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(
        &mut self,
        fsys: &dyn FileSystem,
        app: &App,
        funcs: &Arc<FuncMap>,
        path: &str,
    ) -> Result<()> {
        let template = parse(fsys, funcs, path)?;
        match self.slots.get(path) {
            Some(slot) => {
                slot.store(Arc::new(template));
                info!(path = %path, "text template reloaded");
            }
            None => {
                let slot = Arc::new(ArcSwap::from_pointee(template));
                self.slots.insert(path.to_owned(), slot.clone());
                app.register_viewer(path, Arc::new(TextViewer::new(slot)));
            }
        }
        Ok(())
    }
}

impl ViewEngine for TextViewEngine {
    fn load(&mut self, fsys: &Arc<dyn FileSystem>, app: &App) -> Result<()> {
        let funcs = app.funcs();
        for path in files_under(fsys.as_ref(), "text")? {
            if let Err(e) = self.handle(fsys.as_ref(), app, &funcs, &path) {
                warn!(path = %path, error = %e, "skipping text template");
            }
        }
        info!(templates = self.slots.len(), "text templates loaded");
        Ok(())
    }

    fn file_changed(&mut self, fsys: &Arc<dyn FileSystem>, app: &App, event: &Event) -> Result<()> {
        if !event.path.starts_with(ROOT) {
            return Ok(());
        }
        match event.op {
            Op::Create | Op::Write => self.handle(fsys.as_ref(), app, &app.funcs(), &event.path),
            Op::Remove => Ok(()),
        }
    }
}

fn parse(fsys: &dyn FileSystem, funcs: &Arc<FuncMap>, path: &str) -> Result<TextTemplate> {
    let content = fsys.read(path)?;
    let src = String::from_utf8_lossy(&content);
    let set = TemplateSet::new(path, &src, funcs.clone(), Mode::Text).map_err(|source| {
        Error::Template {
            path: path.to_owned(),
            source,
        }
    })?;
    let content_type = if content.is_empty() {
        ContentType {
            mime: MimeType::new("text", "plain"),
            charset: mime::UTF8.to_owned(),
        }
    } else {
        mime::detect(path, &content)
    };
    Ok(TextTemplate {
        set,
        content_type,
    })
}
