//! View engines: loaders that turn a file tree into routes and viewers.
//!
//! Each engine owns one or more top-level directories:
//!
//! | Engine | Directories | Produces |
//! |---|---|---|
//! | [`StaticViewEngine`] | `public/` | a `GET` route per file |
//! | [`HtmlViewEngine`] | `components/ layouts/ pages/ views/` | page routes and named HTML viewers |
//! | [`TextViewEngine`] | `text/` | named text viewers |
//!
//! Engines see every watcher event and ignore paths outside their
//! directories, so the order they are registered in does not matter.

use std::sync::Arc;

use crate::app::App;
use crate::error::Result;
use crate::fs::{self, FileSystem};
use crate::watcher::Event;

mod html;
mod static_files;
mod text;

pub use html::HtmlViewEngine;
pub use static_files::{AssetMap, StaticViewEngine};
pub use text::TextViewEngine;

/// A loader that populates an [`App`] from a file tree and keeps it current.
pub trait ViewEngine: Send {
    /// Loads everything the engine owns. Called once when the app is built.
    fn load(&mut self, fsys: &Arc<dyn FileSystem>, app: &App) -> Result<()>;

    /// Applies one watcher event. Events arrive in the order they happened.
    fn file_changed(&mut self, fsys: &Arc<dyn FileSystem>, app: &App, event: &Event) -> Result<()>;
}

/// The engines an app gets unless configured otherwise.
pub fn defaults() -> Vec<Box<dyn ViewEngine>> {
    vec![
        Box::new(StaticViewEngine::new()),
        Box::new(HtmlViewEngine::new()),
        Box::new(TextViewEngine::new()),
    ]
}

// Lists the files under `root`, treating a missing root as empty.
fn files_under(fsys: &dyn FileSystem, root: &str) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    fs::walk_existing(fsys, root, &mut |path, _| {
        files.push(path.to_owned());
        Ok(())
    })?;
    Ok(files)
}

fn is_html(path: &str) -> bool {
    path.len() > 5
        && path
            .get(path.len() - 5..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".html"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_extension_check() {
        assert!(is_html("pages/index.html"));
        assert!(is_html("pages/INDEX.HTML"));
        assert!(!is_html(".html"));
        assert!(!is_html("pages/notes.txt"));
        // The last five bytes fall inside a multi-byte character.
        assert!(!is_html("pages/日本"));
        assert!(!is_html("日本語"));
    }
}
