use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{ViewEngine, files_under};
use crate::app::App;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::http::etag;
use crate::router::split_file;
use crate::view::FileViewer;
use crate::watcher::{Event, Op};

const ROOT: &str = "public/";

/// URL → fingerprinted URL for `.css` and `.js` files under `public/`.
///
/// Shared between the static engine, which fills it, and the `asset`
/// template function, which reads it.
#[derive(Debug, Clone, Default)]
pub struct AssetMap(Arc<RwLock<HashMap<String, String>>>);

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fingerprinted URL for `url`, or `url` itself when unknown.
    ///
    /// ```
    /// use vista::engine::AssetMap;
    ///
    /// let assets = AssetMap::new();
    /// assets.insert("/app.css", "/app-1a2b3c4d.css");
    /// assert_eq!(assets.resolve("/app.css"), "/app-1a2b3c4d.css");
    /// assert_eq!(assets.resolve("/other.css"), "/other.css");
    /// ```
    pub fn resolve(&self, url: &str) -> String {
        self.0
            .read()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_owned())
    }

    pub fn insert(&self, url: impl Into<String>, fingerprinted: impl Into<String>) {
        self.0.write().insert(url.into(), fingerprinted.into());
    }
}

/// Serves every file under `public/` on a `GET` route.
///
/// `public/@host/...` files are scoped to a virtual host and
/// `public/dir/index.html` answers on `/dir/` only. Created files get routes
/// as they appear; written files are read again on the next request;
/// removed files keep a route that answers 404.
#[derive(Debug, Default)]
pub struct StaticViewEngine;

impl StaticViewEngine {
    pub fn new() -> Self {
        Self
    }

    fn handle(&self, fsys: &Arc<dyn FileSystem>, app: &App, path: &str) -> Result<()> {
        let Some(rel) = path.strip_prefix(ROOT) else {
            return Ok(());
        };
        let route = split_file(rel);
        let viewer = Arc::new(FileViewer::new(fsys.clone(), path));
        app.handle_file(&route.pattern, viewer)?;

        if let Some(assets) = app.assets() {
            self.fingerprint(fsys, app, &assets, path, &route.host, &route.path)?;
        }
        Ok(())
    }

    // Registers `/name-<crc32>.ext` for host-less stylesheets and scripts.
    fn fingerprint(
        &self,
        fsys: &Arc<dyn FileSystem>,
        app: &App,
        assets: &AssetMap,
        path: &str,
        host: &str,
        url: &str,
    ) -> Result<()> {
        if !host.is_empty() {
            return Ok(());
        }
        let Some((stem, ext)) = url.rsplit_once('.') else {
            return Ok(());
        };
        if !(ext.eq_ignore_ascii_case("css") || ext.eq_ignore_ascii_case("js")) {
            return Ok(());
        }
        let content = fsys.read(path)?;
        let hash = etag::checksum(&content);
        let fingerprinted = format!("{stem}-{hash}.{ext}");
        app.handle_file(
            &format!("GET {fingerprinted}"),
            Arc::new(FileViewer::new(fsys.clone(), path)),
        )?;
        debug!(url = %url, asset = %fingerprinted, "asset fingerprinted");
        assets.insert(url, fingerprinted);
        Ok(())
    }
}

impl ViewEngine for StaticViewEngine {
    fn load(&mut self, fsys: &Arc<dyn FileSystem>, app: &App) -> Result<()> {
        let files = files_under(fsys.as_ref(), "public")?;
        for path in &files {
            self.handle(fsys, app, path)?;
        }
        info!(files = files.len(), "static files loaded");
        Ok(())
    }

    fn file_changed(&mut self, fsys: &Arc<dyn FileSystem>, app: &App, event: &Event) -> Result<()> {
        if !event.path.starts_with(ROOT) {
            return Ok(());
        }
        match event.op {
            Op::Create => self.handle(fsys, app, &event.path),
            // New content means a new fingerprint.
            Op::Write => match app.assets() {
                Some(assets) => {
                    let rel = &event.path[ROOT.len()..];
                    let route = split_file(rel);
                    self.fingerprint(fsys, app, &assets, &event.path, &route.host, &route.path)
                }
                None => Ok(()),
            },
            Op::Remove => Ok(()),
        }
    }
}
