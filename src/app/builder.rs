use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{Dispatch, warn};

use super::{App, AppInner, Registry};
use crate::engine::{self, AssetMap, ViewEngine};
use crate::fs::FileSystem;
use crate::interceptor::Interceptor;
use crate::router::{Route, ServeMux};
use crate::template::FuncMap;
use crate::view::{JsonViewer, Viewer};
use crate::watcher::DEFAULT_CHECK_INTERVAL;
use crate::writer::Compressor;

/// Configures and builds an [`App`].
///
/// ```
/// use std::time::Duration;
/// use vista::app::App;
/// use vista::fs::MapFs;
/// use vista::writer::GzipCompressor;
///
/// let app = App::builder()
///     .fs(MapFs::new())
///     .compressor(GzipCompressor::default())
///     .check_interval(Duration::from_millis(500))
///     .template_func("count", |args| Ok(args.len().into()))
///     .build();
/// # let _ = app;
/// ```
#[must_use]
pub struct AppBuilder {
    dispatch: Option<Dispatch>,
    mux: ServeMux<Arc<Route>>,
    fsys: Option<Arc<dyn FileSystem>>,
    watch: bool,
    check_interval: Duration,
    engines: Option<Vec<Box<dyn ViewEngine>>>,
    default_viewer: Option<Arc<dyn Viewer>>,
    compressors: Vec<Arc<dyn Compressor>>,
    interceptor: Option<Arc<dyn Interceptor>>,
    funcs: FuncMap,
    asset_url: bool,
}

impl AppBuilder {
    pub(super) fn new() -> Self {
        Self {
            dispatch: None,
            mux: ServeMux::new(),
            fsys: None,
            watch: false,
            check_interval: DEFAULT_CHECK_INTERVAL,
            engines: None,
            default_viewer: Some(Arc::new(JsonViewer)),
            compressors: Vec::new(),
            interceptor: None,
            funcs: FuncMap::builtins(),
            asset_url: false,
        }
    }

    /// Sends the app's log records to `dispatch` instead of the global
    /// subscriber.
    pub fn logger(mut self, dispatch: impl Into<Dispatch>) -> Self {
        self.dispatch = Some(dispatch.into());
        self
    }

    /// Uses a preconfigured mux, e.g. one with trailing-slash redirects off.
    pub fn mux(mut self, mux: ServeMux<Arc<Route>>) -> Self {
        self.mux = mux;
        self
    }

    /// The file tree views and static routes are loaded from.
    pub fn fs(self, fsys: impl FileSystem + 'static) -> Self {
        self.shared_fs(Arc::new(fsys))
    }

    pub fn shared_fs(mut self, fsys: Arc<dyn FileSystem>) -> Self {
        self.fsys = Some(fsys);
        self
    }

    /// Reloads views when files change. Needs a Tokio runtime at build time.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Replaces the default Static, Html and Text engines.
    pub fn engines(mut self, engines: Vec<Box<dyn ViewEngine>>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// The viewer used when content negotiation fails. `None` turns the
    /// fallback off, so unmatched requests answer 404.
    pub fn default_viewer(mut self, viewer: Option<Arc<dyn Viewer>>) -> Self {
        self.default_viewer = viewer;
        self
    }

    /// Adds a response compressor. Earlier compressors are preferred.
    pub fn compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressors.push(Arc::new(compressor));
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Adds a template function, callable as a helper (`{{shout name}}`).
    /// Every template set registers the same map, so functions are only
    /// accepted here.
    pub fn template_func<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name, f);
        self
    }

    /// Fingerprints stylesheets and scripts under `public/` and adds the
    /// `asset` template function that maps `/app.css` to `/app-<crc32>.css`.
    pub fn asset_url(mut self, enabled: bool) -> Self {
        self.asset_url = enabled;
        self
    }

    /// Builds the app, loads every engine and starts the watcher if asked.
    ///
    /// Engine load failures are logged; the app is built regardless.
    pub fn build(self) -> App {
        let assets = self.asset_url.then(AssetMap::new);
        let mut funcs = self.funcs;
        if let Some(assets) = &assets {
            let assets = assets.clone();
            funcs.insert("asset", move |args: &[Value]| match args {
                [Value::String(url)] => Ok(Value::String(assets.resolve(url))),
                _ => Err("asset expects one string argument".to_owned()),
            });
        }

        let app = App {
            inner: Arc::new(AppInner {
                registry: RwLock::new(Registry {
                    mux: self.mux,
                    viewers: HashMap::new(),
                    middlewares: Vec::new(),
                }),
                engines: Mutex::new(Vec::new()),
                fsys: self.fsys,
                funcs: Arc::new(funcs),
                default_viewer: self.default_viewer,
                compressors: self.compressors,
                interceptor: self.interceptor,
                dispatch: self.dispatch,
                assets,
                watcher: Mutex::new(None),
            }),
        };

        let mut engines = self.engines.unwrap_or_else(engine::defaults);
        if let Some(fsys) = &app.inner.fsys {
            app.in_scope(|| {
                for engine in &mut engines {
                    if let Err(e) = engine.load(fsys, &app) {
                        warn!(error = %e, "view engine failed to load");
                    }
                }
            });
        }
        *app.inner.engines.lock() = engines;

        if self.watch {
            app.start_watcher(self.check_interval);
        }
        app
    }
}
