//! The application: route table, viewer registry, view engines and the
//! request entry point.
//!
//! ```
//! use vista::app::App;
//! use vista::fs::MapFs;
//! use vista::http::{Method, Request, StatusCode};
//! use vista::router::{RouteOptions, handler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let app = App::builder()
//!     .fs(MapFs::new().with_file("public/robots.txt", "User-agent: *"))
//!     .build();
//! app.get("/hello", handler(|ctx| Box::pin(async move {
//!     ctx.view(&serde_json::json!({"hello": "world"}))
//! })), RouteOptions::new()).unwrap();
//!
//! let resp = app.serve(Request::new(Method::Get, "/robots.txt")).await;
//! assert_eq!(resp.status(), StatusCode::Ok);
//! let resp = app.serve(Request::new(Method::Get, "/hello")).await;
//! assert_eq!(resp.text(), "{\"hello\":\"world\"}\n");
//! # }
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, warn};

use crate::context::Context;
use crate::engine::{AssetMap, ViewEngine};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::http::{Method, Request, Response, StatusCode};
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;
use crate::router::{
    Handler, Resolution, Route, RouteOptions, ServeMux, handler, split_pattern, view_name,
};
use crate::template::FuncMap;
use crate::view::Viewer;
use crate::watcher::WatcherHandle;
use crate::writer::{self, Compressor, ResponseWriter, StdResponseWriter};

mod builder;
mod group;
mod reload;

pub use builder::AppBuilder;
pub use group::Group;

const NOT_FOUND_BODY: &str = "404 page not found\n";

/// Routes, viewers and middlewares. Guarded as a unit by the app lock.
struct Registry {
    mux: ServeMux<Arc<Route>>,
    viewers: HashMap<String, Arc<dyn Viewer>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

struct AppInner {
    registry: RwLock<Registry>,
    engines: Mutex<Vec<Box<dyn ViewEngine>>>,
    fsys: Option<Arc<dyn FileSystem>>,
    funcs: Arc<FuncMap>,
    default_viewer: Option<Arc<dyn Viewer>>,
    compressors: Vec<Arc<dyn Compressor>>,
    interceptor: Option<Arc<dyn Interceptor>>,
    dispatch: Option<Dispatch>,
    assets: Option<AssetMap>,
    watcher: Mutex<Option<WatcherHandle>>,
}

/// A cheaply clonable handle to a running application.
///
/// Build one with [`App::builder`]. Every clone shares the same routes and
/// viewers; registration is allowed at any time, including while serving.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    // ── Registration ──────────────────────────────────────────────────────────

    pub fn get(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        self.handle_func(&format!("GET {pattern}"), handler, options)
    }

    pub fn post(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        self.handle_func(&format!("POST {pattern}"), handler, options)
    }

    pub fn put(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        self.handle_func(&format!("PUT {pattern}"), handler, options)
    }

    pub fn delete(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        self.handle_func(&format!("DELETE {pattern}"), handler, options)
    }

    /// Registers `handler` under a full `[METHOD ][HOST]/PATH` pattern.
    ///
    /// Registering the same pattern again replaces the handler and options
    /// and keeps the route's viewers. A viewer registered under the route's
    /// view name (a page at the same path) is attached to the route.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPattern`] for malformed patterns.
    pub fn handle_func(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        self.register(pattern, handler, options, Vec::new())
    }

    /// Starts a group of routes sharing a path prefix and middlewares.
    pub fn group(&self, prefix: &str) -> Group {
        Group::new(self.clone(), prefix)
    }

    /// Appends an application middleware. It wraps every route, including
    /// routes registered before this call.
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        let mut registry = self.inner.registry.write();
        let Registry {
            mux, middlewares, ..
        } = &mut *registry;
        middlewares.push(middleware);
        for route in mux.values_mut() {
            Arc::make_mut(route).rebuild_chain(middlewares.as_slice());
        }
    }

    pub(crate) fn register(
        &self,
        pattern: &str,
        handler: Handler,
        options: RouteOptions,
        group: Vec<Arc<dyn Middleware>>,
    ) -> Result<()> {
        let parts = split_pattern(pattern)?;
        let name = view_name(&parts.host, &parts.path);
        let default = self.inner.default_viewer.clone();

        let mut registry = self.inner.registry.write();
        let Registry {
            mux,
            viewers,
            middlewares,
        } = &mut *registry;
        let mut route = match mux.get(pattern) {
            Some(existing) => {
                let mut route = Route::clone(existing);
                route.reregister(handler, options, default, group);
                route
            }
            None => Route::new(pattern, parts, handler, options, default, group),
        };
        if let Some(page) = viewers.get(&name) {
            route.add_viewer(page.clone());
        }
        route.rebuild_chain(middlewares.as_slice());
        mux.insert(pattern, Arc::new(route))?;
        debug!(pattern = %pattern, "route registered");
        Ok(())
    }

    /// Registers a page viewer under `name` and serves it on `pattern`.
    ///
    /// An existing route gains the viewer; otherwise a route rendering the
    /// viewer is created with the viewer as its default.
    pub fn handle_page(&self, pattern: &str, name: &str, viewer: Arc<dyn Viewer>) -> Result<()> {
        let mut registry = self.inner.registry.write();
        registry.viewers.insert(name.to_owned(), viewer.clone());
        match registry.mux.get(pattern).cloned() {
            Some(existing) => {
                let mut route = Route::clone(&existing);
                route.add_viewer(viewer);
                registry.mux.insert(pattern, Arc::new(route))
            }
            None => Self::insert_view_route(&mut registry, pattern, viewer),
        }
    }

    /// Serves `viewer` on `pattern` unless a route is already registered there.
    pub fn handle_file(&self, pattern: &str, viewer: Arc<dyn Viewer>) -> Result<()> {
        let mut registry = self.inner.registry.write();
        if registry.mux.get(pattern).is_some() {
            return Ok(());
        }
        Self::insert_view_route(&mut registry, pattern, viewer)
    }

    fn insert_view_route(registry: &mut Registry, pattern: &str, viewer: Arc<dyn Viewer>) -> Result<()> {
        let parts = split_pattern(pattern)?;
        let render = viewer.clone();
        let endpoint = handler(move |ctx| {
            let viewer = render.clone();
            Box::pin(async move { viewer.render(ctx, &Value::Null) })
        });
        let mut route = Route::new(
            pattern,
            parts,
            endpoint,
            RouteOptions::new(),
            Some(viewer),
            Vec::new(),
        );
        route.rebuild_chain(&registry.middlewares);
        registry.mux.insert(pattern, Arc::new(route))?;
        debug!(pattern = %pattern, "view route registered");
        Ok(())
    }

    /// Registers a viewer handlers can select by name with
    /// [`Context::view_with`].
    pub fn register_viewer(&self, name: impl Into<String>, viewer: Arc<dyn Viewer>) {
        self.inner.registry.write().viewers.insert(name.into(), viewer);
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    pub fn named_viewer(&self, name: &str) -> Option<Arc<dyn Viewer>> {
        self.inner.registry.read().viewers.get(name).cloned()
    }

    /// The viewer used when negotiation fails; JSON unless configured.
    pub fn default_viewer(&self) -> Option<Arc<dyn Viewer>> {
        self.inner.default_viewer.clone()
    }

    pub fn interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        self.inner.interceptor.clone()
    }

    /// The sealed template function map.
    pub fn funcs(&self) -> Arc<FuncMap> {
        self.inner.funcs.clone()
    }

    /// The fingerprinted asset table, when asset URLs are enabled.
    pub fn assets(&self) -> Option<AssetMap> {
        self.inner.assets.clone()
    }

    /// Registered patterns in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .mux
            .patterns()
            .map(str::to_owned)
            .collect()
    }

    pub fn route(&self, pattern: &str) -> Option<Arc<Route>> {
        self.inner.registry.read().mux.get(pattern).cloned()
    }

    /// Stops the hot-reload watcher, if any.
    pub fn close(&self) {
        if let Some(watcher) = self.inner.watcher.lock().take() {
            watcher.close();
        }
    }

    // ── Serving ───────────────────────────────────────────────────────────────

    /// Handles one request through routing, the middleware chain and error
    /// mapping.
    pub async fn serve(&self, request: Request) -> Response {
        match &self.inner.dispatch {
            Some(dispatch) => self.dispatch(request).with_subscriber(dispatch.clone()).await,
            None => self.dispatch(request).await,
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        let head = *request.method() == Method::Head;
        let resolution = self.inner.registry.read().mux.resolve(
            request.method(),
            request.host(),
            request.path(),
        );
        let (route, params) = match resolution {
            Resolution::Found { value, params, .. } => (value, params),
            Resolution::Redirect(path) => {
                let location = match request.query_string() {
                    Some(query) => format!("{path}?{query}"),
                    None => path,
                };
                return Response::new(StatusCode::MovedPermanently).header("Location", location);
            }
            Resolution::MethodNotAllowed(allow) => {
                return Response::new(StatusCode::MethodNotAllowed)
                    .header("Allow", allow.join(", "))
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body("Method Not Allowed\n");
            }
            Resolution::NotFound => {
                return Response::new(StatusCode::NotFound)
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body(NOT_FOUND_BODY);
            }
        };

        let mut response: Box<dyn ResponseWriter> = Box::new(StdResponseWriter::new());
        if let Some(compressor) =
            writer::negotiate(request.header("accept-encoding"), &self.inner.compressors)
        {
            response = compressor.wrap(response);
        }

        let chain = route.chain().clone();
        let mut ctx = Context::new(self.clone(), request, response, route, params);
        if let Err(err) = chain.run(&mut ctx).await {
            handle_error(&mut ctx, err);
        }

        let mut response = ctx.into_writer();
        if let Err(e) = response.close() {
            warn!(error = %e, "closing response writer");
        }
        let response = response.finish();
        if head { response.without_body() } else { response }
    }

    fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.inner.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes())
            .field("compressors", &self.inner.compressors.len())
            .finish_non_exhaustive()
    }
}

// Maps a chain error to the response envelope.
fn handle_error(ctx: &mut Context, err: Error) {
    match err {
        Error::Cancelled => {}
        Error::ViewNotFound => {
            ctx.write_header("Content-Type", "text/plain; charset=utf-8");
            ctx.write_status(StatusCode::NotFound);
            if let Err(e) = ctx.response_mut().write_all(b"view not found\n") {
                debug!(error = %e, "writing view-not-found body");
            }
        }
        err => {
            let log_id = next_log_id();
            let response = ctx.response_mut();
            response.reset();
            response.headers_mut().remove("content-encoding");
            ctx.write_header("X-Log-Id", &log_id);
            ctx.write_status(StatusCode::InternalServerError);
            error!(
                log_id = %log_id,
                method = %ctx.request().method(),
                path = %ctx.request().path(),
                error = %err,
                "request failed"
            );
        }
    }
}

static LOG_EPOCH: LazyLock<String> = LazyLock::new(|| {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);
    base36(millis)
});

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// A process-unique, increasing id: the start time and a counter, both in
/// base 36.
pub fn next_log_id() -> String {
    let seq = LOG_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{}-{}", *LOG_EPOCH, base36(seq))
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::fs::MapFs;
    use crate::middleware::from_fn;
    use crate::view::StringViewer;

    fn get(path: &str) -> Request {
        Request::new(Method::Get, path)
    }

    fn bare() -> App {
        App::builder().build()
    }

    // ── Log ids ───────────────────────────────────────────────────────────────

    #[test]
    fn base36_digits() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1_295), "zz");
    }

    #[test]
    fn log_ids_are_unique_and_share_an_epoch() {
        let a = next_log_id();
        let b = next_log_id();
        assert_ne!(a, b);
        assert_eq!(a.split_once('-').unwrap().0, b.split_once('-').unwrap().0);
    }

    // ── Routing ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let resp = bare().serve(get("/nope")).await;
        assert_eq!(resp.status(), StatusCode::NotFound);
        assert_eq!(resp.text(), NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn wrong_method_lists_allowed() {
        let app = bare();
        app.post("/items", handler(|_| Box::pin(async { Ok(()) })), RouteOptions::new())
            .unwrap();
        let resp = app.serve(get("/items")).await;
        assert_eq!(resp.status(), StatusCode::MethodNotAllowed);
        assert_eq!(resp.headers().get("allow"), Some("POST"));
    }

    #[tokio::test]
    async fn directory_redirect_keeps_query() {
        let app = bare();
        app.get("/docs/{$}", handler(|_| Box::pin(async { Ok(()) })), RouteOptions::new())
            .unwrap();
        let resp = app.serve(get("/docs?page=2")).await;
        assert_eq!(resp.status(), StatusCode::MovedPermanently);
        assert_eq!(resp.headers().get("location"), Some("/docs/?page=2"));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let app = bare();
        let err = app
            .handle_func("GET", handler(|_| Box::pin(async { Ok(()) })), RouteOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    // ── Re-registration ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn reregistering_replaces_handler() {
        let app = bare();
        let say = |word: &'static str| {
            handler(move |ctx| {
                Box::pin(async move {
                    ctx.response_mut().write_all(word.as_bytes())?;
                    Ok(())
                })
            })
        };
        app.get("/w", say("one"), RouteOptions::new()).unwrap();
        app.get("/w", say("two"), RouteOptions::new()).unwrap();
        assert_eq!(app.routes(), vec!["GET /w".to_owned()]);
        assert_eq!(app.serve(get("/w")).await.text(), "two");
    }

    #[tokio::test]
    async fn page_viewer_attaches_to_handler_route() {
        let app = bare();
        app.handle_page("GET /users", "users", Arc::new(StringViewer)).unwrap();
        app.get(
            "/users",
            handler(|ctx| Box::pin(async move { ctx.view(&json!("ann")) })),
            RouteOptions::new(),
        )
        .unwrap();

        let resp = app.serve(get("/users").with_header("Accept", "text/plain")).await;
        assert_eq!(resp.text(), "ann");
        let resp = app
            .serve(get("/users").with_header("Accept", "application/json"))
            .await;
        assert_eq!(resp.text(), "\"ann\"\n");
    }

    #[tokio::test]
    async fn handle_file_keeps_first_registration() {
        let app = bare();
        app.handle_file("GET /a.txt", Arc::new(StringViewer)).unwrap();
        let first = app.route("GET /a.txt").unwrap();
        app.handle_file("GET /a.txt", Arc::new(StringViewer)).unwrap();
        assert!(Arc::ptr_eq(&first, &app.route("GET /a.txt").unwrap()));
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn handler_errors_become_500_with_log_id() {
        let app = bare();
        app.get(
            "/boom",
            handler(|ctx| {
                Box::pin(async move {
                    ctx.response_mut().write_all(b"partial")?;
                    Err(Error::handler("boom"))
                })
            }),
            RouteOptions::new(),
        )
        .unwrap();
        let resp = app.serve(get("/boom")).await;
        assert_eq!(resp.status(), StatusCode::InternalServerError);
        assert!(resp.body_ref().is_empty());
        assert!(resp.headers().get("x-log-id").is_some_and(|id| id.contains('-')));
    }

    #[tokio::test]
    async fn committed_status_gives_way_to_500() {
        let app = bare();
        app.post(
            "/items",
            handler(|ctx| {
                Box::pin(async move {
                    ctx.write_status(StatusCode::Created);
                    Err(Error::handler("insert failed"))
                })
            }),
            RouteOptions::new(),
        )
        .unwrap();
        let resp = app.serve(Request::new(Method::Post, "/items")).await;
        assert_eq!(resp.status(), StatusCode::InternalServerError);
        assert!(resp.headers().contains("x-log-id"));
    }

    #[tokio::test]
    async fn compressed_errors_are_plain_500s() {
        let app = App::builder()
            .engines(Vec::new())
            .compressor(crate::writer::GzipCompressor::default())
            .build();
        app.get(
            "/boom",
            handler(|ctx| {
                Box::pin(async move {
                    ctx.response_mut().write_all(b"partial")?;
                    Err(Error::handler("boom"))
                })
            }),
            RouteOptions::new(),
        )
        .unwrap();
        let resp = app
            .serve(get("/boom").with_header("Accept-Encoding", "gzip"))
            .await;
        assert_eq!(resp.status(), StatusCode::InternalServerError);
        assert!(!resp.headers().contains("content-encoding"));
        assert!(resp.body_ref().is_empty());
    }

    #[tokio::test]
    async fn cancelled_keeps_what_was_written() {
        let app = bare();
        app.get(
            "/teapot",
            handler(|ctx| {
                Box::pin(async move {
                    ctx.write_status(StatusCode::Accepted);
                    ctx.response_mut().write_all(b"queued")?;
                    Err(Error::Cancelled)
                })
            }),
            RouteOptions::new(),
        )
        .unwrap();
        let resp = app.serve(get("/teapot")).await;
        assert_eq!(resp.status(), StatusCode::Accepted);
        assert_eq!(resp.text(), "queued");
        assert!(!resp.headers().contains("x-log-id"));
    }

    #[tokio::test]
    async fn no_viewer_is_404() {
        let app = App::builder().default_viewer(None).build();
        app.get(
            "/data",
            handler(|ctx| Box::pin(async move { ctx.view(&json!({"a": 1})) })),
            RouteOptions::new(),
        )
        .unwrap();
        let resp = app.serve(get("/data")).await;
        assert_eq!(resp.status(), StatusCode::NotFound);
        assert_eq!(resp.text(), "view not found\n");
    }

    // ── Middleware ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn late_middleware_wraps_existing_routes() {
        let app = App::builder()
            .fs(MapFs::new().with_file("public/a.txt", "a"))
            .build();
        app.use_middleware(from_fn(|ctx, next| {
            Box::pin(async move {
                ctx.write_header("X-Wrapped", "1");
                next.run(ctx).await
            })
        }));
        let resp = app.serve(get("/a.txt")).await;
        assert_eq!(resp.text(), "a");
        assert_eq!(resp.headers().get("x-wrapped"), Some("1"));
    }

    #[tokio::test]
    async fn head_drops_body_keeps_length() {
        let app = App::builder()
            .fs(MapFs::new().with_file("public/a.txt", "abc"))
            .build();
        let resp = app.serve(Request::new(Method::Head, "/a.txt")).await;
        assert_eq!(resp.status(), StatusCode::Ok);
        let wire = resp.into_bytes();
        let text = String::from_utf8_lossy(&wire);
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(!text.ends_with("abc"));
    }
}
