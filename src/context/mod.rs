//! Per-request context: request, response writer, matched route and state.
//!
//! A [`Context`] lives for exactly one request. Handlers read the request,
//! stash values for later middleware, and finish with [`Context::view`] to let
//! content negotiation pick a viewer for their data.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::App;
use crate::error::{Error, Result};
use crate::http::{Request, StatusCode};
use crate::router::Route;
use crate::view::{self, MimeType, Viewer};
use crate::writer::ResponseWriter;

/// String-keyed, type-erased request values.
///
/// Middleware uses these to hand data to handlers (the authenticated user, a
/// request id) without the two knowing each other's types.
#[derive(Default)]
pub struct Values {
    map: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under `key`.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if it exists and has type `T`.
    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self, key: &str) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Removes and returns the value under `key` if it has type `T`.
    pub fn remove<T>(&mut self, key: &str) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        match self.map.remove(key)?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.map.insert(key.to_owned(), other);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
}

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-request context handed to middleware and handlers.
pub struct Context {
    app: App,
    request: Request,
    response: Box<dyn ResponseWriter>,
    route: Arc<Route>,
    params: Parameters,
    values: Values,
    temp_data: Map<String, Value>,
}

impl Context {
    pub(crate) fn new(
        app: App,
        request: Request,
        response: Box<dyn ResponseWriter>,
        route: Arc<Route>,
        params: Parameters,
    ) -> Self {
        Self {
            app,
            request,
            response,
            route,
            params,
            values: Values::new(),
            temp_data: Map::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A path parameter captured by the route pattern, e.g. `{id}`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn response(&self) -> &dyn ResponseWriter {
        &*self.response
    }

    /// The writer, for handlers that produce the body themselves.
    pub fn response_mut(&mut self) -> &mut dyn ResponseWriter {
        &mut *self.response
    }

    /// Commits the status code. Only the first call has an effect.
    pub fn write_status(&mut self, status: StatusCode) {
        self.response.write_status(status);
    }

    /// Returns `true` once a status has been committed.
    pub fn written_status(&self) -> bool {
        self.response.status_code().is_some()
    }

    /// Sets a response header; an empty value deletes it.
    pub fn write_header(&mut self, key: &str, value: &str) {
        let headers = self.response.headers_mut();
        if value.is_empty() {
            headers.remove(key);
        } else {
            headers.set(key, value);
        }
    }

    /// Stores a request-scoped value.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key, value);
    }

    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get(key)
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    /// A per-request scratchpad of JSON values shared by middleware and the
    /// handler. Viewers never read it; copy what a template needs into the
    /// view data.
    pub fn temp_data(&self) -> &Map<String, Value> {
        &self.temp_data
    }

    pub fn temp_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.temp_data
    }

    /// Media types from `Accept` in header order; `*/*` when absent.
    pub fn accept(&self) -> Vec<MimeType> {
        view::parse_accept(self.request.header("accept"))
    }

    /// Language tags from `Accept-Language` in header order, without weights.
    pub fn accept_language(&self) -> Vec<String> {
        let header = self.request.header("accept-language");
        if header.is_empty() {
            return Vec::new();
        }
        header
            .split(',')
            .map(|item| item.split(';').next().unwrap_or_default().trim().to_owned())
            .collect()
    }

    /// The page the request came from: the interceptor's answer when it has
    /// one, else the `Referer` header.
    pub fn request_referer(&self) -> Option<String> {
        if let Some(referer) = self
            .app
            .interceptor()
            .and_then(|interceptor| interceptor.request_referer(self))
        {
            return Some(referer);
        }
        let referer = self.request.header("referer");
        (!referer.is_empty()).then(|| referer.to_owned())
    }

    /// Redirects to `url` with `status` (`302 Found` by default), unless the
    /// interceptor answers the redirect itself.
    pub fn redirect(&mut self, url: &str, status: Option<StatusCode>) {
        let status = status.unwrap_or(StatusCode::Found);
        if let Some(interceptor) = self.app.interceptor() {
            if interceptor.redirect(self, url, status) {
                return;
            }
        }
        self.write_header("Location", url);
        self.write_status(status);
    }

    /// Renders `data` with the route viewer that best matches `Accept`.
    ///
    /// # Errors
    ///
    /// [`Error::ViewNotFound`] when no route viewer matches and the route has
    /// no default viewer; otherwise whatever the viewer reports.
    pub fn view<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<()> {
        let accepted = self.accept();
        let viewer = self
            .route
            .negotiate(&accepted)
            .or_else(|| self.route.default_viewer())
            .cloned();
        self.render_with(viewer, data)
    }

    /// Renders `data` with the viewer registered under `name`, provided its
    /// MIME type is acceptable to the client. Falls back to the route's
    /// default viewer otherwise.
    pub fn view_with<T: Serialize + ?Sized>(&mut self, data: &T, name: &str) -> Result<()> {
        let accepted = self.accept();
        let viewer = self
            .app
            .named_viewer(name)
            .filter(|viewer| {
                let mime = viewer.mime_type();
                accepted.iter().any(|want| mime.matches(want))
            })
            .or_else(|| self.route.default_viewer().cloned());
        self.render_with(viewer, data)
    }

    fn render_with<T: Serialize + ?Sized>(
        &mut self,
        viewer: Option<Arc<dyn Viewer>>,
        data: &T,
    ) -> Result<()> {
        let viewer = viewer.ok_or(Error::ViewNotFound)?;
        let data = serde_json::to_value(data)?;
        viewer.render(self, &data)?;
        self.write_status(StatusCode::Ok);
        Ok(())
    }

    pub(crate) fn into_writer(self) -> Box<dyn ResponseWriter> {
        self.response
    }

    #[cfg(test)]
    pub(crate) fn for_test(request: Request) -> Self {
        use crate::router::{PatternParts, RouteOptions, handler};
        use crate::writer::StdResponseWriter;

        let app = App::builder().build();
        let route = Route::new(
            "",
            PatternParts::default(),
            handler(|_| Box::pin(async { Ok(()) })),
            RouteOptions::new(),
            app.default_viewer(),
            Vec::new(),
        );
        Self::new(
            app,
            request,
            Box::new(StdResponseWriter::new()),
            Arc::new(route),
            Parameters::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::http::Method;
    use crate::interceptor::HtmxInterceptor;

    fn ctx(req: Request) -> Context {
        Context::for_test(req)
    }

    fn finish(ctx: Context) -> crate::http::Response {
        ctx.into_writer().finish()
    }

    // ── Values ────────────────────────────────────────────────────────────────

    #[test]
    fn values_are_typed() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.set("user", String::from("ann"));
        c.set("count", 3u32);
        assert_eq!(c.get::<String>("user").map(String::as_str), Some("ann"));
        assert_eq!(c.get::<u32>("count"), Some(&3));
        assert!(c.get::<u64>("count").is_none());
        assert!(c.get::<String>("missing").is_none());
    }

    #[test]
    fn temp_data_stays_out_of_rendering() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.temp_data_mut().insert("flash".into(), Value::from("saved"));
        assert_eq!(c.temp_data().get("flash"), Some(&Value::from("saved")));

        c.view(&serde_json::json!({"id": 1})).unwrap();
        assert_eq!(finish(c).text(), "{\"id\":1}\n");
    }

    #[test]
    fn remove_with_wrong_type_keeps_value() {
        let mut v = Values::new();
        v.insert("k", 1i32);
        assert_eq!(v.remove::<String>("k"), None);
        assert!(v.contains("k"));
        assert_eq!(v.remove::<i32>("k"), Some(1));
        assert!(!v.contains("k"));
    }

    // ── Headers and status ────────────────────────────────────────────────────

    #[test]
    fn empty_header_value_deletes() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.write_header("X-A", "1");
        c.write_header("X-A", "2");
        assert_eq!(c.response().headers().get_all("x-a").count(), 1);
        c.write_header("X-A", "");
        assert!(!c.response().headers().contains("x-a"));
    }

    #[test]
    fn status_is_written_once() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        assert!(!c.written_status());
        c.write_status(StatusCode::Created);
        c.write_status(StatusCode::NotFound);
        assert!(c.written_status());
        assert_eq!(finish(c).status(), StatusCode::Created);
    }

    // ── Accept parsing ────────────────────────────────────────────────────────

    #[test]
    fn accept_language_drops_weights() {
        let c = ctx(Request::new(Method::Get, "/").with_header("Accept-Language", "en-US, fr;q=0.8,de"));
        assert_eq!(c.accept_language(), vec!["en-US", "fr", "de"]);

        let c = ctx(Request::new(Method::Get, "/"));
        assert!(c.accept_language().is_empty());
        assert_eq!(c.accept(), vec![MimeType::any()]);
    }

    // ── Redirect ──────────────────────────────────────────────────────────────

    #[test]
    fn redirect_defaults_to_found() {
        let mut c = ctx(Request::new(Method::Post, "/login"));
        c.redirect("/home", None);
        let resp = finish(c);
        assert_eq!(resp.status(), StatusCode::Found);
        assert_eq!(resp.headers().get("location"), Some("/home"));
    }

    #[test]
    fn htmx_redirect_is_intercepted() {
        let app = App::builder().interceptor(Arc::new(HtmxInterceptor)).build();
        let mut c = ctx(Request::new(Method::Post, "/login").with_header("HX-Request", "true"));
        c.app = app;
        c.redirect("/home", Some(StatusCode::SeeOther));
        let resp = finish(c);
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.headers().get("hx-redirect"), Some("/home"));
        assert!(!resp.headers().contains("location"));
    }

    #[test]
    fn referer_falls_back_to_header() {
        let c = ctx(Request::new(Method::Get, "/").with_header("Referer", "/from"));
        assert_eq!(c.request_referer().as_deref(), Some("/from"));
        let c = ctx(Request::new(Method::Get, "/"));
        assert_eq!(c.request_referer(), None);
    }

    // ── View ──────────────────────────────────────────────────────────────────

    #[test]
    fn view_defaults_to_json() {
        let mut c = ctx(Request::new(Method::Get, "/").with_header("Accept", "application/json"));
        c.view(&serde_json::json!({"name": "ann"})).unwrap();
        let resp = finish(c);
        assert_eq!(resp.headers().get("content-type"), Some("application/json"));
        assert_eq!(resp.text(), "{\"name\":\"ann\"}\n");
    }

    #[test]
    fn view_accepts_serializable_structs() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
            admin: bool,
        }

        let mut c = ctx(Request::new(Method::Get, "/"));
        c.view(&User { name: "ann", admin: false }).unwrap();
        assert_eq!(finish(c).text(), "{\"admin\":false,\"name\":\"ann\"}\n");
    }

    #[test]
    fn unknown_named_view_falls_back() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.view_with(&[1, 2], "missing").unwrap();
        assert_eq!(finish(c).text(), "[1,2]\n");
    }

    #[test]
    fn handler_status_survives_rendering() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.write_status(StatusCode::Created);
        c.view(&"done").unwrap();
        assert_eq!(finish(c).status(), StatusCode::Created);
    }

    #[test]
    fn raw_writes_commit_ok() {
        let mut c = ctx(Request::new(Method::Get, "/"));
        c.response_mut().write_all(b"raw").unwrap();
        let resp = finish(c);
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.text(), "raw");
    }
}
