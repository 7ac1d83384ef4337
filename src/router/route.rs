//! Registered routes and their options.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::Handler;
use crate::middleware::{Chain, Middleware};
use crate::view::{MimeType, Viewer};

/// Per-route settings: opaque metadata for middleware plus extra viewers.
///
/// ```
/// use vista::router::RouteOptions;
///
/// let opts = RouteOptions::new()
///     .navigation("Users", "people", "admin")
///     .metadata("order", 3);
/// assert_eq!(opts.get_str("access"), Some("admin"));
/// assert_eq!(opts.get_i64("order"), Some(3));
/// ```
#[derive(Clone, Default)]
pub struct RouteOptions {
    metadata: HashMap<String, Value>,
    viewers: Vec<Arc<dyn Viewer>>,
    no_default_viewer: bool,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a metadata entry. `Value::Null` removes it.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.metadata.remove(&key);
            }
            value => {
                self.metadata.insert(key, value);
            }
        }
        self
    }

    /// Sets the `name`, `icon` and `access` keys used to build navigation menus.
    #[must_use]
    pub fn navigation(self, name: &str, icon: &str, access: &str) -> Self {
        self.metadata("name", name)
            .metadata("icon", icon)
            .metadata("access", access)
    }

    /// Attaches an extra viewer to the route.
    #[must_use]
    pub fn viewer(mut self, viewer: Arc<dyn Viewer>) -> Self {
        self.viewers.push(viewer);
        self
    }

    /// Removes the application's default viewer from this route, so failed
    /// negotiation answers 404.
    #[must_use]
    pub fn no_default_viewer(mut self) -> Self {
        self.no_default_viewer = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)?.as_str()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key)?.as_i64()
    }

    pub(crate) fn viewers(&self) -> &[Arc<dyn Viewer>] {
        &self.viewers
    }

    pub(crate) fn wants_default_viewer(&self) -> bool {
        !self.no_default_viewer
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("metadata", &self.metadata)
            .field("viewers", &self.viewers.len())
            .field("no_default_viewer", &self.no_default_viewer)
            .finish()
    }
}

/// A registered route.
///
/// Routes are immutable once published in the mux; re-registration and
/// middleware changes publish a modified copy.
#[derive(Clone)]
pub struct Route {
    pattern: String,
    method: String,
    host: String,
    path: String,
    options: RouteOptions,
    viewers: Vec<Arc<dyn Viewer>>,
    default_viewer: Option<Arc<dyn Viewer>>,
    group: Vec<Arc<dyn Middleware>>,
    chain: Chain,
}

impl Route {
    pub(crate) fn new(
        pattern: &str,
        parts: super::PatternParts,
        handler: Handler,
        options: RouteOptions,
        default_viewer: Option<Arc<dyn Viewer>>,
        group: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        let mut route = Self {
            pattern: pattern.to_owned(),
            method: parts.method,
            host: parts.host,
            path: parts.path,
            options: RouteOptions::default(),
            viewers: Vec::new(),
            default_viewer: None,
            group,
            chain: Chain::new(Vec::new(), handler),
        };
        route.apply_options(options, default_viewer);
        route
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The method token, or `""` for any method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The virtual host, or `""`.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The path without its leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Viewers in negotiation order, at most one per MIME type.
    pub fn viewers(&self) -> &[Arc<dyn Viewer>] {
        &self.viewers
    }

    /// The fallback used when nothing in `Accept` matches.
    pub fn default_viewer(&self) -> Option<&Arc<dyn Viewer>> {
        self.default_viewer.as_ref()
    }

    /// The first viewer producing a type in `accepted`, honoring `Accept`
    /// order.
    pub fn negotiate(&self, accepted: &[MimeType]) -> Option<&Arc<dyn Viewer>> {
        accepted.iter().find_map(|want| {
            self.viewers
                .iter()
                .find(|viewer| viewer.mime_type().matches(want))
        })
    }

    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Adds a viewer, replacing any viewer registered for the same MIME type.
    pub(crate) fn add_viewer(&mut self, viewer: Arc<dyn Viewer>) {
        let mime = viewer.mime_type();
        match self.viewers.iter_mut().find(|v| v.mime_type() == mime) {
            Some(slot) => *slot = viewer,
            None => self.viewers.push(viewer),
        }
    }

    /// Re-registration: the handler, options and group middlewares are
    /// replaced, viewers are kept and extended.
    pub(crate) fn reregister(
        &mut self,
        handler: Handler,
        options: RouteOptions,
        default_viewer: Option<Arc<dyn Viewer>>,
        group: Vec<Arc<dyn Middleware>>,
    ) {
        self.chain = self.chain.with_endpoint(handler);
        self.group = group;
        self.apply_options(options, default_viewer);
    }

    /// Rebuilds the chain from the application's middlewares followed by the
    /// route's group middlewares.
    pub(crate) fn rebuild_chain(&mut self, app: &[Arc<dyn Middleware>]) {
        let stack = app.iter().chain(&self.group).cloned().collect();
        self.chain = Chain::new(stack, self.chain.endpoint().clone());
    }

    fn apply_options(&mut self, options: RouteOptions, default_viewer: Option<Arc<dyn Viewer>>) {
        self.default_viewer = if options.wants_default_viewer() {
            default_viewer
        } else {
            None
        };
        if let Some(viewer) = &self.default_viewer {
            self.add_viewer(viewer.clone());
        }
        for viewer in options.viewers() {
            self.add_viewer(viewer.clone());
        }
        self.options = options;
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mimes: Vec<String> = self.viewers.iter().map(|v| v.mime_type().to_string()).collect();
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("options", &self.options)
            .field("viewers", &mimes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{handler, split_pattern};
    use crate::view::{JsonViewer, StringViewer};

    fn noop() -> Handler {
        handler(|_| Box::pin(async { Ok(()) }))
    }

    fn route(pattern: &str, options: RouteOptions, default: Option<Arc<dyn Viewer>>) -> Route {
        Route::new(pattern, split_pattern(pattern).unwrap(), noop(), options, default, Vec::new())
    }

    // ── RouteOptions ──────────────────────────────────────────────────────────

    #[test]
    fn null_metadata_deletes() {
        let opts = RouteOptions::new()
            .metadata("access", "admin")
            .metadata("access", Value::Null);
        assert!(opts.get("access").is_none());
    }

    #[test]
    fn navigation_keys() {
        let opts = RouteOptions::new().navigation("Home", "house", "public");
        assert_eq!(opts.get_str("name"), Some("Home"));
        assert_eq!(opts.get_str("icon"), Some("house"));
        assert_eq!(opts.get_str("access"), Some("public"));
        assert_eq!(opts.get_i64("name"), None);
    }

    // ── Route ─────────────────────────────────────────────────────────────────

    #[test]
    fn parts_are_kept() {
        let r = route("GET abc.com/admin/", RouteOptions::new(), None);
        assert_eq!(r.method(), "GET");
        assert_eq!(r.host(), "abc.com");
        assert_eq!(r.path(), "admin/");
    }

    #[test]
    fn default_viewer_joins_the_viewers() {
        let r = route("GET /a", RouteOptions::new(), Some(Arc::new(JsonViewer)));
        assert_eq!(r.viewers().len(), 1);
        assert!(r.default_viewer().is_some());

        let r = route(
            "GET /a",
            RouteOptions::new().no_default_viewer(),
            Some(Arc::new(JsonViewer)),
        );
        assert!(r.viewers().is_empty());
        assert!(r.default_viewer().is_none());
    }

    #[test]
    fn viewers_are_unique_per_mime() {
        let mut r = route("GET /a", RouteOptions::new(), None);
        r.add_viewer(Arc::new(JsonViewer));
        r.add_viewer(Arc::new(JsonViewer));
        r.add_viewer(Arc::new(StringViewer));
        assert_eq!(r.viewers().len(), 2);
    }

    #[test]
    fn negotiation_follows_accept_order() {
        let mut r = route("GET /a", RouteOptions::new(), None);
        r.add_viewer(Arc::new(StringViewer));
        r.add_viewer(Arc::new(JsonViewer));

        let pick = |accept: &str| {
            r.negotiate(&crate::view::parse_accept(accept))
                .map(|v| v.mime_type().to_string())
        };
        assert_eq!(pick("application/json, text/plain").as_deref(), Some("application/json"));
        assert_eq!(pick("text/*").as_deref(), Some("text/plain"));
        assert_eq!(pick("*/*").as_deref(), Some("text/plain"));
        assert_eq!(pick("image/png"), None);
    }

    #[test]
    fn reregistration_keeps_viewers() {
        let mut r = route("GET /a", RouteOptions::new().no_default_viewer(), None);
        r.add_viewer(Arc::new(StringViewer));
        r.reregister(noop(), RouteOptions::new(), Some(Arc::new(JsonViewer)), Vec::new());
        assert_eq!(r.viewers().len(), 2);
        assert!(r.default_viewer().is_some());
    }
}
