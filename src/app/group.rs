use std::sync::Arc;

use super::App;
use crate::error::Result;
use crate::middleware::Middleware;
use crate::router::{Handler, RouteOptions};

/// Routes registered under a shared path prefix.
///
/// Group middlewares run inside the application's middlewares and apply to
/// routes the group registers after they were added.
///
/// ```
/// use vista::app::App;
/// use vista::router::{RouteOptions, handler};
///
/// let app = App::builder().build();
/// let admin = app.group("/admin");
/// admin.get("/users", handler(|_| Box::pin(async { Ok(()) })), RouteOptions::new()).unwrap();
/// assert_eq!(app.routes(), vec!["GET /admin/users".to_owned()]);
/// ```
pub struct Group {
    app: App,
    prefix: String,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Group {
    pub(super) fn new(app: App, prefix: &str) -> Self {
        Self {
            app,
            prefix: prefix.trim_end_matches('/').to_owned(),
            middlewares: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

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

    /// Registers `[METHOD ]/PATH` as `[METHOD ]PREFIX/PATH`.
    pub fn handle_func(&self, pattern: &str, handler: Handler, options: RouteOptions) -> Result<()> {
        let pattern = match pattern.split_once(' ') {
            Some((method, path)) => format!("{method} {}{}", self.prefix, path.trim_start()),
            None => format!("{}{pattern}", self.prefix),
        };
        self.app
            .register(&pattern, handler, options, self.middlewares.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::http::{Method, Request, StatusCode};
    use crate::middleware::from_fn;
    use crate::router::handler;

    fn tag(name: &'static str) -> Arc<dyn Middleware> {
        from_fn(move |ctx, next| {
            Box::pin(async move {
                ctx.response_mut().write_all(format!("{name}>").as_bytes())?;
                next.run(ctx).await
            })
        })
    }

    fn ok() -> Handler {
        handler(|ctx| {
            Box::pin(async move {
                ctx.response_mut().write_all(b"handler")?;
                Ok(())
            })
        })
    }

    #[test]
    fn prefixes_patterns() {
        let app = App::builder().build();
        let group = app.group("/admin/");
        group.get("/users", ok(), RouteOptions::new()).unwrap();
        group.handle_func("POST /users", ok(), RouteOptions::new()).unwrap();
        group.handle_func("/any", ok(), RouteOptions::new()).unwrap();
        assert_eq!(
            app.routes(),
            vec!["GET /admin/users", "POST /admin/users", "/admin/any"]
        );
    }

    #[tokio::test]
    async fn group_middlewares_run_inside_app_middlewares() {
        let app = App::builder().build();
        app.use_middleware(tag("app"));
        let mut group = app.group("/admin");
        group.use_middleware(tag("group"));
        group.get("/x", ok(), RouteOptions::new()).unwrap();
        app.get("/y", ok(), RouteOptions::new()).unwrap();

        let resp = app.serve(Request::new(Method::Get, "/admin/x")).await;
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.text(), "app>group>handler");

        let resp = app.serve(Request::new(Method::Get, "/y")).await;
        assert_eq!(resp.text(), "app>handler");
    }
}
