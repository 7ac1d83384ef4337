//! Request routing: patterns, the mux, and registered routes.
//!
//! Patterns follow the `[METHOD ][HOST]/PATH` grammar:
//!
//! | Pattern                   | Example match              | Captured params     |
//! |---------------------------|----------------------------|---------------------|
//! | `GET /users`              | `GET /users`               | *(none)*            |
//! | `GET /users/{id}`         | `GET /users/42`            | `id → "42"`         |
//! | `GET /files/{rest...}`    | `GET /files/a/b.txt`       | `rest → "a/b.txt"`  |
//! | `GET /docs/`              | `GET /docs/anything/below` | *(none)*            |
//! | `GET /docs/{$}`           | `GET /docs/` only          | *(none)*            |
//! | `GET abc.com/admin/`      | host `abc.com` only        | *(none)*            |
//!
//! Routes derived from files are produced by [`split_file`]; handler routes are
//! parsed with [`split_pattern`] and resolved by [`ServeMux`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

mod mux;
mod pattern;
mod route;

pub use mux::{Resolution, ServeMux};
pub use pattern::{FileRoute, PatternParts, split_file, split_pattern, view_name};
pub use route::{Route, RouteOptions};

/// A pinned, boxed, `Send` future borrowing from the request for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased async handler.
///
/// Handlers borrow the [`Context`] mutably for the duration of the returned
/// future and report failures through [`Result`]. Closures of the form
/// `|ctx| Box::pin(async move { ... })` coerce to this type through
/// [`handler`].
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Boxes a closure into a [`Handler`].
///
/// ```
/// use vista::router::handler;
///
/// let h = handler(|ctx| Box::pin(async move {
///     ctx.write_header("X-Seen", "1");
///     Ok(())
/// }));
/// # let _ = h;
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}
