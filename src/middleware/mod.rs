//! Middleware pipeline: composable before/after handler logic.
//!
//! Each middleware receives the [`Context`] and a [`Next`] cursor into the rest
//! of the chain. The first registered middleware is the outermost wrapper and
//! the handler sits innermost. A middleware may:
//!
//! - **Pass through**: `next.run(ctx).await`.
//! - **Short-circuit**: write the response itself and return without calling
//!   `next` (return [`Error::Cancelled`](crate::Error::Cancelled) to also skip
//!   error mapping).
//! - **Decorate**: set headers before or inspect the writer after `next`.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain.
//! - [`from_fn`]: turns a closure into a middleware.
//! - [`AccessLog`]: built-in request logger.

use std::sync::Arc;

use tokio::time::Instant;

use crate::context::Context;
use crate::error::Result;
use crate::router::{BoxFuture, Handler};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward the
/// request at most once.
///
/// # Examples
///
/// ```
/// use vista::context::Context;
/// use vista::middleware::{Middleware, Next};
/// use vista::router::BoxFuture;
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, vista::Result<()>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a Handler,
}

impl<'a> Next<'a> {
    /// Invokes the next middleware, or the handler once the stack is exhausted.
    pub fn run(self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        match self.middlewares.split_first() {
            Some((first, rest)) => first.handle(
                ctx,
                Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}

/// The core trait for all middleware.
///
/// Implementations are shared across tasks, so they must be `Send + Sync` and
/// return `Send` futures.
pub trait Middleware: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>>;
}

struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        (self.0)(ctx, next)
    }
}

/// Wraps a closure as a middleware.
///
/// ```
/// use vista::middleware::from_fn;
///
/// let mw = from_fn(|ctx, next| Box::pin(async move {
///     ctx.write_header("X-Frame-Options", "DENY");
///     next.run(ctx).await
/// }));
/// # let _ = mw;
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// A materialized middleware stack ending in a handler.
#[derive(Clone)]
pub struct Chain {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    endpoint: Handler,
}

impl Chain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>, endpoint: Handler) -> Self {
        Self {
            middlewares: middlewares.into(),
            endpoint,
        }
    }

    /// The same stack around a different handler.
    pub fn with_endpoint(&self, endpoint: Handler) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Handler {
        &self.endpoint
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn run<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Next {
            middlewares: &self.middlewares,
            endpoint: &self.endpoint,
        }
        .run(ctx)
    }
}

/// Logs each request's method, path, status, body size and duration.
///
/// Emits one `tracing::info!` record after the downstream chain completes:
///
/// ```text
/// GET /users 200 512B (1.2ms)
/// ```
///
/// The status is the one committed when the chain returns; error mapping
/// happens later, so a failed request logs `0` unless the handler wrote one.
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();

            let result = next.run(ctx).await;

            let status = ctx.response().status_code().map_or(0, |s| s.as_u16());
            let bytes = ctx.response().body_bytes_sent();
            let elapsed = start.elapsed();
            match &result {
                Ok(()) => tracing::info!(%method, %path, status, bytes, ?elapsed, "request"),
                Err(e) => {
                    tracing::info!(%method, %path, status, bytes, ?elapsed, "request failed");
                    tracing::debug!(error = %e, "handler error");
                }
            }
            result
        })
    }
}
