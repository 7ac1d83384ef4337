//! # vista
//!
//! An async HTTP/1.1 framework whose routes and views come from a file tree.
//!
//! Files under `public/` are served as static routes, HTML templates under
//! `pages/` become page routes rendered through their layouts, and files under
//! `text/` become named text viewers. Handlers registered in code pick a viewer
//! by content negotiation. With watching on, edits to the tree are picked up
//! while the server runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vista::app::App;
//! use vista::fs::DirFs;
//! use vista::router::{RouteOptions, handler};
//! use vista::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::builder().fs(DirFs::new("site")).watch(true).build();
//!     app.get(
//!         "/users",
//!         handler(|ctx| Box::pin(async move {
//!             ctx.view(&serde_json::json!([{"name": "ann"}]))
//!         })),
//!         RouteOptions::new(),
//!     )?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod context;
pub mod engine;
pub mod error;
pub mod fs;
pub mod http;
pub mod interceptor;
pub mod middleware;
pub mod pool;
pub mod router;
pub mod server;
pub mod template;
pub mod view;
pub mod watcher;
pub mod writer;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{App, AppBuilder};
pub use context::Context;
pub use error::{Error, Result};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
