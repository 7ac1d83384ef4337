//! Crate-wide error type.
//!
//! Handlers and middleware return [`Result`]. The outermost request wrapper in
//! [`App::serve`](crate::app::App::serve) maps each variant to a response:
//!
//! | Variant | Response |
//! |---|---|
//! | [`Error::Cancelled`] | whatever the handler already wrote |
//! | [`Error::ViewNotFound`] | `404` with a short plain body |
//! | anything else | `500`, empty body, `X-Log-Id` header, logged server-side |

use thiserror::Error;

use crate::template;

/// Errors produced while routing, rendering, or loading views.
#[derive(Debug, Error)]
pub enum Error {
    /// The handler has fully written the response; skip rendering and error mapping.
    #[error("request cancelled")]
    Cancelled,

    /// Content negotiation found no viewer for the request.
    #[error("view not found")]
    ViewNotFound,

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// A template file failed to parse.
    #[error("template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: template::Error,
    },

    /// A template failed while executing.
    #[error("render: {0}")]
    Render(#[source] template::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(String),

    /// An application error raised by a handler.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary handler error so it can be returned through the chain.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Handler(err.into())
    }

    /// Returns `true` for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
