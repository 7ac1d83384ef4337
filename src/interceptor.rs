//! Hooks that let extensions override referer lookup and redirects.

use crate::context::Context;
use crate::http::StatusCode;

/// `HX-Request`: always `true` on requests issued by htmx.
pub const HX_REQUEST: &str = "HX-Request";
/// `HX-Current-Url`: the browser's current URL.
pub const HX_CURRENT_URL: &str = "HX-Current-Url";
/// `HX-Redirect`: asks htmx to navigate client-side.
pub const HX_REDIRECT: &str = "HX-Redirect";

/// Overrides for [`Context::request_referer`] and [`Context::redirect`].
pub trait Interceptor: Send + Sync {
    /// The referer to report, or `None` to use the `Referer` header.
    fn request_referer(&self, ctx: &Context) -> Option<String>;

    /// Handles a redirect. Returns `true` when the response has been written
    /// and the default `Location` redirect must be skipped.
    fn redirect(&self, ctx: &mut Context, url: &str, status: StatusCode) -> bool;
}

/// Interceptor for htmx clients.
///
/// htmx follows `3xx` responses inside the XHR and swaps the target page in,
/// so redirects are answered with `HX-Redirect` and `200 OK` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmxInterceptor;

impl HtmxInterceptor {
    pub fn is_hx_request(ctx: &Context) -> bool {
        ctx.request().header(HX_REQUEST) == "true"
    }
}

impl Interceptor for HtmxInterceptor {
    fn request_referer(&self, ctx: &Context) -> Option<String> {
        if !Self::is_hx_request(ctx) {
            return None;
        }
        let current = ctx.request().header(HX_CURRENT_URL);
        (!current.is_empty()).then(|| current.to_owned())
    }

    fn redirect(&self, ctx: &mut Context, url: &str, _status: StatusCode) -> bool {
        if !Self::is_hx_request(ctx) {
            return false;
        }
        ctx.write_header(HX_REDIRECT, url);
        ctx.write_status(StatusCode::Ok);
        true
    }
}
