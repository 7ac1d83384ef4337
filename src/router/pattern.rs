//! Splitting route patterns and file names into their parts.

use crate::error::{Error, Result};

/// Methods recognised when checking for a method glued to its path.
const METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "CONNECT", "TRACE",
];

/// The parts of a `[METHOD ][HOST]/PATH` pattern.
///
/// `path` has no leading slash; all parts are empty for `""` and `"/"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternParts {
    pub method: String,
    pub host: String,
    pub path: String,
}

/// Splits a route pattern into method, host and path.
///
/// | pattern | method | host | path |
/// |---|---|---|---|
/// | `""`, `"/"` | | | |
/// | `"/abc"` | | | `abc` |
/// | `"GET /abc/"` | `GET` | | `abc/` |
/// | `"GET abc.com/abc"` | `GET` | `abc.com` | `abc` |
///
/// ```
/// use vista::router::split_pattern;
///
/// let parts = split_pattern("GET abc.com/admin/").unwrap();
/// assert_eq!((parts.method.as_str(), parts.host.as_str(), parts.path.as_str()), ("GET", "abc.com", "admin/"));
/// assert!(split_pattern("GET/abc").is_err());
/// ```
///
/// # Errors
///
/// [`Error::InvalidPattern`] when the method is not an upper-case token, when
/// a method is glued to the path without whitespace, or when no `/` follows the
/// host.
pub fn split_pattern(pattern: &str) -> Result<PatternParts> {
    let invalid = |reason| Error::InvalidPattern {
        pattern: pattern.to_owned(),
        reason,
    };

    if pattern.is_empty() {
        return Ok(PatternParts::default());
    }

    let (method, rest) = match pattern.find([' ', '\t']) {
        Some(i) => {
            let method = &pattern[..i];
            if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(invalid("method must be an upper-case token"));
            }
            (method, pattern[i..].trim_start_matches([' ', '\t']))
        }
        None => ("", pattern),
    };

    let Some(slash) = rest.find('/') else {
        return Err(invalid("missing `/` before the path"));
    };
    let host = &rest[..slash];
    if method.is_empty() && METHODS.contains(&host) {
        return Err(invalid("method must be separated from the path by whitespace"));
    }
    if host.contains(char::is_whitespace) {
        return Err(invalid("host must not contain whitespace"));
    }

    Ok(PatternParts {
        method: method.to_owned(),
        host: host.to_owned(),
        path: rest[slash + 1..].to_owned(),
    })
}

/// A `GET` route derived from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRoute {
    /// Virtual host from an `@host/` prefix, or empty.
    pub host: String,
    /// The URL path the file answers on.
    pub path: String,
    /// The full pattern to register, e.g. `GET /docs/{$}`.
    pub pattern: String,
}

/// Derives the route for a logical file name (relative to `public/` or
/// `pages/`, extension already stripped where the engine wants it).
///
/// `@host/` scopes the route to a virtual host, `index.html` collapses to its
/// directory, and a name ending in `/` becomes an exact match with `{$}` so it
/// does not absorb deeper paths.
///
/// | name | pattern |
/// |---|---|
/// | `""` | `GET /` |
/// | `x` | `GET /x` |
/// | `x/` | `GET /x/{$}` |
/// | `@h/x` | `GET h/x` |
/// | `@h/x/` | `GET h/x/{$}` |
/// | `a/index.html` | `GET /a/{$}` |
pub fn split_file(name: &str) -> FileRoute {
    let (host, rest) = match name.strip_prefix('@') {
        Some(scoped) => match scoped.find('/') {
            Some(i) => (&scoped[..i], &scoped[i + 1..]),
            None => (scoped, ""),
        },
        None => ("", name),
    };

    let rest = if rest == "index.html" {
        "/"
    } else {
        rest.strip_suffix("/index.html")
            .map(|dir| &rest[..dir.len() + 1])
            .unwrap_or(rest)
    };

    let path = format!("/{}", rest.trim_start_matches('/'));
    let pattern = if (path != "/" && path.ends_with('/')) || rest == "/" {
        format!("GET {host}{path}{{$}}")
    } else {
        format!("GET {host}{path}")
    };

    FileRoute {
        host: host.to_owned(),
        path,
        pattern,
    }
}

/// The viewer-registry name for a route: the path without its leading
/// slash or `{$}`, `index` for directory paths, prefixed with `@host/` for
/// virtual hosts.
///
/// `("", "/users")` is `users`, `("", "/")` is `index` and
/// `("abc.com", "admin/{$}")` is `@abc.com/admin/index`.
pub fn view_name(host: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    let path = path.strip_suffix("{$}").unwrap_or(path);
    let mut name = if path.is_empty() || path.ends_with('/') {
        format!("{path}index")
    } else {
        path.to_owned()
    };
    if !host.is_empty() {
        name = format!("@{host}/{name}");
    }
    name
}
