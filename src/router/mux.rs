//! Pattern-matching request multiplexer.

use std::cmp::Ordering;

use crate::context::Parameters;
use crate::error::Result;
use crate::http::Method;

use super::pattern::split_pattern;

// One `/`-separated piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard(String),
}

// How the pattern treats whatever follows its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tail {
    // `/a/b`: nothing may follow.
    Exact,
    // `/a/{$}`: exactly one trailing slash.
    Slash,
    // `/a/`: any subtree, including the directory itself.
    Subtree,
    // `/a/{rest...}`: like `Subtree`, capturing the remainder.
    Rest(String),
}

#[derive(Debug, Clone)]
struct Compiled {
    method: Option<Method>,
    host: String,
    segments: Vec<Segment>,
    tail: Tail,
}

impl Compiled {
    fn parse(pattern: &str) -> Result<Self> {
        let parts = split_pattern(pattern)?;
        let invalid = |reason| crate::Error::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        let method = (!parts.method.is_empty()).then(|| Method::from_token(&parts.method));
        let mut pieces: Vec<&str> = parts.path.split('/').collect();
        let last = pieces.pop().unwrap_or_default();

        let mut segments = Vec::with_capacity(pieces.len() + 1);
        for piece in &pieces {
            segments.push(segment(piece).ok_or_else(|| invalid("`{$}` and `{name...}` must end the pattern"))?);
        }

        let tail = if last.is_empty() {
            // "" (root) or a trailing slash.
            Tail::Subtree
        } else if last == "{$}" {
            Tail::Slash
        } else if let Some(name) = last.strip_prefix('{').and_then(|s| s.strip_suffix("...}")) {
            if name.is_empty() {
                return Err(invalid("wildcard name must not be empty"));
            }
            Tail::Rest(name.to_owned())
        } else {
            segments.push(segment(last).ok_or_else(|| invalid("bad wildcard"))?);
            Tail::Exact
        };

        Ok(Self {
            method,
            host: parts.host,
            segments,
            tail,
        })
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    // Higher is more specific.
    fn rank(&self) -> (bool, usize, usize, bool, bool) {
        (
            !self.host.is_empty(),
            self.literal_count(),
            self.segments.len(),
            matches!(self.tail, Tail::Exact | Tail::Slash),
            self.method.is_some(),
        )
    }

    fn matches_method(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(m) if m == method => true,
            Some(Method::Get) => *method == Method::Head,
            Some(_) => false,
        }
    }

    fn matches_path(&self, host: &str, path: &str) -> Option<Parameters> {
        if !self.host.is_empty() && !self.host.eq_ignore_ascii_case(host) {
            return None;
        }
        let request: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        let n = self.segments.len();

        match self.tail {
            Tail::Exact if request.len() != n => return None,
            Tail::Slash if request.len() != n + 1 || request[n] != "" => return None,
            Tail::Subtree | Tail::Rest(_) if request.len() < n + 1 => return None,
            _ => {}
        }

        let mut params = Parameters::new();
        for (segment, part) in self.segments.iter().zip(&request) {
            match segment {
                Segment::Literal(lit) if lit.as_str() == *part => {}
                Segment::Wildcard(name) if !part.is_empty() => {
                    params.insert(name.clone(), (*part).to_owned());
                }
                _ => return None,
            }
        }
        if let Tail::Rest(name) = &self.tail {
            params.insert(name.clone(), request[n..].join("/"));
        }
        Some(params)
    }
}

fn segment(piece: &str) -> Option<Segment> {
    match piece.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(name) if name == "$" || name.ends_with("...") || name.is_empty() => None,
        Some(name) => Some(Segment::Wildcard(name.to_owned())),
        None => Some(Segment::Literal(piece.to_owned())),
    }
}

struct Entry<T> {
    pattern: String,
    compiled: Compiled,
    value: T,
}

/// Outcome of [`ServeMux::resolve`].
#[derive(Debug)]
pub enum Resolution<T> {
    Found {
        pattern: String,
        value: T,
        params: Parameters,
    },
    /// The path only matches with a trailing slash; redirect there.
    Redirect(String),
    /// The path matches under other methods, listed for `Allow`.
    MethodNotAllowed(Vec<String>),
    NotFound,
}

/// Routes `[METHOD ][HOST]/PATH` patterns to values.
///
/// Path syntax: `{name}` matches one non-empty segment, `{name...}` matches
/// the rest of the path, a trailing `{$}` matches only the slash-terminated
/// path, and a plain trailing `/` matches the whole subtree.
///
/// When several patterns match, the most specific wins: a host pattern beats
/// a host-less one, then more literal segments, then more segments, then an
/// exact match over a subtree, then a pattern with a method.
///
/// ```
/// use vista::http::Method;
/// use vista::router::{Resolution, ServeMux};
///
/// let mut mux = ServeMux::new();
/// mux.insert("GET /users/{id}", "user").unwrap();
/// mux.insert("/", "fallback").unwrap();
///
/// match mux.resolve(&Method::Get, "", "/users/7") {
///     Resolution::Found { value, params, .. } => {
///         assert_eq!(value, "user");
///         assert_eq!(params.get("id"), Some("7"));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub struct ServeMux<T> {
    entries: Vec<Entry<T>>,
    redirect_slash: bool,
}

impl<T> Default for ServeMux<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            redirect_slash: true,
        }
    }
}

impl<T> std::fmt::Debug for ServeMux<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeMux")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .field("redirect_slash", &self.redirect_slash)
            .finish()
    }
}

impl<T> ServeMux<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `/dir` is redirected to `/dir/` when only the latter matches.
    /// Enabled by default.
    #[must_use]
    pub fn redirect_trailing_slash(mut self, enabled: bool) -> Self {
        self.redirect_slash = enabled;
        self
    }

    /// Registers `value` under `pattern`, replacing any value already
    /// registered under the identical pattern string.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPattern`](crate::Error::InvalidPattern) for malformed
    /// patterns.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<()> {
        let compiled = Compiled::parse(pattern)?;
        match self.entries.iter_mut().find(|e| e.pattern == pattern) {
            Some(entry) => entry.value = value,
            None => self.entries.push(Entry {
                pattern: pattern.to_owned(),
                compiled,
                value,
            }),
        }
        Ok(())
    }

    pub fn get(&self, pattern: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| e.pattern == pattern)
            .map(|e| &e.value)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Registered values in registration order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|e| &mut e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> ServeMux<T> {
    /// Finds the value for a request.
    pub fn resolve(&self, method: &Method, host: &str, path: &str) -> Resolution<T> {
        if let Some((entry, params)) = self.best(host, path, |c| c.matches_method(method)) {
            return Resolution::Found {
                pattern: entry.pattern.clone(),
                value: entry.value.clone(),
                params,
            };
        }

        let mut allow: Vec<String> = Vec::new();
        for entry in &self.entries {
            if let Some(m) = &entry.compiled.method {
                if entry.compiled.matches_path(host, path).is_some() {
                    allow.push(m.as_str().to_owned());
                    if *m == Method::Get {
                        allow.push("HEAD".to_owned());
                    }
                }
            }
        }
        if !allow.is_empty() {
            allow.sort();
            allow.dedup();
            return Resolution::MethodNotAllowed(allow);
        }

        if self.redirect_slash && !path.ends_with('/') {
            let slashed = format!("{path}/");
            if self
                .best(host, &slashed, |c| c.matches_method(method))
                .is_some()
            {
                return Resolution::Redirect(slashed);
            }
        }
        Resolution::NotFound
    }

    fn best<F>(&self, host: &str, path: &str, accept: F) -> Option<(&Entry<T>, Parameters)>
    where
        F: Fn(&Compiled) -> bool,
    {
        let mut best: Option<(&Entry<T>, Parameters)> = None;
        for entry in &self.entries {
            if !accept(&entry.compiled) {
                continue;
            }
            let Some(params) = entry.compiled.matches_path(host, path) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((current, _)) => {
                    entry.compiled.rank().cmp(&current.compiled.rank()) == Ordering::Greater
                }
            };
            if better {
                best = Some((entry, params));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mux(patterns: &[&'static str]) -> ServeMux<&'static str> {
        let mut mux = ServeMux::new();
        for p in patterns {
            mux.insert(p, *p).unwrap();
        }
        mux
    }

    fn found(mux: &ServeMux<&'static str>, method: Method, host: &str, path: &str) -> Option<&'static str> {
        match mux.resolve(&method, host, path) {
            Resolution::Found { value, .. } => Some(value),
            _ => None,
        }
    }

    // ── Matching ──────────────────────────────────────────────────────────────

    #[test]
    fn exact_and_subtree() {
        let m = mux(&["GET /{$}", "GET /docs/", "GET /docs/intro"]);
        assert_eq!(found(&m, Method::Get, "", "/"), Some("GET /{$}"));
        assert_eq!(found(&m, Method::Get, "", "/other"), None);
        assert_eq!(found(&m, Method::Get, "", "/docs/"), Some("GET /docs/"));
        assert_eq!(found(&m, Method::Get, "", "/docs/a/b"), Some("GET /docs/"));
        assert_eq!(found(&m, Method::Get, "", "/docs/intro"), Some("GET /docs/intro"));
    }

    #[test]
    fn root_matches_everything() {
        let m = mux(&["/"]);
        assert_eq!(found(&m, Method::Post, "", "/any/thing"), Some("/"));
    }

    #[test]
    fn wildcards_capture() {
        let mut m = ServeMux::new();
        m.insert("GET /files/{path...}", 1).unwrap();
        m.insert("GET /users/{id}/posts/{post}", 2).unwrap();

        match m.resolve(&Method::Get, "", "/files/a/b.txt") {
            Resolution::Found { params, .. } => assert_eq!(params.get("path"), Some("a/b.txt")),
            other => panic!("{other:?}"),
        }
        match m.resolve(&Method::Get, "", "/users/7/posts/9") {
            Resolution::Found { value, params, .. } => {
                assert_eq!(value, 2);
                assert_eq!(params.get("id"), Some("7"));
                assert_eq!(params.get("post"), Some("9"));
            }
            other => panic!("{other:?}"),
        }
        assert!(matches!(m.resolve(&Method::Get, "", "/users//posts/9"), Resolution::NotFound));
    }

    #[test]
    fn hosts_beat_hostless() {
        let m = mux(&["GET /admin/{$}", "GET abc.com/admin/{$}"]);
        assert_eq!(found(&m, Method::Get, "abc.com", "/admin/"), Some("GET abc.com/admin/{$}"));
        assert_eq!(found(&m, Method::Get, "other.com", "/admin/"), Some("GET /admin/{$}"));
    }

    #[test]
    fn literals_beat_wildcards() {
        let m = mux(&["GET /users/{id}", "GET /users/me"]);
        assert_eq!(found(&m, Method::Get, "", "/users/me"), Some("GET /users/me"));
        assert_eq!(found(&m, Method::Get, "", "/users/1"), Some("GET /users/{id}"));
    }

    #[test]
    fn get_serves_head() {
        let m = mux(&["GET /x"]);
        assert_eq!(found(&m, Method::Head, "", "/x"), Some("GET /x"));
    }

    #[test]
    fn replaces_identical_pattern() {
        let mut m = ServeMux::new();
        m.insert("GET /x", 1).unwrap();
        m.insert("GET /x", 2).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("GET /x"), Some(&2));
    }

    // ── Fallbacks ─────────────────────────────────────────────────────────────

    #[test]
    fn method_not_allowed_lists_methods() {
        let m = mux(&["GET /x", "POST /x"]);
        match m.resolve(&Method::Delete, "", "/x") {
            Resolution::MethodNotAllowed(allow) => assert_eq!(allow, vec!["GET", "HEAD", "POST"]),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn redirects_to_slash_form() {
        let m = mux(&["GET /admin/{$}"]);
        assert!(matches!(
            m.resolve(&Method::Get, "", "/admin"),
            Resolution::Redirect(p) if p == "/admin/"
        ));
        let m = mux(&["GET /admin/{$}"]).redirect_trailing_slash(false);
        assert!(matches!(m.resolve(&Method::Get, "", "/admin"), Resolution::NotFound));
    }

    #[test]
    fn invalid_patterns() {
        let mut m: ServeMux<()> = ServeMux::new();
        assert!(m.insert("GET /a/{$}/b", ()).is_err());
        assert!(m.insert("GET /{rest...}/b", ()).is_err());
        assert!(m.insert("GET/x", ()).is_err());
    }
}
