//! Ordered, case-insensitive header fields.

use std::fmt;

#[derive(Debug, Clone)]
struct Field {
    name: String,
    value: String,
}

impl Field {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Header fields of a request or response.
///
/// Names compare case-insensitively, order is kept as written and a name may
/// repeat (RFC 9110 §5.3). Response writers use [`set`](Headers::set) for
/// single-valued fields such as `Content-Type` and [`insert`](Headers::insert)
/// for list-valued ones such as `Vary`.
///
/// ```
/// use vista::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Vary", "Accept");
/// headers.insert("vary", "Accept-Encoding");
/// headers.set("Content-Type", "text/html; charset=utf-8");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// assert_eq!(headers.get_all("VARY").collect::<Vec<_>>(), ["Accept", "Accept-Encoding"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Appends a field, keeping earlier values of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Leaves exactly one `name` field holding `value`.
    ///
    /// An existing field is overwritten where it stands, so a viewer
    /// overriding a header set by middleware does not reorder the output.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let Some(first) = self.fields.iter().position(|f| f.is(&name)) else {
            self.insert(name, value);
            return;
        };
        self.fields[first].value = value;
        let mut index = 0;
        self.fields.retain(|f| {
            let keep = index <= first || !f.is(&name);
            index += 1;
            keep
        });
    }

    /// The first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is(name))
            .map(|f| f.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |f| f.is(name))
            .map(|f| f.value.as_str())
    }

    /// Drops every `name` field. Returns `true` if there was one.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| !f.is(name));
        self.fields.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is(name))
    }

    /// Number of fields, counting repeated names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
    }
}

/// Wire form: one `Name: value\r\n` line per field.
impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write!(f, "{}: {}\r\n", field.name, field.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        for name in ["content-type", "CONTENT-TYPE", "Content-Type"] {
            assert_eq!(h.get(name), Some("text/plain"));
            assert!(h.contains(name));
        }
        assert!(!h.contains("x-missing"));
    }

    #[test]
    fn values_outlive_the_lookup_name() {
        let mut h = Headers::new();
        h.insert("Host", "abc.com");
        let value = {
            let name = String::from("host");
            h.get(&name)
        };
        assert_eq!(value, Some("abc.com"));
    }

    #[test]
    fn set_collapses_repeats_in_place() {
        let mut h = Headers::new();
        h.insert("Vary", "Accept");
        h.insert("X-Other", "1");
        h.insert("vary", "Accept-Encoding");
        h.set("VARY", "Origin");
        assert_eq!(h.get_all("vary").collect::<Vec<_>>(), ["Origin"]);
        assert_eq!(h.iter().next(), Some(("Vary", "Origin")));

        h.set("Content-Type", "text/html");
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn remove_reports_presence() {
        let mut h = Headers::new();
        h.insert("Set-Cookie", "a=1");
        h.insert("Set-Cookie", "b=2");
        assert!(h.remove("set-cookie"));
        assert!(h.is_empty());
        assert!(!h.remove("set-cookie"));
    }

    #[test]
    fn displays_as_wire_lines() {
        let mut h = Headers::new();
        h.insert("A", "1");
        h.insert("B", "2");
        assert_eq!(h.to_string(), "A: 1\r\nB: 2\r\n");
    }
}
