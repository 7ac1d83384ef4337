//! HTML and text templates on [`handlebars`].
//!
//! A [`TemplateSet`] is a handlebars registry with one entry template and
//! every template the entry may call as a partial (`{{> components/nav}}`).
//! Sets are immutable once built; reloading builds a new set and swaps it
//! in. Sets are composed by [grafting](TemplateSet::graft) the sources of
//! other sets, and a page is put inside its layout with
//! [`wrap_in`](TemplateSet::wrap_in).
//!
//! In [`Mode::Html`] `{{value}}` is HTML-escaped and `{{{value}}}` is not;
//! [`Mode::Text`] never escapes.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use vista::template::{FuncMap, Mode, TemplateSet};
//!
//! let funcs = Arc::new(FuncMap::builtins());
//! let set = TemplateSet::new("hello", "<p>{{upper Name}}</p>", funcs, Mode::Html).unwrap();
//! assert_eq!(set.render(&json!({"Name": "<ann>"})).unwrap(), "<p>&lt;ANN&gt;</p>");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, RenderErrorReason,
    ScopedJson, TemplateError,
};
use serde_json::Value;
use thiserror::Error;

/// Template failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(Box<TemplateError>),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Self::Parse(Box::new(err))
    }
}

/// Output escaping applied to printed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Html,
    Text,
}

/// A template function, registered as a handlebars helper. Arguments arrive
/// already evaluated, in call order.
pub type Func = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Name → function registry. Built once per application (builtins plus user
/// entries), sealed in an `Arc`, and registered on every set it builds.
///
/// Handlebars already brings `if unless each with lookup eq ne lt lte gt gte
/// and or not len`; the map adds the rest.
#[derive(Clone, Default)]
pub struct FuncMap {
    funcs: BTreeMap<String, Func>,
}

impl fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncMap")
            .field("funcs", &self.funcs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FuncMap {
    /// An empty map without builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// `upper`, `lower` and `join`.
    pub fn builtins() -> Self {
        let mut map = Self::new();
        map.insert("upper", |args| match args {
            [Value::String(s)] => Ok(Value::String(s.to_uppercase())),
            _ => Err("upper expects one string".to_owned()),
        });
        map.insert("lower", |args| match args {
            [Value::String(s)] => Ok(Value::String(s.to_lowercase())),
            _ => Err("lower expects one string".to_owned()),
        });
        map.insert("join", |args| match args {
            [Value::Array(items), Value::String(sep)] => {
                let parts: Vec<String> = items.iter().map(display).collect();
                Ok(Value::String(parts.join(sep)))
            }
            _ => Err("join expects a list and a separator".to_owned()),
        });
        map
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
    }

    pub fn insert_shared(&mut self, name: impl Into<String>, f: Func) {
        self.funcs.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Func> {
        self.funcs.get(name)
    }

    fn register(&self, registry: &mut Handlebars<'static>) {
        for (name, func) in &self.funcs {
            registry.register_helper(name, Box::new(FuncHelper(func.clone())));
        }
    }
}

struct FuncHelper(Func);

impl HelperDef for FuncHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        (self.0)(&args)
            .map(ScopedJson::Derived)
            .map_err(|message| RenderErrorReason::Other(format!("{}: {message}", h.name())).into())
    }
}

/// Renders a value the way a template prints it: strings verbatim, `null`
/// as nothing, everything else as JSON.
pub fn display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A set of named templates that can call each other, with one entry point.
pub struct TemplateSet {
    entry: String,
    mode: Mode,
    funcs: Arc<FuncMap>,
    sources: BTreeMap<String, Arc<str>>,
    registry: Handlebars<'static>,
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSet")
            .field("entry", &self.entry)
            .field("templates", &self.sources.keys().collect::<Vec<_>>())
            .field("mode", &self.mode)
            .finish()
    }
}

impl TemplateSet {
    /// A set holding `source` under `name`, which is also the entry point.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] when `source` is not a valid template.
    pub fn new(name: &str, source: &str, funcs: Arc<FuncMap>, mode: Mode) -> Result<Self, Error> {
        let mut registry = Handlebars::new();
        if mode == Mode::Text {
            registry.register_escape_fn(handlebars::no_escape);
        }
        funcs.register(&mut registry);

        let mut set = Self {
            entry: name.to_owned(),
            mode,
            funcs,
            sources: BTreeMap::new(),
            registry,
        };
        set.add(name, Arc::from(source))?;
        Ok(set)
    }

    fn add(&mut self, name: &str, source: Arc<str>) -> Result<(), Error> {
        self.registry.register_template_string(name, &*source)?;
        self.sources.insert(name.to_owned(), source);
        Ok(())
    }

    /// Copies every template of `other` this set does not hold yet.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if a copied source fails to register; the templates
    /// copied before it stay.
    pub fn graft(&mut self, other: &TemplateSet) -> Result<(), Error> {
        for (name, source) in &other.sources {
            if !self.sources.contains_key(name) {
                self.add(name, source.clone())?;
            }
        }
        Ok(())
    }

    /// Renders the entry inside `layout`, which must be grafted already.
    ///
    /// The entry's inline partials (`{{#*inline "content"}}`) fill the
    /// layout's partial blocks (`{{#> content}}default{{/content}}`), and the
    /// rest of the entry is available to the layout as `{{> @partial-block}}`.
    /// The wrapped source replaces the entry's, so a set grafting this one
    /// gets the entry already inside its layout.
    pub fn wrap_in(&mut self, layout: &str) -> Result<(), Error> {
        let Some(source) = self.sources.get(&self.entry) else {
            return Ok(());
        };
        let wrapped: Arc<str> = Arc::from(["{{#> ", layout, "}}", &**source, "{{/", layout, "}}"].concat());
        let entry = self.entry.clone();
        self.add(&entry, wrapped)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn funcs(&self) -> &Arc<FuncMap> {
        &self.funcs
    }

    /// Names of every template in the set, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Renders the entry template into `out`.
    ///
    /// # Errors
    ///
    /// [`Error::Render`] when a helper fails or a partial is missing. `out`
    /// may then hold partial output.
    pub fn render_to(&self, data: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
        self.registry.render_to_write(&self.entry, data, out)?;
        Ok(())
    }

    pub fn render(&self, data: &Value) -> Result<String, Error> {
        Ok(self.registry.render(&self.entry, data)?)
    }
}

/// Names `source` calls as partials with `{{> name}}` or `{{#> name}}`.
///
/// `@partial-block`, dynamic partials (`{{> (lookup ...)}}`) and tags inside
/// `{{!-- --}}` comments are skipped.
pub fn partials(source: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        rest = &rest[start + 2..];
        if let Some(comment) = rest.strip_prefix("!--") {
            rest = comment.find("--}}").map_or("", |end| &comment[end + 4..]);
            continue;
        }
        let end = rest.find("}}").unwrap_or(rest.len());
        let tag = rest[..end].trim_start_matches(['{', '~']).trim_start();
        rest = &rest[end..];

        let Some(call) = tag.strip_prefix("#>").or_else(|| tag.strip_prefix('>')) else {
            continue;
        };
        let Some(name) = call.split_whitespace().next() else {
            continue;
        };
        let name = name.trim_end_matches('~').trim_matches(['"', '\'']);
        if name.is_empty() || name.starts_with(['@', '(']) {
            continue;
        }
        names.insert(name.to_owned());
    }
    names
}
