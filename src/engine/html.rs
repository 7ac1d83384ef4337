//! HTML engine and its template store.
//!
//! Every `.html` file under `components/`, `layouts/`, `pages/` and `views/`
//! is a template named by its path without the extension
//! (`components/header`, `layouts/main`, `pages/users/index`). A template may
//! call any other stored template as a partial by that name; a page names
//! its layout in its first line and fills the layout's partial blocks with
//! inline partials:
//!
//! ```html
//! <!--layout:main-->
//! {{#*inline "content"}}<div>index</div>{{/inline}}
//! ```
//!
//! The store keeps forward (`dependencies`) and reverse (`dependents`) edges
//! by name. Compiled sets embed the sources of everything they depend on, so
//! a change to one template recompiles its dependents, dependencies first.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use super::{ViewEngine, files_under, is_html};
use crate::app::App;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::router::{split_file, view_name};
use crate::template::{self, FuncMap, Mode, TemplateSet};
use crate::view::HtmlViewer;
use crate::watcher::{Event, Op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Component,
    Layout,
    Page,
    View,
}

impl Kind {
    // Load order: pages and views need their components and layouts compiled.
    const ALL: [(Kind, &'static str); 4] = [
        (Kind::Component, "components"),
        (Kind::Layout, "layouts"),
        (Kind::Page, "pages"),
        (Kind::View, "views"),
    ];

    fn of(path: &str) -> Option<Self> {
        let (root, _) = path.split_once('/')?;
        Self::ALL
            .iter()
            .find(|(_, dir)| *dir == root)
            .map(|(kind, _)| *kind)
    }
}

struct TemplateEntry {
    path: String,
    // Source with the layout marker taken out.
    source: Arc<str>,
    layout: Option<String>,
    // Every stored name this template could graft: its layout and the
    // partials it calls.
    wants: BTreeSet<String>,
    dependencies: BTreeSet<String>,
    dependents: BTreeSet<String>,
    compiled: Arc<ArcSwap<TemplateSet>>,
}

// A file that registered cleanly on its own.
struct Parsed {
    name: String,
    source: Arc<str>,
    layout: Option<String>,
    set: TemplateSet,
}

/// Loads HTML templates, registers page routes and named views, and
/// recompiles dependents when a template changes.
///
/// Removing a file keeps its route and last compiled template; only its
/// edges in the dependency graph are dropped when a dependency next changes.
#[derive(Default)]
pub struct HtmlViewEngine {
    store: HashMap<String, TemplateEntry>,
}

impl HtmlViewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.store.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The stored templates `name` was compiled against.
    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.store.get(name).map(|entry| &entry.dependencies)
    }

    /// The stored templates compiled against `name`.
    pub fn dependents(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.store.get(name).map(|entry| &entry.dependents)
    }

    /// The currently published set for `name`.
    pub fn template(&self, name: &str) -> Option<Arc<TemplateSet>> {
        self.store.get(name).map(|entry| entry.compiled.load_full())
    }

    fn load_file(
        &mut self,
        fsys: &Arc<dyn FileSystem>,
        app: &App,
        funcs: &Arc<FuncMap>,
        path: &str,
    ) -> Result<()> {
        let Some(kind) = Kind::of(path) else {
            return Ok(());
        };
        let parsed = parse(fsys.as_ref(), funcs, path)?;
        let name = parsed.name.clone();
        let existed = self.store.contains_key(&name);
        let slot = self.insert(path, parsed, funcs);
        self.cascade(fsys.as_ref(), funcs, &name);

        if existed {
            info!(template = %name, "template reloaded");
            return Ok(());
        }

        // Templates loaded earlier may have been waiting for this one.
        let waiting: Vec<String> = self
            .store
            .iter()
            .filter(|(other, entry)| **other != name && entry.wants.contains(&name))
            .map(|(other, _)| other.clone())
            .collect();
        for other in waiting {
            self.compile(&other, funcs);
            self.cascade(fsys.as_ref(), funcs, &other);
        }

        match kind {
            Kind::Page => register_page(app, path, slot),
            Kind::View => {
                app.register_viewer(name, Arc::new(HtmlViewer::new(slot)));
                Ok(())
            }
            Kind::Component | Kind::Layout => Ok(()),
        }
    }

    // Stores a freshly parsed template and compiles it. The slot is kept
    // across reloads so published viewers see new versions.
    fn insert(&mut self, path: &str, parsed: Parsed, funcs: &Arc<FuncMap>) -> Arc<ArcSwap<TemplateSet>> {
        let Parsed {
            name,
            source,
            layout,
            set,
        } = parsed;
        let mut wants = template::partials(&source);
        wants.extend(layout.iter().cloned());
        wants.remove(&name);

        let slot = match self.store.get_mut(&name) {
            Some(entry) => {
                entry.path = path.to_owned();
                entry.source = source;
                entry.layout = layout;
                entry.wants = wants;
                entry.compiled.clone()
            }
            None => {
                let compiled = Arc::new(ArcSwap::from_pointee(set));
                self.store.insert(
                    name.clone(),
                    TemplateEntry {
                        path: path.to_owned(),
                        source,
                        layout,
                        wants,
                        dependencies: BTreeSet::new(),
                        dependents: BTreeSet::new(),
                        compiled: compiled.clone(),
                    },
                );
                compiled
            }
        };
        self.compile(&name, funcs);
        slot
    }

    // Rebuilds the set for `name` from its source and the current sets of
    // everything it wants, then publishes it and updates both edge sets.
    fn compile(&mut self, name: &str, funcs: &Arc<FuncMap>) {
        let Some(entry) = self.store.get(name) else {
            return;
        };
        let mut set = match TemplateSet::new(name, &entry.source, funcs.clone(), Mode::Html) {
            Ok(set) => set,
            Err(e) => {
                warn!(template = %name, error = %e, "template no longer compiles");
                return;
            }
        };
        let mut dependencies = BTreeSet::new();

        if let Some(layout) = &entry.layout {
            match self.store.get(layout) {
                Some(found) => {
                    let grafted = set
                        .graft(&found.compiled.load())
                        .and_then(|()| set.wrap_in(layout));
                    if let Err(e) = grafted {
                        warn!(template = %name, layout = %layout, error = %e, "layout not applied");
                    }
                    dependencies.insert(layout.clone());
                }
                None => warn!(template = %name, layout = %layout, "layout not found"),
            }
        }
        for want in &entry.wants {
            if entry.layout.as_ref() == Some(want) {
                continue;
            }
            if let Some(found) = self.store.get(want) {
                if let Err(e) = set.graft(&found.compiled.load()) {
                    warn!(template = %name, partial = %want, error = %e, "partial not grafted");
                }
                dependencies.insert(want.clone());
            }
        }

        let previous = match self.store.get_mut(name) {
            Some(entry) => {
                entry.compiled.store(Arc::new(set));
                std::mem::replace(&mut entry.dependencies, dependencies.clone())
            }
            None => return,
        };
        for gone in previous.difference(&dependencies) {
            if let Some(dep) = self.store.get_mut(gone) {
                dep.dependents.remove(name);
            }
        }
        for dep in &dependencies {
            if let Some(dep) = self.store.get_mut(dep) {
                dep.dependents.insert(name.to_owned());
            }
        }
    }

    // Recompiles everything that transitively depends on `root`.
    fn cascade(&mut self, fsys: &dyn FileSystem, funcs: &Arc<FuncMap>, root: &str) {
        let mut affected = BTreeSet::new();
        let mut stack = vec![root.to_owned()];
        while let Some(name) = stack.pop() {
            let Some(entry) = self.store.get(&name) else {
                continue;
            };
            for dependent in &entry.dependents {
                if dependent != root && affected.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }

        let vanished: Vec<String> = affected
            .iter()
            .filter(|name| {
                self.store.get(name.as_str()).is_some_and(|entry| {
                    matches!(fsys.metadata(&entry.path), Err(e) if e.kind() == io::ErrorKind::NotFound)
                })
            })
            .cloned()
            .collect();
        for name in &vanished {
            affected.remove(name);
            self.detach(name);
            debug!(template = %name, "dropped vanished dependent");
        }

        let mut order = Vec::with_capacity(affected.len());
        let mut seen = BTreeSet::new();
        for name in &affected {
            self.visit(name, &affected, &mut seen, &mut order);
        }
        for name in order {
            self.compile(&name, funcs);
            debug!(template = %name, cause = %root, "dependent recompiled");
        }
    }

    // Post-order walk over dependencies inside `affected`; a cycle is cut
    // where it is first re-entered.
    fn visit(
        &self,
        name: &str,
        affected: &BTreeSet<String>,
        seen: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) {
        if !seen.insert(name.to_owned()) {
            return;
        }
        if let Some(entry) = self.store.get(name) {
            for dep in entry.dependencies.iter().filter(|d| affected.contains(*d)) {
                self.visit(dep, affected, seen, order);
            }
        }
        order.push(name.to_owned());
    }

    // Removes every edge touching `name`. Its last compiled set stays
    // published.
    fn detach(&mut self, name: &str) {
        let Some(entry) = self.store.get_mut(name) else {
            return;
        };
        let dependencies = std::mem::take(&mut entry.dependencies);
        let dependents = std::mem::take(&mut entry.dependents);
        for dep in dependencies {
            if let Some(dep) = self.store.get_mut(&dep) {
                dep.dependents.remove(name);
            }
        }
        for dependent in dependents {
            if let Some(dependent) = self.store.get_mut(&dependent) {
                dependent.dependencies.remove(name);
            }
        }
    }
}

impl ViewEngine for HtmlViewEngine {
    fn load(&mut self, fsys: &Arc<dyn FileSystem>, app: &App) -> Result<()> {
        let funcs = app.funcs();
        for (_, root) in Kind::ALL {
            for path in files_under(fsys.as_ref(), root)? {
                if !is_html(&path) {
                    continue;
                }
                if let Err(e) = self.load_file(fsys, app, &funcs, &path) {
                    warn!(path = %path, error = %e, "skipping template");
                }
            }
        }
        info!(templates = self.store.len(), "html templates loaded");
        Ok(())
    }

    fn file_changed(&mut self, fsys: &Arc<dyn FileSystem>, app: &App, event: &Event) -> Result<()> {
        if Kind::of(&event.path).is_none() || !is_html(&event.path) {
            return Ok(());
        }
        match event.op {
            Op::Remove => {
                debug!(path = %event.path, "template removed, keeping last version");
                Ok(())
            }
            Op::Create | Op::Write => self.load_file(fsys, app, &app.funcs(), &event.path),
        }
    }
}

fn parse(fsys: &dyn FileSystem, funcs: &Arc<FuncMap>, path: &str) -> Result<Parsed> {
    let content = fsys.read(path)?;
    let (layout, source) = split_layout(&String::from_utf8_lossy(&content));
    let name = template_name(path).to_owned();
    let set = TemplateSet::new(&name, &source, funcs.clone(), Mode::Html).map_err(|source| {
        Error::Template {
            path: path.to_owned(),
            source,
        }
    })?;
    Ok(Parsed {
        name,
        source: Arc::from(source),
        layout,
        set,
    })
}

fn template_name(path: &str) -> &str {
    path.get(..path.len().saturating_sub(".html".len()))
        .unwrap_or(path)
}

/// Takes the `<!--layout:name-->` marker out of the first line and returns
/// the layout as a stored name along with the remaining source. A line left
/// blank by the removal is dropped.
fn split_layout(src: &str) -> (Option<String>, String) {
    let (first, rest) = match src.split_once('\n') {
        Some((first, rest)) => (first, Some(rest)),
        None => (src, None),
    };
    let mut from = 0;
    while let Some(open) = first[from..].find("<!--").map(|i| from + i) {
        let Some(close) = first[open + 4..].find("-->").map(|i| open + 4 + i) else {
            break;
        };
        let inner: String = first[open + 4..close]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if let Some(name) = inner.strip_prefix("layout:").filter(|n| !n.is_empty()) {
            let line = [&first[..open], &first[close + 3..]].concat();
            let body = match rest {
                Some(rest) if line.trim().is_empty() => rest.to_owned(),
                Some(rest) => [line.as_str(), "\n", rest].concat(),
                None if line.trim().is_empty() => String::new(),
                None => line,
            };
            return (Some(format!("layouts/{name}")), body);
        }
        from = close + 3;
    }
    (None, src.to_owned())
}

fn register_page(app: &App, path: &str, slot: Arc<ArcSwap<TemplateSet>>) -> Result<()> {
    let rel = path.strip_prefix("pages/").unwrap_or(path);
    let rel = if rel == "index.html" || rel.ends_with("/index.html") {
        rel
    } else {
        template_name(rel)
    };
    let route = split_file(rel);
    app.handle_page(
        &route.pattern,
        &view_name(&route.host, &route.path),
        Arc::new(HtmlViewer::new(slot)),
    )
}
