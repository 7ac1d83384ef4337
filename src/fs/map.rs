use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::RwLock;

use super::{DirEntry, FileSystem, Metadata, not_found};

#[derive(Debug, Clone)]
struct MapFile {
    data: Bytes,
    modified: Option<SystemTime>,
}

/// An in-memory file tree.
///
/// Clones share the same files, so a test can hand one clone to an
/// [`App`](crate::app::App) and keep editing through another while the
/// watcher picks the changes up. Directories exist implicitly whenever a file
/// lives beneath them.
///
/// ```
/// use vista::fs::{FileSystem, MapFs};
///
/// let fsys = MapFs::new().with_file("public/index.html", "<html></html>");
/// assert_eq!(fsys.read("public/index.html").unwrap().as_ref(), b"<html></html>");
/// assert!(fsys.metadata("public").unwrap().is_dir);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapFs {
    files: Arc<RwLock<BTreeMap<String, MapFile>>>,
    immutable: bool,
}

impl MapFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file stamped with the current time.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    /// Creates or overwrites a file, stamping it with the current time.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.insert_with_time(path, data, Some(SystemTime::now()));
    }

    /// Creates or overwrites a file with an explicit modification time.
    pub fn insert_with_time(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        modified: Option<SystemTime>,
    ) {
        let file = MapFile {
            data: data.into(),
            modified,
        };
        self.files.write().insert(path.into(), file);
    }

    /// Deletes a file. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Marks the tree as immutable so file viewers precompute ETags.
    #[must_use]
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    // Prefix under which children of `dir` are stored.
    fn dir_prefix(dir: &str) -> String {
        if dir.is_empty() || dir == "." {
            String::new()
        } else {
            format!("{}/", dir.trim_end_matches('/'))
        }
    }
}

impl FileSystem for MapFs {
    fn metadata(&self, path: &str) -> io::Result<Metadata> {
        let files = self.files.read();
        if let Some(file) = files.get(path) {
            return Ok(Metadata {
                len: file.data.len() as u64,
                modified: file.modified,
                is_dir: false,
            });
        }
        let prefix = Self::dir_prefix(path);
        let is_dir = prefix.is_empty()
            || files
                .range(prefix.clone()..)
                .next()
                .is_some_and(|(name, _)| name.starts_with(&prefix));
        if is_dir {
            Ok(Metadata {
                len: 0,
                modified: None,
                is_dir: true,
            })
        } else {
            Err(not_found(path))
        }
    }

    fn read(&self, path: &str) -> io::Result<Bytes> {
        self.files
            .read()
            .get(path)
            .map(|file| file.data.clone())
            .ok_or_else(|| not_found(path))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let files = self.files.read();
        let prefix = Self::dir_prefix(path);
        let mut entries: Vec<DirEntry> = Vec::new();
        for name in files.keys().filter_map(|k| k.strip_prefix(prefix.as_str())) {
            let (child, is_dir) = match name.split_once('/') {
                Some((dir, _)) => (dir, true),
                None => (name, false),
            };
            match entries.last_mut() {
                Some(last) if last.name == child => last.is_dir |= is_dir,
                _ => entries.push(DirEntry {
                    name: child.to_owned(),
                    is_dir,
                }),
            }
        }
        if entries.is_empty() && !prefix.is_empty() {
            return Err(not_found(path));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        Ok(entries)
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }
}
