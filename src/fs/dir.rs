use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::{DirEntry, FileSystem, Metadata, not_found};

/// A file tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Resolves a tree path below the root, refusing `..` and absolute paths.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(not_found(path));
        }
        Ok(self.root.join(relative))
    }
}

impl FileSystem for DirFs {
    fn metadata(&self, path: &str) -> io::Result<Metadata> {
        let meta = std::fs::metadata(self.resolve(path)?)?;
        Ok(Metadata {
            len: meta.len(),
            modified: meta.modified().ok(),
            is_dir: meta.is_dir(),
        })
    }

    fn read(&self, path: &str) -> io::Result<Bytes> {
        std::fs::read(self.resolve(path)?).map(Bytes::from)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path)?)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            entries.push(DirEntry {
                name,
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
