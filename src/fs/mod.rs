//! Read-only file trees that views and routes are derived from.
//!
//! Paths are slash-separated and relative to the tree root (`public/home.html`,
//! never `./public/home.html` or `/public/home.html`). `"."` names the root.
//!
//! Three implementations ship with the crate:
//!
//! - [`MapFs`]: in-memory and mutable through cheap clones; used by tests and
//!   by applications that generate files at runtime.
//! - [`DirFs`]: a directory on disk.
//! - [`EmbeddedFs`]: `'static` byte slices compiled into the binary. It is
//!   immutable, so file responses get precomputed ETags.

use std::io;
use std::time::SystemTime;

use bytes::Bytes;

mod dir;
mod embed;
mod map;

pub use dir::DirFs;
pub use embed::EmbeddedFs;
pub use map::MapFs;

/// File information returned by [`FileSystem::metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub len: u64,
    /// `None` when the tree has no timestamps (embedded files).
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
}

/// One child returned by [`FileSystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// A read-only tree of named blobs.
///
/// Implementations must be cheap to share across tasks; the watcher, every
/// engine and every [`FileViewer`](crate::view::FileViewer) hold the same
/// `Arc<dyn FileSystem>`.
pub trait FileSystem: Send + Sync {
    /// Stats a file or directory.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::NotFound`] when nothing exists at `path`.
    fn metadata(&self, path: &str) -> io::Result<Metadata>;

    /// Reads a whole file.
    fn read(&self, path: &str) -> io::Result<Bytes>;

    /// Lists a directory, sorted by name.
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Returns `true` when file contents can never change for the lifetime of
    /// the process.
    fn is_immutable(&self) -> bool {
        false
    }
}

/// Joins a directory and a child name, treating `"."` as the root.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        name.to_owned()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// Visits every file under `root` depth-first in name order.
///
/// Directories are descended into but not passed to `visit`. A missing `root`
/// is reported as [`io::ErrorKind::NotFound`]; callers that treat an absent
/// subtree as empty should check for it.
///
/// # Errors
///
/// The first error from the file system or from `visit` stops the walk.
pub fn walk<F>(fsys: &dyn FileSystem, root: &str, visit: &mut F) -> io::Result<()>
where
    F: FnMut(&str, &Metadata) -> io::Result<()>,
{
    let meta = fsys.metadata(root)?;
    if !meta.is_dir {
        return visit(root, &meta);
    }
    for entry in fsys.read_dir(root)? {
        let path = join(root, &entry.name);
        if entry.is_dir {
            walk(fsys, &path, visit)?;
        } else {
            let meta = fsys.metadata(&path)?;
            visit(&path, &meta)?;
        }
    }
    Ok(())
}

/// Like [`walk`], but an absent `root` yields nothing instead of an error.
pub fn walk_existing<F>(fsys: &dyn FileSystem, root: &str, visit: &mut F) -> io::Result<()>
where
    F: FnMut(&str, &Metadata) -> io::Result<()>,
{
    match walk(fsys, root, visit) {
        Err(e) if e.kind() == io::ErrorKind::NotFound && fsys.metadata(root).is_err() => Ok(()),
        other => other,
    }
}

pub(crate) fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path}: file does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapFs {
        MapFs::new()
            .with_file("public/b.txt", "b")
            .with_file("public/a/z.txt", "z")
            .with_file("public/a.txt", "a")
            .with_file("pages/index.html", "<p>")
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join(".", "public"), "public");
        assert_eq!(join("public", "a.txt"), "public/a.txt");
        assert_eq!(join("public/", "a.txt"), "public/a.txt");
    }

    #[test]
    fn walk_is_depth_first_and_sorted() {
        let fsys = sample();
        let mut seen = Vec::new();
        walk(&fsys, "public", &mut |path, _| {
            seen.push(path.to_owned());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["public/a/z.txt", "public/a.txt", "public/b.txt"]);
    }

    #[test]
    fn walk_from_root() {
        let fsys = sample();
        let mut seen = Vec::new();
        walk(&fsys, ".", &mut |path, _| {
            seen.push(path.to_owned());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], "pages/index.html");
    }

    #[test]
    fn walk_missing_root() {
        let fsys = sample();
        let err = walk(&fsys, "text", &mut |_, _| Ok(())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(walk_existing(&fsys, "text", &mut |_, _| Ok(())).is_ok());
    }
}
