use std::io;

use bytes::Bytes;

use super::{DirEntry, FileSystem, MapFs, Metadata};

/// Files compiled into the binary, typically with `include_bytes!`.
///
/// The tree is immutable, so [`FileViewer`](crate::view::FileViewer)s built on
/// it precompute their ETags and never consult modification times.
///
/// ```
/// use vista::fs::{EmbeddedFs, FileSystem};
///
/// static FILES: &[(&str, &[u8])] = &[("public/robots.txt", b"User-agent: *")];
///
/// let fsys = EmbeddedFs::new(FILES);
/// assert!(fsys.is_immutable());
/// assert_eq!(fsys.metadata("public/robots.txt").unwrap().modified, None);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedFs {
    files: MapFs,
}

impl EmbeddedFs {
    pub fn new(files: &'static [(&'static str, &'static [u8])]) -> Self {
        let map = MapFs::new().immutable(true);
        for (path, data) in files {
            map.insert_with_time(*path, Bytes::from_static(data), None);
        }
        Self { files: map }
    }
}

impl FileSystem for EmbeddedFs {
    fn metadata(&self, path: &str) -> io::Result<Metadata> {
        self.files.metadata(path)
    }

    fn read(&self, path: &str) -> io::Result<Bytes> {
        self.files.read(path)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        self.files.read_dir(path)
    }

    fn is_immutable(&self) -> bool {
        true
    }
}
