//! File-system boundary. The engine never touches `std::fs` directly outside
//! [`LocalFs`], so scans can run against an in-memory tree.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::path_safety::{check_relative, validate_path, PathError, PathPolicy};

pub trait FileSystem: Send + Sync {
    /// Size in bytes, or `None` when the path is missing or not a file.
    fn file_size(&self, path: &Path) -> Option<u64>;

    fn exists(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Target of a symbolic link, or `None` when `path` is not one.
    fn read_link(&self, path: &Path) -> Option<String>;

    /// Every regular file under `root`, recursively.
    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_exact(&self, path: &Path, buf: &mut [u8]) -> io::Result<()> {
        self.open(path)?.read_exact(buf)
    }

    /// Map a manifest-relative path to a readable location under `root`.
    fn resolve(&self, root: &Path, rel: &str) -> Result<PathBuf, PathError> {
        check_relative(rel)?;
        Ok(root.join(rel))
    }
}

/// The real disk.
#[derive(Clone, Copy, Debug)]
pub struct LocalFs {
    pub policy: PathPolicy,
}

impl Default for LocalFs {
    fn default() -> Self {
        Self { policy: PathPolicy { follow_symlinks: true } }
    }
}

impl FileSystem for LocalFs {
    fn file_size(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(io::BufReader::new(std::fs::File::open(path)?)))
    }

    fn read_link(&self, path: &Path) -> Option<String> {
        std::fs::read_link(path).ok().map(|p| p.to_string_lossy().into_owned())
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for ent in walkdir::WalkDir::new(root).min_depth(1) {
            let ent = ent.map_err(io::Error::from)?;
            if ent.file_type().is_file() || ent.file_type().is_symlink() {
                out.push(ent.into_path());
            }
        }
        out.sort();
        Ok(out)
    }

    fn resolve(&self, root: &Path, rel: &str) -> Result<PathBuf, PathError> {
        validate_path(root, Path::new(rel), self.policy)
    }
}

/// An in-memory tree keyed by full path. Useful in tests and for tools that
/// stage files before writing them.
#[derive(Debug, Default)]
pub struct MemFs {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    links: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), data.into());
        }
    }

    pub fn symlink(&self, path: impl Into<PathBuf>, target: impl Into<String>) {
        if let Ok(mut links) = self.links.write() {
            links.insert(path.into(), target.into());
        }
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().map(|mut f| f.remove(path).is_some()).unwrap_or(false)
    }
}

impl FileSystem for MemFs {
    fn file_size(&self, path: &Path) -> Option<u64> {
        self.files.read().ok()?.get(path).map(|d| d.len() as u64)
    }

    fn exists(&self, path: &Path) -> bool {
        let is_file = self.files.read().map(|f| f.keys().any(|k| k.starts_with(path))).unwrap_or(false);
        is_file || self.links.read().map(|l| l.contains_key(path)).unwrap_or(false)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let files = self.files.read().map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        match files.get(path) {
            Some(d) => Ok(Box::new(Cursor::new(d.clone()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))),
        }
    }

    fn read_link(&self, path: &Path) -> Option<String> {
        self.links.read().ok()?.get(path).cloned()
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let files = self.files.read().map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        let links = self.links.read().map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        let mut out: Vec<PathBuf> = files
            .keys()
            .chain(links.keys())
            .filter(|p| p.starts_with(root) && p.as_path() != root)
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memfs_basics() {
        let fs = MemFs::new();
        fs.insert("/inst/a/b.bin", vec![1u8; 10]);
        fs.insert("/other/c.bin", vec![2u8; 3]);
        assert_eq!(fs.file_size(Path::new("/inst/a/b.bin")), Some(10));
        assert!(fs.exists(Path::new("/inst")));
        assert!(!fs.exists(Path::new("/gone")));
        let mut buf = [0u8; 4];
        fs.read_exact(Path::new("/inst/a/b.bin"), &mut buf).unwrap();
        assert_eq!(buf, [1u8; 4]);
        assert_eq!(fs.walk_files(Path::new("/inst")).unwrap(), vec![PathBuf::from("/inst/a/b.bin")]);
        assert!(fs.remove(Path::new("/inst/a/b.bin")));
        assert!(!fs.exists(Path::new("/inst")));
    }
}
