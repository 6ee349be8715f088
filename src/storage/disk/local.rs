//! Local filesystem disk.

use super::{Disk, file_not_found, path_segments};
use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// A disk rooted at a local directory.
///
/// Local artifacts are transient: delivery removes them.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    /// Creates a disk named `local` rooted at `root`.
    ///
    /// The directory is created lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "local".to_string(),
            root: root.into(),
        }
    }

    /// Overrides the disk name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(path_segments(path)?
            .into_iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }
}

fn io_error(operation: &str, path: &str, e: &std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        file_not_found(path)
    } else {
        Error::operation(operation, format!("{path}: {e}"))
    }
}

impl Disk for LocalDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_transient(&self) -> bool {
        true
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(self.resolve(path)?).map_err(|e| io_error("open_file", path, &e))?;
        Ok(Box::new(file))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<u64> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create_dir", path, &e))?;
        }
        fs::write(&full, bytes).map_err(|e| io_error("write_file", path, &e))?;
        Ok(bytes.len() as u64)
    }

    fn size(&self, path: &str) -> Result<u64> {
        fs::metadata(self.resolve(path)?)
            .map(|m| m.len())
            .map_err(|e| io_error("stat_file", path, &e))
    }

    fn delete(&self, path: &str) -> Result<bool> {
        match fs::remove_file(self.resolve(path)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("delete_file", path, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn disk() -> (TempDir, LocalDisk) {
        let dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(dir.path().join("files"));
        (dir, disk)
    }

    #[test]
    fn test_write_read_size_delete() {
        let (_dir, disk) = disk();
        assert_eq!(disk.write("ie/imports/a.csv", b"name\nAda\n").unwrap(), 9);
        assert_eq!(disk.size("ie/imports/a.csv").unwrap(), 9);

        let mut content = String::new();
        disk.open_read("ie/imports/a.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "name\nAda\n");

        assert!(disk.delete("ie/imports/a.csv").unwrap());
        assert!(!disk.delete("ie/imports/a.csv").unwrap());
        assert!(!disk.exists("ie/imports/a.csv"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, disk) = disk();
        assert!(matches!(
            disk.open_read("nope.csv"),
            Err(Error::NotFound { entity: "file", .. })
        ));
        assert!(matches!(disk.size("nope.csv"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, disk) = disk();
        assert!(matches!(
            disk.write("../escape.csv", b"x"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_named_disk_is_transient() {
        let (_dir, disk) = disk();
        let disk = disk.with_name("scratch");
        let handle = disk.delivery_handle("a.csv");
        assert_eq!(handle.disk, "scratch");
        assert!(handle.transient);
    }
}
