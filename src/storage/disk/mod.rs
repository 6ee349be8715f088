//! Named file stores for uploads and generated artifacts.
//!
//! A [`Disk`] addresses files by relative, `/`-separated paths. Whether a
//! disk is transient decides what happens after an artifact is delivered:
//! transient files are removed once streamed, durable files are kept.

mod local;
mod memory;

pub use local::LocalDisk;
pub use memory::MemoryDisk;

use crate::{Error, Result};
use std::io::Read;

/// Where a generated artifact lives and how delivery treats it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryHandle {
    /// Name of the disk holding the artifact.
    pub disk: String,
    /// Path on that disk.
    pub path: String,
    /// Delete after delivery.
    pub transient: bool,
}

/// A file store.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Disk: Send + Sync {
    /// Returns the configured disk name.
    fn name(&self) -> &str;

    /// Returns true if delivered files should be removed.
    fn is_transient(&self) -> bool;

    /// Opens a file for streaming reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist.
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Writes a file, replacing any existing content. Returns the byte count.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the write fails.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<u64>;

    /// Returns the size of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist.
    fn size(&self, path: &str) -> Result<u64>;

    /// Deletes a file. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or removal fails.
    fn delete(&self, path: &str) -> Result<bool>;

    /// Returns true if the file exists.
    fn exists(&self, path: &str) -> bool {
        self.size(path).is_ok()
    }

    /// Describes how an artifact at `path` is delivered.
    fn delivery_handle(&self, path: &str) -> DeliveryHandle {
        DeliveryHandle {
            disk: self.name().to_string(),
            path: path.to_string(),
            transient: self.is_transient(),
        }
    }
}

/// Validates a disk-relative path and returns its segments.
///
/// Rejects empty paths, absolute paths, backslashes, NUL, and `.`/`..`
/// segments, so no path can escape the disk root.
pub(crate) fn path_segments(path: &str) -> Result<Vec<&str>> {
    let invalid = || Error::InvalidInput(format!("invalid storage path '{path}'"));

    if path.is_empty() || path.starts_with('/') || path.contains(['\\', '\0']) {
        return Err(invalid());
    }

    let segments: Vec<&str> = path.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(invalid());
    }

    Ok(segments)
}

pub(crate) fn file_not_found(path: &str) -> Error {
    Error::NotFound {
        entity: "file",
        id: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ie/imports/a.csv", true ; "nested")]
    #[test_case("a.csv", true ; "flat")]
    #[test_case("", false ; "empty")]
    #[test_case("/etc/passwd", false ; "absolute")]
    #[test_case("ie/../../etc", false ; "parent")]
    #[test_case("ie/./a.csv", false ; "current")]
    #[test_case("ie//a.csv", false ; "empty segment")]
    #[test_case("ie\\a.csv", false ; "backslash")]
    fn test_path_segments(path: &str, valid: bool) {
        assert_eq!(path_segments(path).is_ok(), valid);
    }

    #[test]
    fn test_delivery_handle_reflects_disk() {
        let disk = MemoryDisk::new();
        let handle = disk.delivery_handle("ie/exports/x.csv");
        assert_eq!(handle.disk, "memory");
        assert!(!handle.transient);
    }
}
