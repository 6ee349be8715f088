//! In-process disk.

use super::{Disk, file_not_found, path_segments};
use crate::Result;
use crate::storage::sqlite::acquire_lock;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

/// A disk held in memory.
///
/// Stands in for remote object storage: artifacts are durable and kept after
/// delivery.
#[derive(Debug)]
pub struct MemoryDisk {
    name: String,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDisk {
    /// Creates an empty disk named `memory`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the disk name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns a copy of a file's bytes.
    #[must_use]
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        acquire_lock(&self.files).get(path).cloned()
    }

    /// Returns the stored paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = acquire_lock(&self.files).keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for MemoryDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl Disk for MemoryDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_transient(&self) -> bool {
        false
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        path_segments(path)?;
        let bytes = self.contents(path).ok_or_else(|| file_not_found(path))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<u64> {
        path_segments(path)?;
        acquire_lock(&self.files).insert(path.to_string(), bytes.to_vec());
        Ok(bytes.len() as u64)
    }

    fn size(&self, path: &str) -> Result<u64> {
        path_segments(path)?;
        acquire_lock(&self.files)
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| file_not_found(path))
    }

    fn delete(&self, path: &str) -> Result<bool> {
        path_segments(path)?;
        Ok(acquire_lock(&self.files).remove(path).is_some())
    }
}
