use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{CacheError, Result};

/// Supplies the raw, uncompressed contents of an archive.
///
/// `load` may perform blocking disk or network I/O. Any failure to produce
/// the bytes must surface as [`CacheError::ContentUnavailable`].
pub trait ContentSource: Send + Sync {
    fn load(&self, index: u8, archive: u8) -> Result<Vec<u8>>;
}

/// In-memory content, keyed by `(index, archive)`.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    contents: HashMap<(u8, u8), Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u8, archive: u8, data: impl Into<Vec<u8>>) {
        self.contents.insert((index, archive), data.into());
    }
}

impl ContentSource for MemorySource {
    fn load(&self, index: u8, archive: u8) -> Result<Vec<u8>> {
        self.contents.get(&(index, archive)).cloned().ok_or_else(|| {
            CacheError::content_unavailable(index, archive, "not present in memory source")
        })
    }
}

/// Reads archive contents from `<root>/<index>/<archive>`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, index: u8, archive: u8) -> PathBuf {
        self.root.join(index.to_string()).join(archive.to_string())
    }
}

impl ContentSource for DirectorySource {
    fn load(&self, index: u8, archive: u8) -> Result<Vec<u8>> {
        std::fs::read(self.path_of(index, archive)).map_err(|source| {
            CacheError::ContentUnavailable {
                index,
                archive,
                source,
            }
        })
    }
}
