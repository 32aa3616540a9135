//! Snapshot manifest and the store builder that consumes it.
//!
//! A snapshot directory looks like:
//! ```text
//! <root>/manifest.json
//! <root>/<index id>/<archive id>      ← raw, uncompressed contents
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::Archive;
use crate::codec::CompressionType;
use crate::error::{CacheError, Result};
use crate::index::Index;
use crate::source::ContentSource;
use crate::store::Store;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub indexes: Vec<IndexManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub id: u8,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub archives: Vec<ArchiveManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub id: u8,
    #[serde(default)]
    pub revision: u32,
    #[serde(default = "default_compression")]
    pub compression: CompressionType,
}

fn default_compression() -> CompressionType {
    CompressionType::Gzip
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CacheError::InvalidManifest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CacheError::InvalidManifest(e.to_string()))
    }

    /// Read `<root>/manifest.json`.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(root.as_ref().join(MANIFEST_FILE))?;
        Self::from_json(&text)
    }
}

/// Assembles a [`Store`] from a [`Manifest`] and a [`ContentSource`].
///
/// Every archive's contents are read once to compute its CRC-32, so a
/// missing archive fails the whole build rather than surfacing at serve time.
pub struct StoreBuilder<'a> {
    source: &'a dyn ContentSource,
}

impl<'a> StoreBuilder<'a> {
    pub fn new(source: &'a dyn ContentSource) -> Self {
        Self { source }
    }

    pub fn build(&self, manifest: &Manifest) -> Result<Store> {
        let mut indexes = Vec::with_capacity(manifest.indexes.len());
        for index in &manifest.indexes {
            let mut archives = Vec::with_capacity(index.archives.len());
            for entry in &index.archives {
                let raw = self.source.load(index.id, entry.id)?;
                archives.push(Archive::new(
                    index.id,
                    entry.id,
                    entry.compression,
                    crc32fast::hash(&raw),
                    entry.revision,
                ));
            }
            let built = Index::new(index.id, index.revision, archives)?;
            debug!(
                index = built.id(),
                archives = built.len(),
                crc = built.crc(),
                revision = built.revision(),
                "built index"
            );
            indexes.push(built);
        }
        Store::new(indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const MANIFEST: &str = r#"{
        "indexes": [
            { "id": 1, "revision": 3, "archives": [
                { "id": 0, "revision": 2, "compression": "none" } ] },
            { "id": 0, "archives": [ { "id": 7 } ] }
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.indexes.len(), 2);
        let defaulted = &manifest.indexes[1].archives[0];
        assert_eq!(defaulted.compression, CompressionType::Gzip);
        assert_eq!(defaulted.revision, 0);
        assert_eq!(Manifest::from_json(&manifest.to_json().unwrap()).unwrap(), manifest);
    }

    #[test]
    fn builds_store_with_content_crcs() {
        let mut src = MemorySource::new();
        src.insert(1, 0, b"first".to_vec());
        src.insert(0, 7, b"second".to_vec());

        let store = StoreBuilder::new(&src).build(&Manifest::from_json(MANIFEST).unwrap()).unwrap();
        let ids: Vec<u8> = store.indexes().map(|i| i.id()).collect();
        assert_eq!(ids, vec![0, 1]);
        let archive = store.find_index(1).unwrap().get_archive(0).unwrap();
        assert_eq!(archive.crc(), crc32fast::hash(b"first"));
        assert_eq!(archive.revision(), 2);
        store.verify().unwrap();
    }

    #[test]
    fn missing_content_fails_build() {
        let src = MemorySource::new();
        let err = StoreBuilder::new(&src)
            .build(&Manifest::from_json(MANIFEST).unwrap())
            .unwrap_err();
        assert!(matches!(err, CacheError::ContentUnavailable { .. }));
    }

    #[test]
    fn malformed_json_is_invalid_manifest() {
        assert!(matches!(Manifest::from_json("{"), Err(CacheError::InvalidManifest(_))));
    }
}
