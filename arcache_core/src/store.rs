use std::collections::BTreeMap;

use crate::error::{CacheError, Result};
use crate::index::Index;

/// Channel/index id reserved for metadata queries. No index may use it.
pub const CONTROL_CHANNEL: u8 = 255;

/// crc:u32 + revision:u32 per index in the bulk metadata blob.
pub const BULK_ENTRY_SIZE: usize = 8;

/// Top-level container of all indexes; one consistent cache snapshot.
///
/// Built once and never mutated. A cache update builds a new `Store` and
/// publishes it in place of the old one.
#[derive(Debug, Clone, Default)]
pub struct Store {
    indexes: BTreeMap<u8, Index>,
}

impl Store {
    pub fn new(indexes: impl IntoIterator<Item = Index>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for index in indexes {
            let id = index.id();
            if id == CONTROL_CHANNEL {
                return Err(CacheError::InconsistentStore(format!(
                    "index id {CONTROL_CHANNEL} is reserved for the control channel"
                )));
            }
            if map.insert(id, index).is_some() {
                return Err(CacheError::InconsistentStore(format!("duplicate index {id}")));
            }
        }
        Ok(Self { indexes: map })
    }

    pub fn find_index(&self, id: u8) -> Result<&Index> {
        self.indexes.get(&id).ok_or(CacheError::IndexNotFound { index: id })
    }

    /// Indexes in ascending id order.
    pub fn indexes(&self) -> impl ExactSizeIterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// `(crc, revision)` of every index, big-endian, ascending index id.
    pub fn bulk_metadata(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.indexes.len() * BULK_ENTRY_SIZE);
        for index in self.indexes.values() {
            buf.extend_from_slice(&index.crc().to_be_bytes());
            buf.extend_from_slice(&index.revision().to_be_bytes());
        }
        buf
    }

    /// Check every index's crc against its table of contents.
    pub fn verify(&self) -> Result<()> {
        self.indexes.values().try_for_each(Index::verify)
    }
}

/// One `(crc, revision)` pair from a bulk metadata blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMetadata {
    pub crc: u32,
    pub revision: u32,
}

impl IndexMetadata {
    /// Decode a bulk metadata blob. Entries are in ascending index id order,
    /// but the ids themselves are not carried.
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Self>> {
        if bytes.len() % BULK_ENTRY_SIZE != 0 {
            return Err(CacheError::MalformedFrame(format!(
                "bulk metadata of {} bytes is not a multiple of {}",
                bytes.len(),
                BULK_ENTRY_SIZE
            )));
        }
        Ok(bytes
            .chunks_exact(BULK_ENTRY_SIZE)
            .map(|c| IndexMetadata {
                crc: u32::from_be_bytes([c[0], c[1], c[2], c[3]]),
                revision: u32::from_be_bytes([c[4], c[5], c[6], c[7]]),
            })
            .collect())
    }
}
