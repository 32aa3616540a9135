use std::collections::BTreeMap;
use std::sync::Arc;

use crate::archive::Archive;
use crate::error::{CacheError, Result};
use crate::toc::{TableOfContents, TocEntry};

/// An ordered table of archives sharing one identifier.
///
/// Immutable once built: the table of contents and its `crc` are computed in
/// the constructor from the archive set, so they cannot drift from it.
#[derive(Debug, Clone)]
pub struct Index {
    id: u8,
    crc: u32,
    revision: u32,
    archives: BTreeMap<u8, Archive>,
    toc: Arc<[u8]>,
}

impl Index {
    /// Build an index and derive its `crc` from the encoded table of contents.
    pub fn new(id: u8, revision: u32, archives: impl IntoIterator<Item = Archive>) -> Result<Self> {
        let archives = collect_archives(id, archives)?;
        let toc: Arc<[u8]> = encode(revision, &archives).into();
        Ok(Self {
            id,
            crc: TableOfContents::checksum(&toc),
            revision,
            archives,
            toc,
        })
    }

    /// Build an index with an externally supplied `crc`, e.g. one read back
    /// from a published snapshot. Use [`Index::verify`] to check it.
    pub fn with_checksum(
        id: u8,
        crc: u32,
        revision: u32,
        archives: impl IntoIterator<Item = Archive>,
    ) -> Result<Self> {
        let archives = collect_archives(id, archives)?;
        let toc = encode(revision, &archives).into();
        Ok(Self {
            id,
            crc,
            revision,
            archives,
            toc,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Archives in ascending id order.
    pub fn archives(&self) -> impl Iterator<Item = &Archive> {
        self.archives.values()
    }

    pub fn get_archive(&self, id: u8) -> Result<&Archive> {
        self.archives.get(&id).ok_or(CacheError::ArchiveNotFound {
            index: self.id,
            archive: id,
        })
    }

    /// Deterministic table-of-contents bytes whose CRC-32 is [`Index::crc`].
    pub fn encode_table_of_contents(&self) -> &[u8] {
        &self.toc
    }

    pub fn table_of_contents(&self) -> TableOfContents {
        TableOfContents {
            revision: self.revision,
            entries: self.archives.values().map(toc_entry).collect(),
        }
    }

    /// Recompute the checksum over the table of contents and compare.
    pub fn verify(&self) -> Result<()> {
        let actual = TableOfContents::checksum(&encode(self.revision, &self.archives));
        if actual != self.crc {
            return Err(CacheError::ChecksumMismatch {
                index: self.id,
                expected: self.crc,
                actual,
            });
        }
        Ok(())
    }
}

fn toc_entry(archive: &Archive) -> TocEntry {
    TocEntry {
        archive: archive.id(),
        crc: archive.crc(),
        revision: archive.revision(),
    }
}

fn encode(revision: u32, archives: &BTreeMap<u8, Archive>) -> Vec<u8> {
    TableOfContents::encode(revision, archives.values().map(toc_entry))
}

fn collect_archives(
    index: u8,
    archives: impl IntoIterator<Item = Archive>,
) -> Result<BTreeMap<u8, Archive>> {
    let mut map = BTreeMap::new();
    for archive in archives {
        if archive.index() != index {
            return Err(CacheError::InconsistentStore(format!(
                "archive {} belongs to index {} but was added to index {}",
                archive.id(),
                archive.index(),
                index
            )));
        }
        let id = archive.id();
        if map.insert(id, archive).is_some() {
            return Err(CacheError::InconsistentStore(format!(
                "duplicate archive {id} in index {index}"
            )));
        }
    }
    Ok(map)
}
