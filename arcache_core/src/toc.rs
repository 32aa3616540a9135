//! Table-of-contents encoding for a single index.
//!
//! ```text
//! [version:u8 = 1]
//! [index revision:u32 BE]
//! [archive count:u16 BE]
//! count × ([archive id:u8][crc:u32 BE][revision:u32 BE])   ← ascending id
//! ```
//! The encoding is deterministic, since its CRC-32 is the index `crc`.

use crate::error::{CacheError, Result};

pub const TOC_VERSION: u8 = 1;

/// version:u8 + revision:u32 + count:u16 = 7
pub const TOC_HEADER_SIZE: usize = 7;

/// id:u8 + crc:u32 + revision:u32 = 9
pub const TOC_ENTRY_SIZE: usize = 9;

/// One archive's row in the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub archive: u8,
    pub crc: u32,
    pub revision: u32,
}

/// Decoded table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOfContents {
    pub revision: u32,
    pub entries: Vec<TocEntry>,
}

impl TableOfContents {
    /// Encode `entries`, which must already be in strictly ascending id order.
    pub fn encode(revision: u32, entries: impl ExactSizeIterator<Item = TocEntry>) -> Vec<u8> {
        let count = entries.len();
        let mut buf = Vec::with_capacity(TOC_HEADER_SIZE + count * TOC_ENTRY_SIZE);
        buf.push(TOC_VERSION);
        buf.extend_from_slice(&revision.to_be_bytes());
        // archive ids are u8, so at most 256 entries
        buf.extend_from_slice(&(count as u16).to_be_bytes());
        for entry in entries {
            buf.push(entry.archive);
            buf.extend_from_slice(&entry.crc.to_be_bytes());
            buf.extend_from_slice(&entry.revision.to_be_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TOC_HEADER_SIZE {
            return Err(malformed(format!("{} bytes is shorter than the header", bytes.len())));
        }
        if bytes[0] != TOC_VERSION {
            return Err(malformed(format!("unsupported version {}", bytes[0])));
        }
        let revision = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let count = u16::from_be_bytes([bytes[5], bytes[6]]) as usize;

        let expected = TOC_HEADER_SIZE + count * TOC_ENTRY_SIZE;
        if bytes.len() != expected {
            return Err(malformed(format!(
                "{count} entries need {expected} bytes but got {}",
                bytes.len()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        for chunk in bytes[TOC_HEADER_SIZE..].chunks_exact(TOC_ENTRY_SIZE) {
            let entry = TocEntry {
                archive: chunk[0],
                crc: u32::from_be_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]),
                revision: u32::from_be_bytes([chunk[5], chunk[6], chunk[7], chunk[8]]),
            };
            if let Some(prev) = entries.last().map(|e: &TocEntry| e.archive) {
                if entry.archive <= prev {
                    return Err(malformed(format!(
                        "archive ids not ascending: {} follows {}",
                        entry.archive, prev
                    )));
                }
            }
            entries.push(entry);
        }

        Ok(Self { revision, entries })
    }

    /// CRC-32 of an encoded table of contents, as stored in `Index::crc`.
    pub fn checksum(encoded: &[u8]) -> u32 {
        crc32fast::hash(encoded)
    }
}

fn malformed(msg: String) -> CacheError {
    CacheError::MalformedTableOfContents(msg)
}
