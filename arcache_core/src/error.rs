use thiserror::Error;

use crate::codec::CompressionType;

/// Errors produced by the archive store, its binary formats, and its sources.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested channel has no corresponding index.
    #[error("index {index} not found")]
    IndexNotFound { index: u8 },

    /// The index exists but holds no archive with this id.
    #[error("archive {archive} not found in index {index}")]
    ArchiveNotFound { index: u8, archive: u8 },

    /// The archive exists but its raw contents could not be materialized.
    #[error("contents of archive {archive} in index {index} are unavailable")]
    ContentUnavailable {
        index: u8,
        archive: u8,
        #[source]
        source: std::io::Error,
    },

    /// Framed bytes violate the `[type][length][payload][trailer?]` layout.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("malformed table of contents: {0}")]
    MalformedTableOfContents(String),

    /// An index's stored crc disagrees with its encoded table of contents.
    #[error("index {index} crc mismatch: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch { index: u8, expected: u32, actual: u32 },

    #[error("codec mismatch: archive declares {expected:?} but codec is {actual:?}")]
    CodecMismatch {
        expected: CompressionType,
        actual: CompressionType,
    },

    #[error("{compression:?} codec failed")]
    Codec {
        compression: CompressionType,
        #[source]
        source: anyhow::Error,
    },

    /// Duplicate ids, misplaced archives, or use of the reserved index id.
    #[error("inconsistent store: {0}")]
    InconsistentStore(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Convenience constructor for a missing-content failure with a plain message.
    pub fn content_unavailable(index: u8, archive: u8, reason: impl Into<String>) -> Self {
        CacheError::ContentUnavailable {
            index,
            archive,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, reason.into()),
        }
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
