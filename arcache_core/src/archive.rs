use std::io;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::codec::{Codec, CompressionType};
use crate::error::{CacheError, Result};
use crate::frame::{encode_frame, Frame, TrailerPolicy};
use crate::source::ContentSource;

/// Packed-bytes state of an archive.
#[derive(Debug, Clone)]
pub enum Packed {
    /// Already compressed and framed. Served verbatim, never recomputed.
    Fresh(Arc<[u8]>),
    /// Must be loaded from the content source and packed on every request.
    NeedsCompute,
}

/// One blob within an index.
#[derive(Debug, Clone)]
pub struct Archive {
    index: u8,
    id: u8,
    compression: CompressionType,
    /// CRC-32 of the raw uncompressed contents.
    crc: u32,
    revision: u32,
    packed: Packed,
}

impl Archive {
    pub fn new(index: u8, id: u8, compression: CompressionType, crc: u32, revision: u32) -> Self {
        Self {
            index,
            id,
            compression,
            crc,
            revision,
            packed: Packed::NeedsCompute,
        }
    }

    /// Attach an already framed payload.
    ///
    /// The frame layout is validated here so a cached frame can be served
    /// without further checks. Its compression byte must match the archive's
    /// declared compression.
    pub fn with_packed(mut self, framed: impl Into<Arc<[u8]>>) -> Result<Self> {
        let framed = framed.into();
        let frame = Frame::decode(&framed)?;
        if frame.compression != self.compression {
            return Err(CacheError::CodecMismatch {
                expected: self.compression,
                actual: frame.compression,
            });
        }
        self.packed = Packed::Fresh(framed);
        Ok(self)
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn packed(&self) -> &Packed {
        &self.packed
    }

    /// Framed bytes for this archive.
    ///
    /// Cached frames are returned as-is. Otherwise the raw contents are loaded
    /// from `source`, compressed with `codec`, and framed; the result is not
    /// written back onto the archive.
    ///
    /// Loaded contents whose CRC-32 differs from the archive's `crc` are never
    /// served: they are reported as [`CacheError::ContentUnavailable`].
    pub fn packed_bytes(
        &self,
        source: &dyn ContentSource,
        codec: &dyn Codec,
        trailer: TrailerPolicy,
    ) -> Result<Arc<[u8]>> {
        match &self.packed {
            Packed::Fresh(framed) => {
                trace!(
                    index = self.index,
                    archive = self.id,
                    len = framed.len(),
                    "serving cached frame"
                );
                Ok(Arc::clone(framed))
            }
            Packed::NeedsCompute => {
                let raw = source.load(self.index, self.id)?;
                self.check_contents(&raw)?;
                let framed = self.pack(&raw, codec, trailer)?;
                trace!(
                    index = self.index,
                    archive = self.id,
                    raw_len = raw.len(),
                    len = framed.len(),
                    "packed archive"
                );
                Ok(framed.into())
            }
        }
    }

    fn check_contents(&self, raw: &[u8]) -> Result<()> {
        let actual = crc32fast::hash(raw);
        if actual == self.crc {
            return Ok(());
        }
        warn!(
            index = self.index,
            archive = self.id,
            expected = %format!("{:08x}", self.crc),
            actual = %format!("{:08x}", actual),
            "archive contents do not match their crc"
        );
        Err(CacheError::ContentUnavailable {
            index: self.index,
            archive: self.id,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("crc mismatch: expected {:08x}, found {:08x}", self.crc, actual),
            ),
        })
    }

    /// Compress `raw` with `codec` and frame it under this archive's metadata.
    pub fn pack(&self, raw: &[u8], codec: &dyn Codec, trailer: TrailerPolicy) -> Result<Vec<u8>> {
        if codec.compression() != self.compression {
            return Err(CacheError::CodecMismatch {
                expected: self.compression,
                actual: codec.compression(),
            });
        }
        let compressed = codec.compress(raw).map_err(|source| CacheError::Codec {
            compression: self.compression,
            source,
        })?;
        encode_frame(self.compression, &compressed, trailer.trailer_for(self.revision))
    }
}
