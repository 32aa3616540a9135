use std::io::{Read, Write};

use anyhow::Context;
use arcache_core::{Codec, CompressionType};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Gzip codec.
///
/// Emits a complete gzip member (header, deflate stream, CRC/size footer), so
/// payloads can be inspected with stock tools after stripping the frame.
pub struct GzipCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl Codec for GzipCodec {
    fn compression(&self) -> CompressionType {
        CompressionType::Gzip
    }

    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(raw.len() / 2 + 32),
            Compression::new(self.level),
        );
        encoder.write_all(raw).context("gzip compress")?;
        Ok(encoder.finish().context("gzip finish")?)
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut raw = Vec::new();
        GzDecoder::new(compressed)
            .read_to_end(&mut raw)
            .context("gzip decompress")?;
        Ok(raw)
    }
}
