use std::io::{Read, Write};

use anyhow::Context;
use arcache_core::{Codec, CompressionType};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

/// Bzip2 codec.
///
/// The stream keeps its `BZh` magic; nothing is stripped before framing.
/// Slower than gzip but usually smaller on the repetitive data archives hold.
pub struct Bzip2Codec {
    /// Block size level (1 = 100k blocks, 9 = 900k blocks).
    pub level: u32,
}

impl Default for Bzip2Codec {
    fn default() -> Self {
        Self { level: 9 }
    }
}

impl Bzip2Codec {
    pub fn new(level: u32) -> Self {
        Self { level: level.clamp(1, 9) }
    }
}

impl Codec for Bzip2Codec {
    fn compression(&self) -> CompressionType {
        CompressionType::Bzip2
    }

    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = BzEncoder::new(
            Vec::with_capacity(raw.len() / 2 + 64),
            Compression::new(self.level),
        );
        encoder.write_all(raw).context("bzip2 compress")?;
        Ok(encoder.finish().context("bzip2 finish")?)
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut raw = Vec::new();
        BzDecoder::new(compressed)
            .read_to_end(&mut raw)
            .context("bzip2 decompress")?;
        Ok(raw)
    }
}
