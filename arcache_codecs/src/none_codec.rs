use arcache_core::{Codec, CompressionType};

/// No-op codec: payloads are stored verbatim.
///
/// Frames produced with it carry no trailer, and the control channel always
/// uses it for metadata responses.
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn compression(&self) -> CompressionType {
        CompressionType::None
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
