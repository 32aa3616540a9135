mod bzip2_codec;
mod gzip_codec;
mod none_codec;

pub use bzip2_codec::Bzip2Codec;
pub use gzip_codec::GzipCodec;
pub use none_codec::NoneCodec;

use std::sync::Arc;

use anyhow::Context;
use arcache_core::{Codec, CompressionType, Frame};

/// Resolve the default codec for a compression type.
///
/// Every `CompressionType` has a bundled codec, so this cannot fail.
pub fn codec_for(compression: CompressionType) -> Arc<dyn Codec> {
    match compression {
        CompressionType::None => Arc::new(NoneCodec),
        CompressionType::Gzip => Arc::new(GzipCodec::default()),
        CompressionType::Bzip2 => Arc::new(Bzip2Codec::default()),
    }
}

/// Client-side decode: parse one frame and decompress its payload.
pub fn unpack(framed: &[u8]) -> anyhow::Result<Vec<u8>> {
    let frame = Frame::decode(framed)?;
    codec_for(frame.compression)
        .decompress(frame.payload)
        .with_context(|| format!("decompressing {:?} frame", frame.compression))
}
