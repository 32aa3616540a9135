use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Compression algorithm applied to an archive payload.
///
/// The discriminant is the first byte of every frame, so the values are part
/// of the wire format and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Gzip = 1,
    Bzip2 = 2,
}

impl CompressionType {
    pub const ALL: [CompressionType; 3] =
        [CompressionType::None, CompressionType::Gzip, CompressionType::Bzip2];

    /// Whether frames of this type carry the 4-byte trailer.
    pub fn has_trailer(self) -> bool {
        self != CompressionType::None
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CompressionType {
    type Error = CacheError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Gzip),
            2 => Ok(CompressionType::Bzip2),
            other => Err(CacheError::MalformedFrame(format!("unknown compression type {other}"))),
        }
    }
}

impl std::str::FromStr for CompressionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "none" | "raw" => Ok(CompressionType::None),
            "gzip" | "gz" => Ok(CompressionType::Gzip),
            "bzip2" | "bz2" => Ok(CompressionType::Bzip2),
            other => anyhow::bail!(
                "unknown compression '{}'. Valid options: none, gzip, bzip2",
                other
            ),
        }
    }
}

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by the [`CompressionType`] written as the frame's first byte.
/// - Compresses a whole archive payload in one call; framing is applied by
///   the caller, never by the codec.
pub trait Codec: Send + Sync {
    /// Compression type this codec produces and accepts.
    fn compression(&self) -> CompressionType;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(CompressionType::None.as_u8(), 0);
        assert_eq!(CompressionType::Gzip.as_u8(), 1);
        assert_eq!(CompressionType::Bzip2.as_u8(), 2);
        for c in CompressionType::ALL {
            assert_eq!(CompressionType::try_from(c.as_u8()).unwrap(), c);
        }
    }

    #[test]
    fn unknown_byte_is_malformed() {
        assert!(matches!(CompressionType::try_from(3), Err(CacheError::MalformedFrame(_))));
    }

    #[test]
    fn parses_names() {
        assert_eq!("gz".parse::<CompressionType>().unwrap(), CompressionType::Gzip);
        assert_eq!("bzip2".parse::<CompressionType>().unwrap(), CompressionType::Bzip2);
        assert!("lzma".parse::<CompressionType>().is_err());
    }
}
