use serde::{Deserialize, Serialize};

use crate::codec::CompressionType;
use crate::error::{CacheError, Result};

/// Fixed size of the frame header in bytes.
///   compression:u8 + length:u32
///   = 1 + 4 = 5
pub const FRAME_HEADER_SIZE: usize = 5;

/// Size of the trailer appended after compressed (non-`None`) payloads.
pub const TRAILER_SIZE: usize = 4;

// ── Trailer policy ─────────────────────────────────────────────────────────

/// What to write into the 4-byte trailer of a compressed frame.
///
/// The trailer's meaning is not confirmed by any known consumer; it is
/// conventionally read as the archive revision. Only its presence rule is
/// fixed: present iff the compression type is not `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailerPolicy {
    #[default]
    ArchiveRevision,
    Zero,
}

impl TrailerPolicy {
    pub fn trailer_for(self, revision: u32) -> u32 {
        match self {
            TrailerPolicy::ArchiveRevision => revision,
            TrailerPolicy::Zero => 0,
        }
    }
}

// ── Encoding ───────────────────────────────────────────────────────────────

/// Wrap an already-compressed `payload` in a frame.
///
/// ```text
/// [compression:u8][length:u32 BE][payload][trailer:u32 BE, only if compression != None]
/// ```
/// `trailer` is ignored for `CompressionType::None`.
pub fn encode_frame(compression: CompressionType, payload: &[u8], trailer: u32) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        CacheError::MalformedFrame(format!(
            "payload of {} bytes exceeds u32 length",
            payload.len()
        ))
    })?;

    let trailer_len = if compression.has_trailer() { TRAILER_SIZE } else { 0 };
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + trailer_len);
    buf.push(compression.as_u8());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    if compression.has_trailer() {
        buf.extend_from_slice(&trailer.to_be_bytes());
    }
    Ok(buf)
}

/// Total framed size for a payload of `payload_len` bytes.
pub fn framed_len(compression: CompressionType, payload_len: usize) -> usize {
    FRAME_HEADER_SIZE + payload_len + if compression.has_trailer() { TRAILER_SIZE } else { 0 }
}

// ── Decoding ───────────────────────────────────────────────────────────────

/// Borrowed view of a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub compression: CompressionType,
    /// Compressed payload (raw bytes when `compression` is `None`).
    pub payload: &'a [u8],
    /// Trailer value, present iff `compression` is not `None`.
    pub trailer: Option<u32>,
}

impl<'a> Frame<'a> {
    /// Parse `bytes` as exactly one frame, checking the length prefix and
    /// trailer presence. Trailing bytes after the frame are rejected.
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(CacheError::MalformedFrame(format!(
                "{} bytes is shorter than the {}-byte header",
                bytes.len(),
                FRAME_HEADER_SIZE
            )));
        }
        let compression = CompressionType::try_from(bytes[0])?;
        let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

        let expected = framed_len(compression, len);
        if bytes.len() != expected {
            return Err(CacheError::MalformedFrame(format!(
                "{:?} frame declares {} payload bytes ({} total) but has {}",
                compression,
                len,
                expected,
                bytes.len()
            )));
        }

        let payload_end = FRAME_HEADER_SIZE + len;
        let payload = &bytes[FRAME_HEADER_SIZE..payload_end];
        let trailer = compression.has_trailer().then(|| {
            u32::from_be_bytes([
                bytes[payload_end],
                bytes[payload_end + 1],
                bytes[payload_end + 2],
                bytes[payload_end + 3],
            ])
        });

        Ok(Self {
            compression,
            payload,
            trailer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_frame_layout() {
        let framed = encode_frame(CompressionType::None, b"abcxyz", 99).unwrap();
        assert_eq!(framed, b"\x00\x00\x00\x00\x06abcxyz");
    }

    #[test]
    fn none_frame_roundtrip_including_empty() {
        for payload in [&b""[..], &b"x"[..], &[0xffu8; 300][..]] {
            let framed = encode_frame(CompressionType::None, payload, 0).unwrap();
            let frame = Frame::decode(&framed).unwrap();
            assert_eq!(frame.payload, payload);
            assert_eq!(frame.trailer, None);
        }
    }

    #[test]
    fn compressed_frame_carries_trailer() {
        let framed = encode_frame(CompressionType::Gzip, b"zz", 0x0102_0304).unwrap();
        assert_eq!(framed, [1, 0, 0, 0, 2, b'z', b'z', 1, 2, 3, 4]);
        let frame = Frame::decode(&framed).unwrap();
        assert_eq!(frame.compression, CompressionType::Gzip);
        assert_eq!(frame.trailer, Some(0x0102_0304));
    }

    #[test]
    fn rejects_truncated_trailer() {
        let mut framed = encode_frame(CompressionType::Bzip2, b"abc", 7).unwrap();
        framed.pop();
        assert!(matches!(Frame::decode(&framed), Err(CacheError::MalformedFrame(_))));
    }

    #[test]
    fn rejects_wrong_length_prefix() {
        let mut framed = encode_frame(CompressionType::None, b"abc", 0).unwrap();
        framed[4] = 9;
        assert!(matches!(Frame::decode(&framed), Err(CacheError::MalformedFrame(_))));
        assert!(matches!(Frame::decode(&[0, 0, 0]), Err(CacheError::MalformedFrame(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut framed = encode_frame(CompressionType::None, b"abc", 0).unwrap();
        framed.push(0);
        assert!(Frame::decode(&framed).is_err());
    }

    #[test]
    fn trailer_policy() {
        assert_eq!(TrailerPolicy::ArchiveRevision.trailer_for(12), 12);
        assert_eq!(TrailerPolicy::Zero.trailer_for(12), 0);
    }
}
