//! Wire format for archive requests and responses.
//!
//! ```text
//! request:  [channel:u8][id:u8]
//! response: [channel:u8][id:u8][status:u8][length:u32 BE][body]
//! ```
//! A `status` of 0 carries the framed payload; any other status carries a
//! UTF-8 error message. An error ends only that exchange, not the connection.

use std::io;

use arcache_core::CacheError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const REQUEST_SIZE: usize = 2;

/// channel:u8 + id:u8 + status:u8 + length:u32 = 7
pub const RESPONSE_HEADER_SIZE: usize = 7;

/// Default upper bound on a single response body: 64 MiB.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    pub channel: u8,
    pub id: u8,
}

impl Request {
    pub fn new(channel: u8, id: u8) -> Self {
        Self { channel, id }
    }

    pub fn to_bytes(self) -> [u8; REQUEST_SIZE] {
        [self.channel, self.id]
    }

    pub fn from_bytes(buf: [u8; REQUEST_SIZE]) -> Self {
        Self {
            channel: buf[0],
            id: buf[1],
        }
    }
}

/// Outcome code carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    IndexNotFound = 1,
    ArchiveNotFound = 2,
    ContentUnavailable = 3,
    Internal = 4,
}

impl Status {
    pub fn of(err: &CacheError) -> Self {
        match err {
            CacheError::IndexNotFound { .. } => Status::IndexNotFound,
            CacheError::ArchiveNotFound { .. } => Status::ArchiveNotFound,
            CacheError::ContentUnavailable { .. } => Status::ContentUnavailable,
            _ => Status::Internal,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Status::Ok),
            1 => Some(Status::IndexNotFound),
            2 => Some(Status::ArchiveNotFound),
            3 => Some(Status::ContentUnavailable),
            4 => Some(Status::Internal),
            _ => None,
        }
    }
}

/// Error reported by the server for one request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("request ({channel}, {id}) failed with {status:?}: {message}")]
pub struct RemoteError {
    pub channel: u8,
    pub id: u8,
    pub status: Status,
    pub message: String,
}

/// A response as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub channel: u8,
    pub id: u8,
    pub status: Status,
    pub body: Vec<u8>,
}

impl WireResponse {
    /// The framed payload, or the server's error for this request.
    pub fn into_result(self) -> Result<Vec<u8>, RemoteError> {
        match self.status {
            Status::Ok => Ok(self.body),
            status => Err(RemoteError {
                channel: self.channel,
                id: self.id,
                status,
                message: String::from_utf8_lossy(&self.body).into_owned(),
            }),
        }
    }
}

/// Read one request. Returns `None` when the peer closed the stream between
/// requests; a close part-way through a request is an `UnexpectedEof` error.
pub async fn read_request<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<Option<Request>> {
    let mut buf = [0u8; REQUEST_SIZE];
    let mut filled = 0;
    while filled < REQUEST_SIZE {
        let n = r.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated request: {filled} of {REQUEST_SIZE} bytes"),
            ));
        }
        filled += n;
    }
    Ok(Some(Request::from_bytes(buf)))
}

pub async fn write_request<W: AsyncWrite + Unpin>(w: &mut W, request: Request) -> io::Result<()> {
    w.write_all(&request.to_bytes()).await
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    w: &mut W,
    channel: u8,
    id: u8,
    status: Status,
    body: &[u8],
) -> io::Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "response body exceeds u32 length")
        })?;
    let mut header = [0u8; RESPONSE_HEADER_SIZE];
    header[0] = channel;
    header[1] = id;
    header[2] = status as u8;
    header[3..7].copy_from_slice(&len.to_be_bytes());
    w.write_all(&header).await?;
    w.write_all(body).await
}

pub async fn read_response<R: AsyncRead + Unpin>(
    r: &mut R,
    max_size: usize,
) -> anyhow::Result<WireResponse> {
    let mut header = [0u8; RESPONSE_HEADER_SIZE];
    r.read_exact(&mut header).await?;

    let status = Status::from_u8(header[2])
        .ok_or_else(|| anyhow::anyhow!("unknown response status {}", header[2]))?;
    let len = u32::from_be_bytes([header[3], header[4], header[5], header[6]]) as usize;
    if len > max_size {
        anyhow::bail!("response too large: {} > {}", len, max_size);
    }

    let mut body = vec![0u8; len];
    r.read_exact(&mut body).await?;
    Ok(WireResponse {
        channel: header[0],
        id: header[1],
        status,
        body,
    })
}
