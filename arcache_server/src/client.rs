use std::net::SocketAddr;

use anyhow::Context;
use arcache_core::{IndexMetadata, TableOfContents, CONTROL_CHANNEL};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::wire::{read_response, write_request, Request, DEFAULT_MAX_RESPONSE_SIZE};

/// Minimal async client: one request in flight at a time.
pub struct Client {
    rd: BufReader<OwnedReadHalf>,
    wr: OwnedWriteHalf,
    max_response_size: usize,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        stream.set_nodelay(true)?;
        let (rd, wr) = stream.into_split();
        Ok(Self {
            rd: BufReader::new(rd),
            wr,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        })
    }

    pub fn with_max_response_size(mut self, max: usize) -> Self {
        self.max_response_size = max;
        self
    }

    /// Send `(channel, id)` and return the framed payload.
    ///
    /// A server-side failure comes back as a [`crate::wire::RemoteError`]
    /// inside the `anyhow::Error`, and the connection stays usable.
    pub async fn request(&mut self, channel: u8, id: u8) -> anyhow::Result<Vec<u8>> {
        write_request(&mut self.wr, Request::new(channel, id)).await?;
        self.wr.flush().await?;

        let response = read_response(&mut self.rd, self.max_response_size).await?;
        if response.channel != channel || response.id != id {
            anyhow::bail!(
                "response for ({}, {}) does not match request ({}, {})",
                response.channel,
                response.id,
                channel,
                id
            );
        }
        Ok(response.into_result()?)
    }

    /// Request and fully decode an archive.
    pub async fn fetch_archive(&mut self, index: u8, archive: u8) -> anyhow::Result<Vec<u8>> {
        let framed = self.request(index, archive).await?;
        arcache_codecs::unpack(&framed)
    }

    /// `(crc, revision)` for every index, ascending index id.
    pub async fn bulk_metadata(&mut self) -> anyhow::Result<Vec<IndexMetadata>> {
        let payload = self.fetch_archive(CONTROL_CHANNEL, CONTROL_CHANNEL).await?;
        Ok(IndexMetadata::decode_all(&payload)?)
    }

    pub async fn table_of_contents(&mut self, index: u8) -> anyhow::Result<TableOfContents> {
        let payload = self.fetch_archive(CONTROL_CHANNEL, index).await?;
        Ok(TableOfContents::decode(&payload)?)
    }
}
