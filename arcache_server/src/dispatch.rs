use std::sync::Arc;

use arcache_codecs::codec_for;
use arcache_core::{
    encode_frame, CacheError, CompressionType, Result, TrailerPolicy, CONTROL_CHANNEL,
};
use tracing::debug;

use crate::handle::{Snapshot, StoreHandle};
use crate::wire::Request;

/// A successful answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub channel: u8,
    pub id: u8,
    /// Framed payload.
    pub data: Arc<[u8]>,
}

/// Maps `(channel, id)` requests onto the current store snapshot.
///
/// Stateless: every call loads one snapshot and answers from it alone, so a
/// concurrent publish is observed either entirely or not at all.
#[derive(Clone)]
pub struct Dispatcher {
    handle: StoreHandle,
    trailer: TrailerPolicy,
}

impl Dispatcher {
    pub fn new(handle: StoreHandle, trailer: TrailerPolicy) -> Self {
        Self { handle, trailer }
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Answer one request. May block on the content source.
    pub fn dispatch(&self, request: Request) -> Result<Response> {
        let snapshot = self.handle.load();
        let data = if request.channel == CONTROL_CHANNEL {
            self.control(&snapshot, request.id)?
        } else {
            self.archive(&snapshot, request.channel, request.id)?
        };
        Ok(Response {
            channel: request.channel,
            id: request.id,
            data,
        })
    }

    fn control(&self, snapshot: &Snapshot, id: u8) -> Result<Arc<[u8]>> {
        let store = snapshot.store();
        let payload = if id == CONTROL_CHANNEL {
            debug!(indexes = store.len(), "bulk metadata request");
            store.bulk_metadata()
        } else {
            let index = store.find_index(id)?;
            debug!(index = id, archives = index.len(), "table of contents request");
            index.encode_table_of_contents().to_vec()
        };
        Ok(encode_frame(CompressionType::None, &payload, 0)?.into())
    }

    fn archive(&self, snapshot: &Snapshot, index: u8, archive: u8) -> Result<Arc<[u8]>> {
        let archive = snapshot.store().find_index(index)?.get_archive(archive)?;
        let codec = codec_for(archive.compression());
        archive.packed_bytes(snapshot.source(), codec.as_ref(), self.trailer)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("trailer", &self.trailer).finish()
    }
}

/// `true` when the error stems from the request rather than the server.
pub fn is_client_error(err: &CacheError) -> bool {
    matches!(err, CacheError::IndexNotFound { .. } | CacheError::ArchiveNotFound { .. })
}
