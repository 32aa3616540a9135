//! Atomically swappable reference to the store being served.
//!
//! The store and the content source it was built from are published together
//! as one [`Snapshot`], so a request never pairs an old catalog with new
//! contents or the other way round.

use std::sync::Arc;

use arc_swap::ArcSwap;
use arcache_core::{ContentSource, Store};
use tracing::info;

/// One immutable cache snapshot: catalog plus the source of raw contents.
pub struct Snapshot {
    store: Store,
    source: Arc<dyn ContentSource>,
}

impl Snapshot {
    pub fn new(store: Store, source: Arc<dyn ContentSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }
}

/// Shared handle to the current [`Snapshot`].
///
/// Readers take a snapshot with [`StoreHandle::load`], which is lock-free and
/// keeps that snapshot alive for as long as they hold it. Only the cache
/// update path calls [`StoreHandle::publish`].
#[derive(Clone)]
pub struct StoreHandle {
    current: Arc<ArcSwap<Snapshot>>,
}

impl StoreHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the served snapshot. In-flight requests finish on the old one.
    pub fn publish(&self, snapshot: Snapshot) {
        let indexes = snapshot.store.len();
        self.current.store(Arc::new(snapshot));
        info!(indexes, "published new store snapshot");
    }
}
