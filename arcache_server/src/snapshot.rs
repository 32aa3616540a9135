//! Building snapshots from disk: the cache-update side of the server.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use arcache_codecs::codec_for;
use arcache_core::{DirectorySource, Index, Manifest, Result, Store, StoreBuilder, TrailerPolicy};
use tracing::{error, info};

use crate::handle::{Snapshot, StoreHandle};

/// Build a snapshot from `<root>/manifest.json` and the archive files under
/// `root`. With `preload`, every archive is packed now and served from memory.
pub fn load_snapshot(
    root: &Path,
    preload: bool,
    trailer: TrailerPolicy,
) -> anyhow::Result<Snapshot> {
    let t0 = Instant::now();
    let source = DirectorySource::new(root);
    let manifest =
        Manifest::load(root).with_context(|| format!("loading manifest from {:?}", root))?;
    let mut store = StoreBuilder::new(&source)
        .build(&manifest)
        .with_context(|| format!("building store from {:?}", root))?;

    if preload {
        store = preload_store(&store, &source, trailer).context("preloading archives")?;
    }

    info!(
        root = %root.display(),
        indexes = store.len(),
        preload,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "loaded store snapshot"
    );
    Ok(Snapshot::new(store, Arc::new(source)))
}

/// Copy of `store` in which every archive carries its packed frame.
///
/// Index checksums are unchanged: the table of contents does not depend on
/// whether frames are cached.
pub fn preload_store(
    store: &Store,
    source: &DirectorySource,
    trailer: TrailerPolicy,
) -> Result<Store> {
    let mut indexes = Vec::with_capacity(store.len());
    for index in store.indexes() {
        let mut archives = Vec::with_capacity(index.len());
        for archive in index.archives() {
            let codec = codec_for(archive.compression());
            let framed = archive.packed_bytes(source, codec.as_ref(), trailer)?;
            archives.push(archive.clone().with_packed(framed)?);
        }
        indexes.push(Index::with_checksum(index.id(), index.crc(), index.revision(), archives)?);
    }
    Store::new(indexes)
}

/// Rebuild from disk and publish. On failure the current snapshot stays.
pub fn reload(
    handle: &StoreHandle,
    root: &Path,
    preload: bool,
    trailer: TrailerPolicy,
) -> anyhow::Result<()> {
    match load_snapshot(root, preload, trailer) {
        Ok(snapshot) => {
            handle.publish(snapshot);
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "reload failed; keeping current snapshot");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcache_core::Packed;

    fn write_root(root: &Path, archive_revision: u32) {
        std::fs::create_dir_all(root.join("0")).unwrap();
        std::fs::write(root.join("0").join("1"), b"hello hello hello").unwrap();
        std::fs::write(
            root.join("manifest.json"),
            format!(
                r#"{{ "indexes": [ {{ "id": 0, "revision": 4, "archives": [
                    {{ "id": 1, "revision": {archive_revision}, "compression": "gzip" }} ] }} ] }}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn preload_caches_frames_and_keeps_crc() {
        let dir = tempfile::tempdir().unwrap();
        write_root(dir.path(), 3);

        let lazy = load_snapshot(dir.path(), false, TrailerPolicy::default()).unwrap();
        let eager = load_snapshot(dir.path(), true, TrailerPolicy::default()).unwrap();

        let lazy_index = lazy.store().find_index(0).unwrap();
        let eager_index = eager.store().find_index(0).unwrap();
        assert_eq!(lazy_index.crc(), eager_index.crc());
        eager.store().verify().unwrap();

        assert!(matches!(lazy_index.get_archive(1).unwrap().packed(), Packed::NeedsCompute));
        assert!(matches!(eager_index.get_archive(1).unwrap().packed(), Packed::Fresh(_)));
    }

    #[test]
    fn failed_reload_keeps_current_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_root(dir.path(), 3);
        let snapshot = load_snapshot(dir.path(), false, TrailerPolicy::default()).unwrap();
        let handle = StoreHandle::new(snapshot);
        let crc = handle.load().store().find_index(0).unwrap().crc();

        std::fs::write(dir.path().join("manifest.json"), "not json").unwrap();
        assert!(reload(&handle, dir.path(), false, TrailerPolicy::default()).is_err());
        assert_eq!(handle.load().store().find_index(0).unwrap().crc(), crc);

        write_root(dir.path(), 8);
        reload(&handle, dir.path(), false, TrailerPolicy::default()).unwrap();
        assert_ne!(handle.load().store().find_index(0).unwrap().crc(), crc);
    }
}
