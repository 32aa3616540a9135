use std::sync::Arc;

use arcache_codecs::{codec_for, unpack};
use arcache_core::{
    Archive, CacheError, CompressionType, Frame, Index, IndexMetadata, MemorySource, Store,
    TableOfContents, TrailerPolicy,
};
use arcache_server::{Dispatcher, Request, Snapshot, StoreHandle};

fn archive(index: u8, id: u8, compression: CompressionType, data: &[u8], revision: u32) -> Archive {
    Archive::new(index, id, compression, crc32fast::hash(data), revision)
}

/// Index 0: archive 1 (none, "abcxyz"), archive 2 (gzip). Index 1: archive 0 (bzip2).
fn dispatcher() -> (Dispatcher, MemorySource) {
    let gz_data = b"gzip me gzip me gzip me".repeat(50);
    let bz_data = b"bzip2 payload".repeat(30);

    let mut source = MemorySource::new();
    source.insert(0, 1, b"abcxyz".to_vec());
    source.insert(0, 2, gz_data.clone());
    source.insert(1, 0, bz_data.clone());

    let store = Store::new([
        Index::new(
            0,
            5,
            [
                archive(0, 1, CompressionType::None, b"abcxyz", 1),
                archive(0, 2, CompressionType::Gzip, &gz_data, 2),
            ],
        )
        .unwrap(),
        Index::new(1, 7, [archive(1, 0, CompressionType::Bzip2, &bz_data, 3)]).unwrap(),
    ])
    .unwrap();

    let handle = StoreHandle::new(Snapshot::new(store, Arc::new(source.clone())));
    (Dispatcher::new(handle, TrailerPolicy::ArchiveRevision), source)
}

fn fixed_crc_dispatcher() -> Dispatcher {
    let store = Store::new([
        Index::with_checksum(1, 0x2222, 7, []).unwrap(),
        Index::with_checksum(0, 0x1111, 5, []).unwrap(),
    ])
    .unwrap();
    let handle = StoreHandle::new(Snapshot::new(store, Arc::new(MemorySource::new())));
    Dispatcher::new(handle, TrailerPolicy::default())
}

#[test]
fn bulk_metadata_scenario() {
    let response = fixed_crc_dispatcher().dispatch(Request::new(255, 255)).unwrap();
    assert_eq!((response.channel, response.id), (255, 255));

    let frame = Frame::decode(&response.data).unwrap();
    assert_eq!(frame.compression, CompressionType::None);
    assert_eq!(frame.payload.len(), 8 * 2);
    assert_eq!(
        IndexMetadata::decode_all(frame.payload).unwrap(),
        vec![
            IndexMetadata { crc: 0x1111, revision: 5 },
            IndexMetadata { crc: 0x2222, revision: 7 },
        ]
    );
}

#[test]
fn bulk_metadata_matches_store() {
    let (dispatcher, _) = dispatcher();
    let response = dispatcher.dispatch(Request::new(255, 255)).unwrap();
    let entries = IndexMetadata::decode_all(&unpack(&response.data).unwrap()).unwrap();

    let snapshot = dispatcher.handle().load();
    let expected: Vec<IndexMetadata> = snapshot
        .store()
        .indexes()
        .map(|i| IndexMetadata {
            crc: i.crc(),
            revision: i.revision(),
        })
        .collect();
    assert_eq!(entries, expected);
}

#[test]
fn table_of_contents_request() {
    let (dispatcher, _) = dispatcher();
    let response = dispatcher.dispatch(Request::new(255, 0)).unwrap();
    assert_eq!((response.channel, response.id), (255, 0));

    let frame = Frame::decode(&response.data).unwrap();
    assert_eq!(frame.compression, CompressionType::None);
    assert_eq!(frame.trailer, None);

    let snapshot = dispatcher.handle().load();
    let index = snapshot.store().find_index(0).unwrap();
    assert_eq!(frame.payload, index.encode_table_of_contents());
    assert_eq!(crc32fast::hash(frame.payload), index.crc());

    let toc = TableOfContents::decode(frame.payload).unwrap();
    assert_eq!(toc.revision, 5);
    assert_eq!(toc.entries.iter().map(|e| e.archive).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn control_request_for_missing_index() {
    let (dispatcher, _) = dispatcher();
    assert!(matches!(
        dispatcher.dispatch(Request::new(255, 42)),
        Err(CacheError::IndexNotFound { index: 42 })
    ));
}

#[test]
fn none_archive_exact_bytes() {
    let (dispatcher, _) = dispatcher();
    let response = dispatcher.dispatch(Request::new(0, 1)).unwrap();
    assert_eq!(&response.data[..], b"\x00\x00\x00\x00\x06abcxyz");
}

#[test]
fn compressed_archives_decode() {
    let (dispatcher, source) = dispatcher();
    for (index, id, revision) in [(0u8, 2u8, 2u32), (1, 0, 3)] {
        let response = dispatcher.dispatch(Request::new(index, id)).unwrap();
        let frame = Frame::decode(&response.data).unwrap();
        assert_eq!(frame.trailer, Some(revision));

        let expected = arcache_core::ContentSource::load(&source, index, id).unwrap();
        let raw = codec_for(frame.compression).decompress(frame.payload).unwrap();
        assert_eq!(raw, expected);
    }
}

#[test]
fn missing_index_and_archive() {
    let (dispatcher, _) = dispatcher();
    assert!(matches!(
        dispatcher.dispatch(Request::new(7, 3)),
        Err(CacheError::IndexNotFound { index: 7 })
    ));
    assert!(matches!(
        dispatcher.dispatch(Request::new(0, 9)),
        Err(CacheError::ArchiveNotFound { index: 0, archive: 9 })
    ));
}

#[test]
fn missing_content_is_an_error_not_a_panic() {
    let index = Index::new(3, 0, [archive(3, 0, CompressionType::Gzip, b"", 0)]).unwrap();
    let store = Store::new([index]).unwrap();
    let handle = StoreHandle::new(Snapshot::new(store, Arc::new(MemorySource::new())));
    let dispatcher = Dispatcher::new(handle, TrailerPolicy::default());
    assert!(matches!(
        dispatcher.dispatch(Request::new(3, 0)),
        Err(CacheError::ContentUnavailable { index: 3, archive: 0, .. })
    ));
}

#[test]
fn identical_requests_are_byte_identical() {
    let (dispatcher, _) = dispatcher();
    for (channel, id) in [(255, 255), (255, 1), (0, 1), (0, 2), (1, 0)] {
        let request = Request::new(channel, id);
        let a = dispatcher.dispatch(request).unwrap();
        let b = dispatcher.dispatch(request).unwrap();
        assert_eq!(a, b, "{request:?}");
    }
}

#[test]
fn publish_switches_whole_snapshot() {
    let (dispatcher, _) = dispatcher();
    let before = dispatcher.dispatch(Request::new(255, 255)).unwrap();

    let mut source = MemorySource::new();
    source.insert(9, 0, b"new".to_vec());
    let index = Index::new(9, 1, [archive(9, 0, CompressionType::None, b"new", 1)]).unwrap();
    let store = Store::new([index]).unwrap();
    dispatcher.handle().publish(Snapshot::new(store, Arc::new(source)));

    let after = dispatcher.dispatch(Request::new(255, 255)).unwrap();
    assert_ne!(before.data, after.data);
    assert_eq!(unpack(&after.data).unwrap().len(), 8);
    assert_eq!(unpack(&dispatcher.dispatch(Request::new(9, 0)).unwrap().data).unwrap(), b"new");
    assert!(matches!(
        dispatcher.dispatch(Request::new(0, 1)),
        Err(CacheError::IndexNotFound { index: 0 })
    ));
}
