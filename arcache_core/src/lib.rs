pub mod archive;
pub mod codec;
pub mod error;
pub mod frame;
pub mod index;
pub mod manifest;
pub mod source;
pub mod store;
pub mod toc;

pub use archive::{Archive, Packed};
pub use codec::{Codec, CompressionType};
pub use error::{CacheError, Result};
pub use frame::{encode_frame, Frame, TrailerPolicy, FRAME_HEADER_SIZE, TRAILER_SIZE};
pub use index::Index;
pub use manifest::{Manifest, StoreBuilder};
pub use source::{ContentSource, DirectorySource, MemorySource};
pub use store::{IndexMetadata, Store, CONTROL_CHANNEL};
pub use toc::{TableOfContents, TocEntry};
