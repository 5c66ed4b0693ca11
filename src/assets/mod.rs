//! Binary assets: object storage, media validation and upstream transfer.

mod object_store;
mod probe;
mod sync;

pub use object_store::{FsObjectStore, ObjectReader, ObjectStat, ObjectStore};
pub use probe::{AcceptAllProbe, MediaProbe, SignatureProbe};
pub use sync::{
    AssetOutcome, AssetSyncReport, AssetSyncer, CHECKSUM_METADATA_KEY,
    DEFAULT_DOWNLOAD_CONCURRENCY,
};
