mod client;
mod models;

pub use client::{
    AssetDownload, MugenApi, MugenClient, DEFAULT_MUGEN_MEDIA_SERVER, DEFAULT_MUGEN_SERVER,
};
pub use models::{ExternalDatabaseIds, MugenKara, MugenTag};
