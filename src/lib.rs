//! Karaoke catalog synchronisation.
//!
//! Imports karas from the Kara.moe (Karaoke Mugen) catalog into a local
//! SQLite library, keeps their video and subtitle files in an object store,
//! and mirrors the publishable part of the library into a Dakara server.

pub mod assets;
pub mod background_jobs;
pub mod catalog_store;
pub mod config;
pub mod dakara;
pub mod error;
pub mod export;
pub mod import;
pub mod metrics;
pub mod mugen;
pub mod sqlite_persistence;
pub mod taxonomy;

// Re-export commonly used types for convenience
pub use catalog_store::{KaraStore, SqliteKaraStore};
pub use error::{Result, SyncError};
pub use export::ExportReconciler;
pub use import::ImportReconciler;
