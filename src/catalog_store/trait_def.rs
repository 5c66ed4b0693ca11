//! KaraStore trait definition.
//!
//! The import and export paths only talk to storage through these traits, so
//! tests can swap in an in-memory store or a temporary SQLite file.

use super::models::*;
use crate::error::Result;
use crate::taxonomy::MediaType;
use uuid::Uuid;

/// Operations available inside one storage transaction.
///
/// Lookups see rows created earlier in the same transaction. Nothing is
/// visible to other callers until the transaction commits.
pub trait CatalogTransaction {
    /// Returns the media with this (name, type), creating it if absent.
    fn find_or_create_media(&self, name: &str, media_type: MediaType) -> Result<Media>;

    /// First artist whose name or one of whose aliases equals one of `names`.
    fn find_artist(&self, names: &[&str]) -> Result<Option<Artist>>;

    fn create_artist(&self, name: &str, aliases: &[String]) -> Result<Artist>;

    /// Looks up a timing author by upstream ID first, then by exact name.
    fn find_timing_author(&self, upstream_id: Option<Uuid>, name: &str)
        -> Result<Option<TimingAuthor>>;

    fn create_timing_author(&self, name: &str, upstream_id: Option<Uuid>) -> Result<TimingAuthor>;

    /// Inserts a kara and all of its associations, returning the new ID.
    fn create_kara(&self, kara: &NewKara) -> Result<i64>;

    /// Rewrites the metadata and associations of an existing kara. Upload
    /// flags, hardsub and the edited marker are kept.
    fn update_kara(&self, kara_id: i64, kara: &NewKara) -> Result<()>;

    fn find_import(&self, upstream_id: Uuid) -> Result<Option<UpstreamImport>>;

    /// Fails with a conflict if `upstream_id` is already linked.
    fn create_import(&self, upstream_id: Uuid, kara_id: i64) -> Result<UpstreamImport>;
}

/// Trait for kara storage backends.
pub trait KaraStore: Send + Sync {
    /// Runs `f` inside one transaction. Any error returned by `f` rolls back
    /// everything it wrote.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn CatalogTransaction) -> Result<()>,
    ) -> Result<()>;

    /// Get a kara with every association loaded.
    fn get_kara(&self, id: i64) -> Result<Option<Kara>>;

    /// Every kara with video uploaded and either subtitles uploaded or
    /// hardsubbed, fully loaded, ordered by ID.
    fn list_publishable_karas(&self) -> Result<Vec<Kara>>;

    /// Sets one of the upload-completion flags.
    fn set_asset_uploaded(&self, kara_id: i64, kind: AssetKind, uploaded: bool) -> Result<()>;

    fn set_hardsub(&self, kara_id: i64, hardsub: bool) -> Result<()>;

    /// Marks a kara as edited locally, which excludes it from metadata refresh.
    fn set_edited(&self, kara_id: i64, edited: bool) -> Result<()>;

    fn get_import(&self, upstream_id: Uuid) -> Result<Option<UpstreamImport>>;

    fn list_imports(&self) -> Result<Vec<UpstreamImport>>;

    fn get_karas_count(&self) -> usize;
}
