//! Full-catalog export sweep.
//!
//! Phases run in dependency order so that every remote entity a song refers
//! to exists before the song is written:
//!
//! 1. work types, one per local media category
//! 2. load publishable karas
//! 3. works for every referenced media
//! 4. artists
//! 5. tags
//! 6. songs, created or updated
//! 7. prune, best effort
//!
//! A failure in phases 1 to 6 aborts the sweep. Every phase is idempotent so
//! the next sweep simply starts over. Prune failures are only logged.

use super::snapshot::RemoteMirrorSnapshot;
use super::song_body::{build_song_body, parse_song_filename, song_body_changed};
use crate::catalog_store::{Kara, KaraStore};
use crate::dakara::{DakaraApi, DakaraArtistBody, DakaraTagBody, DakaraWorkBody, DakaraWorkType};
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::taxonomy::{AudioTag, MediaType, VideoTag};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Remote work type for a local media category.
pub fn work_type_for(media_type: MediaType) -> DakaraWorkType {
    DakaraWorkType {
        query_name: media_type.query_name(),
        name: media_type.name().to_string(),
        name_plural: format!("{}s", media_type.name()),
        icon_name: media_type.icon_name().to_string(),
    }
}

/// Counts of what one sweep did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub work_types_created: usize,
    pub publishable_karas: usize,
    pub works_created: usize,
    pub artists_created: usize,
    pub tags_created: usize,
    pub tags_updated: usize,
    pub songs_created: usize,
    pub songs_updated: usize,
    pub songs_deleted: usize,
    pub prune_errors: usize,
}

impl SweepReport {
    /// Creates and updates issued, deletes excluded.
    pub fn upserts(&self) -> usize {
        self.work_types_created
            + self.works_created
            + self.artists_created
            + self.tags_created
            + self.tags_updated
            + self.songs_created
            + self.songs_updated
    }
}

/// Runs `call` unless `cancel` fires first.
async fn guarded<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = call => result,
    }
}

pub struct ExportReconciler {
    store: Arc<dyn KaraStore>,
    dakara: Arc<dyn DakaraApi>,
    /// Held for the whole sweep; a second caller waits for the first.
    lock: Mutex<()>,
}

impl ExportReconciler {
    pub fn new(store: Arc<dyn KaraStore>, dakara: Arc<dyn DakaraApi>) -> Self {
        Self {
            store,
            dakara,
            lock: Mutex::new(()),
        }
    }

    /// Runs one full sweep. Concurrent callers are serialized.
    pub async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepReport> {
        let _guard = self.lock.lock().await;
        let started = Instant::now();
        info!("Starting export sweep");

        let result = self.run_phases(cancel).await;
        let outcome = match &result {
            Ok(report) => {
                info!(
                    "Export sweep done in {:.1}s: {} upserts, {} songs deleted",
                    started.elapsed().as_secs_f64(),
                    report.upserts(),
                    report.songs_deleted
                );
                "success"
            }
            Err(SyncError::Cancelled) => {
                info!("Export sweep cancelled");
                "cancelled"
            }
            Err(e) => {
                warn!("Export sweep aborted: {}", e);
                "failed"
            }
        };
        metrics::record_sweep(outcome, started.elapsed());
        result
    }

    async fn run_phases(&self, cancel: &CancellationToken) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut snapshot = RemoteMirrorSnapshot::new();

        self.sync_work_types(cancel, &mut snapshot, &mut report).await?;

        let karas = self.store.list_publishable_karas()?;
        report.publishable_karas = karas.len();
        metrics::set_publishable_karas(karas.len());
        info!("Exporting {} publishable karas", karas.len());

        self.sync_works(cancel, &karas, &mut snapshot, &mut report)
            .await?;
        self.sync_artists(cancel, &karas, &mut snapshot, &mut report)
            .await?;
        self.sync_tags(cancel, &mut snapshot, &mut report).await?;
        self.sync_songs(cancel, &karas, &mut snapshot, &mut report)
            .await?;
        self.prune(cancel, &karas, &snapshot, &mut report).await;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(report)
    }

    async fn sync_work_types(
        &self,
        cancel: &CancellationToken,
        snapshot: &mut RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) -> Result<()> {
        snapshot.set_work_types(guarded(cancel, self.dakara.list_work_types()).await?);

        for media_type in MediaType::ALL {
            if snapshot.has_work_type(media_type) {
                continue;
            }
            guarded(cancel, self.dakara.create_work_type(&work_type_for(media_type))).await?;
            metrics::record_dakara_write("work_type", "create");
            report.work_types_created += 1;
        }

        info!("Work types: {} created", report.work_types_created);
        Ok(())
    }

    async fn sync_works(
        &self,
        cancel: &CancellationToken,
        karas: &[Kara],
        snapshot: &mut RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) -> Result<()> {
        snapshot.set_works(guarded(cancel, self.dakara.list_works()).await?);

        let referenced: BTreeSet<(MediaType, &str)> = karas
            .iter()
            .flat_map(|k| k.source_media.iter().chain(k.medias.iter()))
            .map(|m| (m.media_type, m.name.as_str()))
            .collect();

        for (media_type, title) in referenced {
            if snapshot.work(media_type, title).is_some() {
                continue;
            }
            let body = DakaraWorkBody {
                title: title.to_string(),
                work_type: work_type_for(media_type),
            };
            guarded(cancel, self.dakara.create_work(&body)).await?;
            metrics::record_dakara_write("work", "create");
            report.works_created += 1;
        }

        info!("Works: {} created", report.works_created);
        Ok(())
    }

    async fn sync_artists(
        &self,
        cancel: &CancellationToken,
        karas: &[Kara],
        snapshot: &mut RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) -> Result<()> {
        snapshot.set_artists(guarded(cancel, self.dakara.list_artists()).await?);

        let referenced: BTreeSet<&str> = karas
            .iter()
            .flat_map(|k| k.artists.iter())
            .map(|a| a.name.as_str())
            .collect();

        for name in referenced {
            if snapshot.artist(name).is_some() {
                continue;
            }
            let body = DakaraArtistBody {
                name: name.to_string(),
            };
            guarded(cancel, self.dakara.create_artist(&body)).await?;
            metrics::record_dakara_write("artist", "create");
            report.artists_created += 1;
        }

        info!("Artists: {} created", report.artists_created);
        Ok(())
    }

    /// Mirrors every video tag and the audio tags that are not composition
    /// markers. Existing tags are rewritten only when their hue differs, so a
    /// sweep over an already mirrored catalog issues no tag writes at all.
    async fn sync_tags(
        &self,
        cancel: &CancellationToken,
        snapshot: &mut RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) -> Result<()> {
        snapshot.set_tags(guarded(cancel, self.dakara.list_tags()).await?);

        let local_tags = AudioTag::mirrored()
            .map(|t| (t.name(), t.hue()))
            .chain(VideoTag::ALL.iter().map(|t| (t.name(), t.hue())));

        for (name, hue) in local_tags {
            let body = DakaraTagBody {
                name: name.to_string(),
                color_hue: hue,
            };
            match snapshot.tag(name) {
                None => {
                    guarded(cancel, self.dakara.create_tag(&body)).await?;
                    metrics::record_dakara_write("tag", "create");
                    report.tags_created += 1;
                }
                Some(remote) if remote.color_hue != hue => {
                    guarded(cancel, self.dakara.update_tag(remote.id, &body)).await?;
                    metrics::record_dakara_write("tag", "update");
                    report.tags_updated += 1;
                }
                Some(_) => {}
            }
        }

        info!(
            "Tags: {} created, {} updated",
            report.tags_created, report.tags_updated
        );
        Ok(())
    }

    async fn sync_songs(
        &self,
        cancel: &CancellationToken,
        karas: &[Kara],
        snapshot: &mut RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) -> Result<()> {
        snapshot.set_songs(guarded(cancel, self.dakara.list_songs()).await?);

        // Earlier phases created entities; refresh the lookups to get their IDs
        snapshot.set_tags(guarded(cancel, self.dakara.list_tags()).await?);
        snapshot.set_artists(guarded(cancel, self.dakara.list_artists()).await?);
        snapshot.set_works(guarded(cancel, self.dakara.list_works()).await?);

        for kara in karas {
            let body = build_song_body(kara, snapshot)?;
            match snapshot.song(&body.filename) {
                None => {
                    guarded(cancel, self.dakara.create_song(&body)).await?;
                    metrics::record_dakara_write("song", "create");
                    report.songs_created += 1;
                }
                Some(remote) if song_body_changed(&body, remote) => {
                    debug!("Song {} changed, updating", body.filename);
                    guarded(cancel, self.dakara.update_song(remote.id, &body)).await?;
                    metrics::record_dakara_write("song", "update");
                    report.songs_updated += 1;
                }
                Some(_) => {}
            }
        }

        info!(
            "Songs: {} created, {} updated",
            report.songs_created, report.songs_updated
        );
        Ok(())
    }

    /// Deletes remote songs that do not belong to a publishable local kara,
    /// then asks the remote to drop unreferenced works and artists.
    ///
    /// Errors are logged and counted. The first failed song delete stops the
    /// song deletes but the work and artist prunes still run.
    async fn prune(
        &self,
        cancel: &CancellationToken,
        karas: &[Kara],
        snapshot: &RemoteMirrorSnapshot,
        report: &mut SweepReport,
    ) {
        let publishable: HashSet<i64> = karas.iter().map(|k| k.id).collect();

        let mut orphans: Vec<(i64, &str)> = snapshot
            .songs()
            .filter(|song| match parse_song_filename(&song.filename) {
                Some(kara_id) => !publishable.contains(&kara_id),
                None => true,
            })
            .map(|song| (song.id, song.filename.as_str()))
            .collect();
        orphans.sort_unstable();

        for (song_id, filename) in orphans {
            match guarded(cancel, self.dakara.delete_song(song_id)).await {
                Ok(()) => {
                    metrics::record_dakara_write("song", "delete");
                    report.songs_deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete remote song {} ({}): {}", song_id, filename, e);
                    report.prune_errors += 1;
                    break;
                }
            }
        }
        info!("Prune: {} songs deleted", report.songs_deleted);

        if let Err(e) = guarded(cancel, self.dakara.prune_works()).await {
            warn!("Failed to prune remote works: {}", e);
            report.prune_errors += 1;
        }
        if let Err(e) = guarded(cancel, self.dakara.prune_artists()).await {
            warn!("Failed to prune remote artists: {}", e);
            report.prune_errors += 1;
        }
    }
}
