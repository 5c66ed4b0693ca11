//! Upstream asset transfer into object storage.
//!
//! An asset is downloaded only when the stored copy is stale: the video when
//! its size differs from the upstream size, the subtitles when the stored
//! checksum token differs from the upstream one. Either one also counts as
//! stale while the kara's upload flag for it is unset.

use super::object_store::ObjectStore;
use super::probe::MediaProbe;
use crate::catalog_store::{AssetKind, Kara, KaraStore, UpstreamImport};
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::mugen::{MugenApi, MugenKara};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// User metadata key holding the upstream subtitle checksum.
pub const CHECKSUM_METADATA_KEY: &str = "Mugenchecksum";

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// What happened to one asset kind during a sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetOutcome {
    UpToDate,
    Downloaded { bytes: u64 },
    /// Downloaded, but the media probe did not accept the file.
    Rejected { bytes: u64 },
    /// Upstream has no file of this kind.
    Skipped,
    Failed(String),
}

impl AssetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetOutcome::UpToDate => "up_to_date",
            AssetOutcome::Downloaded { .. } => "downloaded",
            AssetOutcome::Rejected { .. } => "rejected",
            AssetOutcome::Skipped => "skipped",
            AssetOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AssetOutcome::Failed(_) | AssetOutcome::Rejected { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSyncReport {
    pub kara_id: i64,
    pub video: AssetOutcome,
    pub subtitles: AssetOutcome,
}

pub struct AssetSyncer {
    store: Arc<dyn KaraStore>,
    mugen: Arc<dyn MugenApi>,
    objects: Arc<dyn ObjectStore>,
    probe: Arc<dyn MediaProbe>,
    downloads: Arc<Semaphore>,
    kara_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    /// Syncs started by [`AssetSyncer::spawn_sync`] and not yet awaited.
    pending: Mutex<JoinSet<()>>,
}

impl AssetSyncer {
    pub fn new(
        store: Arc<dyn KaraStore>,
        mugen: Arc<dyn MugenApi>,
        objects: Arc<dyn ObjectStore>,
        probe: Arc<dyn MediaProbe>,
        download_concurrency: usize,
    ) -> Self {
        Self {
            store,
            mugen,
            objects,
            probe,
            downloads: Arc::new(Semaphore::new(download_concurrency.max(1))),
            kara_locks: Mutex::new(HashMap::new()),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Runs [`Self::sync_import`] in the background. Failures are logged
    /// and never reach the caller.
    pub fn spawn_sync(self: &Arc<Self>, import: UpstreamImport) {
        let syncer = Arc::clone(self);
        let mut pending = self.pending.lock().unwrap();
        // Reap whatever already finished so the set does not grow unbounded.
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match syncer.sync_import(&import).await {
                Ok(report) => {
                    if report.video.is_failure() || report.subtitles.is_failure() {
                        warn!(
                            "Asset sync for kara {} incomplete: video {:?}, subtitles {:?}",
                            report.kara_id, report.video, report.subtitles
                        );
                    }
                }
                Err(e) => error!(
                    "Asset sync for kara {} ({}) failed: {}",
                    import.kara_id, import.upstream_id, e
                ),
            }
        });
    }

    /// Waits for every sync started by [`AssetSyncer::spawn_sync`] so far.
    pub async fn wait_pending(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().unwrap());
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                error!("Asset sync task panicked: {}", e);
            }
        }
    }

    /// Brings the video and subtitles of one imported kara up to date.
    ///
    /// The two kinds are handled independently: a failed video transfer
    /// does not prevent the subtitles from being refreshed. Errors fetching
    /// the upstream record or the local kara are returned.
    pub async fn sync_import(&self, import: &UpstreamImport) -> Result<AssetSyncReport> {
        let upstream = self.mugen.get_kara(import.upstream_id).await?;
        self.sync_with_upstream(import.kara_id, &upstream).await
    }

    /// Same as [`Self::sync_import`] with an upstream record the caller
    /// already fetched.
    pub async fn sync_with_upstream(
        &self,
        kara_id: i64,
        upstream: &MugenKara,
    ) -> Result<AssetSyncReport> {
        let guard = self.lock_kara(kara_id).await;
        let result = self.sync_locked(kara_id, upstream).await;
        drop(guard);
        self.release_kara(kara_id);

        result
    }

    async fn sync_locked(&self, kara_id: i64, upstream: &MugenKara) -> Result<AssetSyncReport> {
        let kara = self
            .store
            .get_kara(kara_id)?
            .ok_or_else(|| SyncError::NotFound(format!("kara {}", kara_id)))?;

        let video = self.finish(kara_id, AssetKind::Video, self.sync_video(&kara, upstream).await);
        let subtitles = self.finish(
            kara_id,
            AssetKind::Subtitles,
            self.sync_subtitles(&kara, upstream).await,
        );

        Ok(AssetSyncReport {
            kara_id,
            video,
            subtitles,
        })
    }

    fn finish(&self, kara_id: i64, kind: AssetKind, result: Result<AssetOutcome>) -> AssetOutcome {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to sync {:?} of kara {}: {}", kind, kara_id, e);
                AssetOutcome::Failed(e.to_string())
            }
        };
        metrics::record_asset_download(kind.directory(), outcome.as_str());
        outcome
    }

    async fn sync_video(&self, kara: &Kara, upstream: &MugenKara) -> Result<AssetOutcome> {
        if upstream.media_file.is_empty() {
            return Ok(AssetOutcome::Skipped);
        }

        let key = AssetKind::Video.object_key(kara.id);
        let stale = !kara.video_uploaded
            || match self.objects.stat(&key).await? {
                None => true,
                Some(stat) => stat.size != upstream.media_size,
            };
        if !stale {
            debug!("Video of kara {} is up to date", kara.id);
            return Ok(AssetOutcome::UpToDate);
        }

        let bytes = {
            let _permit = self
                .downloads
                .acquire()
                .await
                .map_err(|_| SyncError::Cancelled)?;
            let download = self.mugen.download_media(&upstream.media_file).await?;
            self.objects
                .put(&key, download.reader, HashMap::new())
                .await?
        };

        let valid = self.probe.probe(self.objects.as_ref(), &key).await?;
        self.store
            .set_asset_uploaded(kara.id, AssetKind::Video, valid)?;

        if valid {
            info!("Downloaded video of kara {} ({} bytes)", kara.id, bytes);
            Ok(AssetOutcome::Downloaded { bytes })
        } else {
            warn!("Video of kara {} was rejected by the media probe", kara.id);
            Ok(AssetOutcome::Rejected { bytes })
        }
    }

    async fn sync_subtitles(&self, kara: &Kara, upstream: &MugenKara) -> Result<AssetOutcome> {
        if upstream.sub_file.is_empty() {
            return Ok(AssetOutcome::Skipped);
        }

        let key = AssetKind::Subtitles.object_key(kara.id);
        let stale = !kara.subtitles_uploaded
            || match self.objects.stat(&key).await? {
                None => true,
                Some(stat) => {
                    stat.metadata.get(CHECKSUM_METADATA_KEY) != Some(&upstream.sub_checksum)
                }
            };
        if !stale {
            debug!("Subtitles of kara {} are up to date", kara.id);
            return Ok(AssetOutcome::UpToDate);
        }

        let bytes = {
            let _permit = self
                .downloads
                .acquire()
                .await
                .map_err(|_| SyncError::Cancelled)?;
            let download = self.mugen.download_lyrics(&upstream.sub_file).await?;
            let mut metadata = HashMap::new();
            metadata.insert(
                CHECKSUM_METADATA_KEY.to_string(),
                upstream.sub_checksum.clone(),
            );
            self.objects.put(&key, download.reader, metadata).await?
        };

        self.store
            .set_asset_uploaded(kara.id, AssetKind::Subtitles, true)?;
        info!("Downloaded subtitles of kara {} ({} bytes)", kara.id, bytes);
        Ok(AssetOutcome::Downloaded { bytes })
    }

    async fn lock_kara(&self, kara_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.kara_locks.lock().unwrap();
            Arc::clone(locks.entry(kara_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drops the lock entry once nobody else holds or waits on it.
    fn release_kara(&self, kara_id: i64) {
        let mut locks = self.kara_locks.lock().unwrap();
        if let Some(lock) = locks.get(&kara_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&kara_id);
            }
        }
    }
}
