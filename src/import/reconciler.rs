//! Inbound import of one upstream kara.

use super::media_type::{infer_media_type, MediaTagBundle};
use crate::assets::{AssetOutcome, AssetSyncReport, AssetSyncer};
use crate::catalog_store::{CatalogTransaction, KaraStore, NewKara, UpstreamImport};
use crate::error::{Result, SyncError};
use crate::metrics;
use crate::mugen::{MugenApi, MugenKara, MugenTag};
use crate::taxonomy::{MediaType, TaxonomyRegistry, UpstreamTagRef};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new kara was created and its asset sync started.
    Imported(UpstreamImport),
    /// The upstream ID was already linked; nothing was written.
    AlreadyImported(UpstreamImport),
}

impl ImportOutcome {
    pub fn link(&self) -> &UpstreamImport {
        match self {
            ImportOutcome::Imported(link) | ImportOutcome::AlreadyImported(link) => link,
        }
    }
}

/// Result of refreshing one imported kara.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The linked kara no longer exists; nothing was fetched.
    Missing,
    Refreshed {
        /// False when the kara was edited locally and kept its metadata.
        metadata_updated: bool,
        assets: AssetSyncReport,
    },
}

/// Totals of one [`ImportReconciler::refresh_all`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub total: usize,
    pub metadata_updated: usize,
    pub edited: usize,
    pub missing: usize,
    pub downloaded: usize,
    pub up_to_date: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq)]
struct ArtistRef {
    name: String,
    aliases: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
struct AuthorRef {
    name: String,
    upstream_id: Uuid,
}

/// Everything needed to write one kara, computed before the transaction
/// opens so that classification failures never touch storage.
#[derive(Clone, Debug, PartialEq)]
struct ImportPlan {
    kara: NewKara,
    source_media: Option<(String, MediaType)>,
    medias: Vec<(String, MediaType)>,
    artists: Vec<ArtistRef>,
    authors: Vec<AuthorRef>,
}

pub struct ImportReconciler {
    store: Arc<dyn KaraStore>,
    mugen: Arc<dyn MugenApi>,
    taxonomy: Arc<TaxonomyRegistry>,
    assets: Arc<AssetSyncer>,
}

impl ImportReconciler {
    pub fn new(
        store: Arc<dyn KaraStore>,
        mugen: Arc<dyn MugenApi>,
        taxonomy: Arc<TaxonomyRegistry>,
        assets: Arc<AssetSyncer>,
    ) -> Self {
        Self {
            store,
            mugen,
            taxonomy,
            assets,
        }
    }

    /// Imports one upstream kara.
    ///
    /// The kara, its new media/artists/authors and the upstream link are
    /// written in a single transaction. Asset sync starts only after the
    /// commit and runs detached.
    pub async fn import(&self, kid: Uuid) -> Result<ImportOutcome> {
        if let Some(existing) = self.store.get_import(kid)? {
            info!("Upstream kara {} already imported as {}", kid, existing.kara_id);
            metrics::record_import("already_imported");
            return Ok(ImportOutcome::AlreadyImported(existing));
        }

        let result = self.import_new(kid).await;
        match &result {
            Ok(_) => metrics::record_import("imported"),
            Err(e) => {
                warn!("Import of upstream kara {} failed: {}", kid, e);
                metrics::record_import(e.kind());
            }
        }
        let link = result?;

        self.assets.spawn_sync(link.clone());
        Ok(ImportOutcome::Imported(link))
    }

    async fn import_new(&self, kid: Uuid) -> Result<UpstreamImport> {
        let upstream = self.mugen.get_kara(kid).await?;
        let plan = build_plan(&upstream, &self.taxonomy)?;

        let mut link = None;
        self.store.run_in_transaction(&mut |tx| {
            let kara = resolve_plan(tx, &plan)?;
            let kara_id = tx.create_kara(&kara)?;
            link = Some(tx.create_import(kid, kara_id)?);
            Ok(())
        })?;

        let link = link.ok_or_else(|| SyncError::NotFound(format!("import of {}", kid)))?;
        info!("Imported upstream kara {} as kara {}", kid, link.kara_id);
        Ok(link)
    }

    /// Re-fetches the upstream record of one imported kara, rewrites its
    /// metadata in a single transaction and brings its assets up to date.
    ///
    /// A kara edited locally keeps its metadata; its assets are still
    /// synced.
    pub async fn refresh(&self, link: &UpstreamImport) -> Result<RefreshOutcome> {
        let Some(kara) = self.store.get_kara(link.kara_id)? else {
            info!(
                "Not refreshing {}: kara {} no longer exists",
                link.upstream_id, link.kara_id
            );
            return Ok(RefreshOutcome::Missing);
        };

        let upstream = self.mugen.get_kara(link.upstream_id).await?;
        let metadata_updated = if kara.edited {
            info!("Not updating kara {}: edited locally", kara.id);
            false
        } else {
            let plan = build_plan(&upstream, &self.taxonomy)?;
            self.store.run_in_transaction(&mut |tx| {
                let new_kara = resolve_plan(tx, &plan)?;
                tx.update_kara(kara.id, &new_kara)
            })?;
            debug!("Updated kara {} from upstream {}", kara.id, link.upstream_id);
            true
        };

        let assets = self.assets.sync_with_upstream(kara.id, &upstream).await?;
        Ok(RefreshOutcome::Refreshed {
            metadata_updated,
            assets,
        })
    }

    /// Refreshes every imported kara in turn.
    ///
    /// Per-kara failures are logged and counted; the walk continues.
    pub async fn refresh_all(&self, cancel: &CancellationToken) -> Result<RefreshSummary> {
        let imports = self.store.list_imports()?;
        let mut summary = RefreshSummary {
            total: imports.len(),
            ..Default::default()
        };
        info!("Refreshing {} imported karas", imports.len());

        for link in &imports {
            if cancel.is_cancelled() {
                info!("Upstream refresh cancelled");
                return Err(SyncError::Cancelled);
            }

            match self.refresh(link).await {
                Ok(RefreshOutcome::Missing) => {
                    metrics::record_refresh("missing");
                    summary.missing += 1;
                }
                Ok(RefreshOutcome::Refreshed {
                    metadata_updated,
                    assets,
                }) => {
                    if metadata_updated {
                        metrics::record_refresh("updated");
                        summary.metadata_updated += 1;
                    } else {
                        metrics::record_refresh("edited");
                        summary.edited += 1;
                    }
                    let outcomes = [&assets.video, &assets.subtitles];
                    if outcomes.iter().any(|o| o.is_failure()) {
                        summary.failed += 1;
                    } else if outcomes
                        .iter()
                        .any(|o| matches!(o, AssetOutcome::Downloaded { .. }))
                    {
                        summary.downloaded += 1;
                    } else {
                        summary.up_to_date += 1;
                    }
                }
                Err(e) => {
                    error!(
                        "Refresh of kara {} ({}) failed: {}",
                        link.kara_id, link.upstream_id, e
                    );
                    metrics::record_refresh(e.kind());
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Upstream refresh done: {} updated, {} edited, {} missing, {} downloaded, {} up to date, {} failed",
            summary.metadata_updated,
            summary.edited,
            summary.missing,
            summary.downloaded,
            summary.up_to_date,
            summary.failed
        );
        Ok(summary)
    }
}

/// Finds or creates the media, artists and authors of `plan` and returns
/// the kara with their IDs filled in.
fn resolve_plan(tx: &dyn CatalogTransaction, plan: &ImportPlan) -> Result<NewKara> {
    let mut kara = plan.kara.clone();

    if let Some((name, media_type)) = &plan.source_media {
        kara.source_media_id = Some(tx.find_or_create_media(name, *media_type)?.id);
    }
    for (name, media_type) in &plan.medias {
        let id = tx.find_or_create_media(name, *media_type)?.id;
        if !kara.media_ids.contains(&id) {
            kara.media_ids.push(id);
        }
    }

    for artist in &plan.artists {
        let mut names: Vec<&str> = vec![artist.name.as_str()];
        names.extend(artist.aliases.iter().map(|a| a.as_str()));
        let id = match tx.find_artist(&names)? {
            Some(found) => found.id,
            None => tx.create_artist(&artist.name, &artist.aliases)?.id,
        };
        if !kara.artist_ids.contains(&id) {
            kara.artist_ids.push(id);
        }
    }

    for author in &plan.authors {
        let id = match tx.find_timing_author(Some(author.upstream_id), &author.name)? {
            Some(found) => found.id,
            None => {
                tx.create_timing_author(&author.name, Some(author.upstream_id))?
                    .id
            }
        };
        if !kara.author_ids.contains(&id) {
            kara.author_ids.push(id);
        }
    }

    Ok(kara)
}

fn classify(
    series: &MugenTag,
    upstream: &MugenKara,
    taxonomy: &TaxonomyRegistry,
) -> Result<(String, MediaType)> {
    let bundle = MediaTagBundle {
        series,
        origins: &upstream.origins,
        collections: &upstream.collections,
    };
    let media_type = infer_media_type(&bundle, taxonomy.sentinels())?;
    Ok((series.name.clone(), media_type))
}

fn build_plan(upstream: &MugenKara, taxonomy: &TaxonomyRegistry) -> Result<ImportPlan> {
    let title = upstream
        .titles
        .get(&upstream.title_default_language)
        .cloned()
        .ok_or_else(|| {
            SyncError::validation(format!(
                "upstream kara {} has no title in its default language {:?}",
                upstream.kid, upstream.title_default_language
            ))
        })?;

    let mut extra_titles: Vec<String> = Vec::new();
    let other_titles = upstream
        .titles
        .iter()
        .filter(|(lang, _)| **lang != upstream.title_default_language)
        .map(|(_, t)| t);
    for candidate in other_titles.chain(upstream.title_aliases.iter()) {
        if *candidate != title && !extra_titles.contains(candidate) {
            extra_titles.push(candidate.clone());
        }
    }

    let tag_refs: Vec<UpstreamTagRef<'_>> = upstream
        .song_types
        .iter()
        .chain(upstream.warnings.iter())
        .map(|t| t.tag_ref())
        .collect();
    let video_tags = taxonomy.video_tags_for(&tag_refs);
    let audio_tags = taxonomy.audio_tags_for(&tag_refs);
    debug!(
        "Upstream kara {}: video tags {:?}, audio tags {:?}",
        upstream.kid, video_tags, audio_tags
    );

    let cover = taxonomy.sentinels().cover;
    let version = upstream
        .versions
        .iter()
        .filter(|v| v.tid != cover)
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let language = match upstream.languages.as_slice() {
        [only] => only.name.clone(),
        _ => String::new(),
    };

    // A single series is the source media; several are only associated.
    let (source_media, medias) = match upstream.series.as_slice() {
        [] => (None, vec![]),
        [series] => (Some(classify(series, upstream, taxonomy)?), vec![]),
        many => (
            None,
            many.iter()
                .map(|s| classify(s, upstream, taxonomy))
                .collect::<Result<Vec<_>>>()?,
        ),
    };

    let artists = upstream
        .singer_groups
        .iter()
        .chain(upstream.singers.iter())
        .chain(upstream.song_writers.iter())
        .map(|t| ArtistRef {
            name: t.name.clone(),
            aliases: t.aliases.clone(),
        })
        .collect();

    let authors = upstream
        .authors
        .iter()
        .map(|t| AuthorRef {
            name: t.name.clone(),
            upstream_id: t.tid,
        })
        .collect();

    Ok(ImportPlan {
        kara: NewKara {
            title,
            extra_titles,
            version,
            language,
            comment: upstream.comment.clone().unwrap_or_default(),
            song_order: upstream.song_order.unwrap_or(0),
            duration: upstream.duration,
            video_tags,
            audio_tags,
            ..Default::default()
        },
        source_media,
        medias,
        artists,
        authors,
    })
}
