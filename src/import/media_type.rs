//! Source media classification.

use crate::error::{Result, SyncError};
use crate::mugen::MugenTag;
use crate::taxonomy::{MediaType, UpstreamSentinels};

/// The upstream tags that decide what kind of media a series is.
#[derive(Clone, Copy, Debug)]
pub struct MediaTagBundle<'a> {
    pub series: &'a MugenTag,
    pub origins: &'a [MugenTag],
    pub collections: &'a [MugenTag],
}

/// Classifies one series. The first matching rule wins:
///
/// 1. an external database cross-reference means Anime
/// 2. a "video game" origin means Game
/// 3. an "animation" origin marks the series as animated
/// 4. animated with a "western" collection means Cartoon
/// 5. not animated means Live
///
/// An animated series that is not western has no local category and is
/// rejected as a validation error.
pub fn infer_media_type(
    bundle: &MediaTagBundle<'_>,
    sentinels: &UpstreamSentinels,
) -> Result<MediaType> {
    if bundle.series.external_database_ids.anilist.is_some() {
        return Ok(MediaType::Anime);
    }

    if bundle.origins.iter().any(|t| t.tid == sentinels.video_game) {
        return Ok(MediaType::Game);
    }

    let animated = bundle.origins.iter().any(|t| t.tid == sentinels.animation);

    if animated && bundle.collections.iter().any(|t| t.tid == sentinels.western) {
        return Ok(MediaType::Cartoon);
    }

    if !animated {
        return Ok(MediaType::Live);
    }

    Err(SyncError::validation(format!(
        "cannot classify media {} ({})",
        bundle.series.name, bundle.series.tid
    )))
}
