//! Upstream vocabulary to local tag translation.
//!
//! The registry is built once from configuration and handed to the import
//! reconciler; nothing here is global.

use super::tags::{AudioTag, VideoTag};
use crate::error::Result;
use std::collections::HashMap;
use uuid::Uuid;

pub const VIDEO_GAME_TAG_ID: Uuid = Uuid::from_u128(0xdbedd6b3_d125_4cd8_aa32_c4175e4ca3a3);
pub const ANIMATION_TAG_ID: Uuid = Uuid::from_u128(0x0377db02_3af6_43b8_9b08_c759df3d25c3);
pub const WESTERN_TAG_ID: Uuid = Uuid::from_u128(0xefe171c0_e8a1_4d03_98c0_60ecf741ad52);
pub const COVER_VERSION_TAG_ID: Uuid = Uuid::from_u128(0x03e1e1d2_8641_47b7_bbcb_39a3df9ff21c);

/// Upstream tag IDs with a special meaning for classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamSentinels {
    /// Origin tag marking video games.
    pub video_game: Uuid,
    /// Origin tag marking animated works.
    pub animation: Uuid,
    /// Collection tag marking western productions.
    pub western: Uuid,
    /// Version tag marking covers, left out of the version string.
    pub cover: Uuid,
}

impl Default for UpstreamSentinels {
    fn default() -> Self {
        Self {
            video_game: VIDEO_GAME_TAG_ID,
            animation: ANIMATION_TAG_ID,
            western: WESTERN_TAG_ID,
            cover: COVER_VERSION_TAG_ID,
        }
    }
}

/// Borrowed view of an upstream tag, enough to match it against the table.
#[derive(Clone, Copy, Debug)]
pub struct UpstreamTagRef<'a> {
    pub tid: Uuid,
    pub short: Option<&'a str>,
}

impl UpstreamTagRef<'_> {
    /// A mapping key matches either the tag's stable ID or its short code.
    fn matches(&self, key: &str) -> bool {
        if let Ok(id) = Uuid::parse_str(key) {
            return id == self.tid;
        }
        self.short
            .map(|short| short.eq_ignore_ascii_case(key))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct TaxonomyRegistry {
    sentinels: UpstreamSentinels,
    video_mappings: Vec<(VideoTag, Vec<String>)>,
    audio_mappings: Vec<(AudioTag, Vec<String>)>,
}

fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for TaxonomyRegistry {
    fn default() -> Self {
        let video_mappings = vec![
            (VideoTag::Opening, keys(&["OP"])),
            (VideoTag::Ending, keys(&["ED"])),
            (VideoTag::Insert, keys(&["IN"])),
            (VideoTag::Fanmade, keys(&["AMV"])),
            (VideoTag::Stream, keys(&["STREAM"])),
            (VideoTag::Concert, keys(&["LIVE"])),
            (VideoTag::Advertisement, keys(&["CM"])),
            (VideoTag::Trailer, keys(&["PV"])),
        ];
        let audio_mappings = vec![
            (AudioTag::Opening, keys(&["OP"])),
            (AudioTag::Ending, keys(&["ED"])),
            (AudioTag::Insert, keys(&["IN"])),
            (AudioTag::ImageSong, keys(&["IS"])),
            (AudioTag::Live, keys(&["LIVE"])),
            (AudioTag::Cover, keys(&["CS"])),
        ];
        Self {
            sentinels: UpstreamSentinels::default(),
            video_mappings,
            audio_mappings,
        }
    }
}

impl TaxonomyRegistry {
    pub fn new(
        sentinels: UpstreamSentinels,
        video_mappings: Vec<(VideoTag, Vec<String>)>,
        audio_mappings: Vec<(AudioTag, Vec<String>)>,
    ) -> Self {
        Self {
            sentinels,
            video_mappings,
            audio_mappings,
        }
    }

    /// Default table with per-tag overrides, keyed by local tag ID.
    ///
    /// Unknown local tag IDs are rejected as validation errors.
    pub fn with_overrides(
        sentinels: UpstreamSentinels,
        video_overrides: &HashMap<String, Vec<String>>,
        audio_overrides: &HashMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut registry = TaxonomyRegistry {
            sentinels,
            ..TaxonomyRegistry::default()
        };

        for (tag_id, upstream_keys) in video_overrides {
            let tag: VideoTag = tag_id.parse()?;
            if let Some(entry) = registry.video_mappings.iter_mut().find(|(t, _)| *t == tag) {
                entry.1 = upstream_keys.clone();
            }
        }
        for (tag_id, upstream_keys) in audio_overrides {
            let tag: AudioTag = tag_id.parse()?;
            if let Some(entry) = registry.audio_mappings.iter_mut().find(|(t, _)| *t == tag) {
                entry.1 = upstream_keys.clone();
            }
        }

        Ok(registry)
    }

    pub fn sentinels(&self) -> &UpstreamSentinels {
        &self.sentinels
    }

    /// Local video tags for a set of upstream tags, deduplicated, in
    /// upstream order.
    pub fn video_tags_for(&self, upstream: &[UpstreamTagRef<'_>]) -> Vec<VideoTag> {
        let mut out = Vec::new();
        for tag in upstream {
            for (video_tag, mapped) in &self.video_mappings {
                if mapped.iter().any(|key| tag.matches(key)) && !out.contains(video_tag) {
                    out.push(*video_tag);
                }
            }
        }
        out
    }

    /// Local audio tags for a set of upstream tags, in local table order.
    pub fn audio_tags_for(&self, upstream: &[UpstreamTagRef<'_>]) -> Vec<AudioTag> {
        self.audio_mappings
            .iter()
            .filter(|(_, mapped)| {
                upstream
                    .iter()
                    .any(|tag| mapped.iter().any(|key| tag.matches(key)))
            })
            .map(|(audio_tag, _)| *audio_tag)
            .collect()
    }
}
