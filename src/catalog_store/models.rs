//! Local catalog models.
//!
//! Integer IDs are SQLite rowids. Tag lists hold members of the closed
//! taxonomy enums, so a kara read back from storage can never carry a tag
//! outside the fixed sets.

use crate::taxonomy::{AudioTag, MediaType, VideoTag};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A work (anime, game, show...) karas are taken from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub name: String,
    pub media_type: MediaType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingAuthor {
    pub id: i64,
    pub name: String,
    pub upstream_id: Option<Uuid>,
}

/// Which stored asset a flag or object refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Video,
    Subtitles,
    Instrumental,
}

impl AssetKind {
    /// Directory part of the object key.
    pub fn directory(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Subtitles => "sub",
            AssetKind::Instrumental => "inst",
        }
    }

    pub(crate) fn flag_column(&self) -> &'static str {
        match self {
            AssetKind::Video => "video_uploaded",
            AssetKind::Subtitles => "subtitles_uploaded",
            AssetKind::Instrumental => "instrumental_uploaded",
        }
    }

    /// Object key for this asset of `kara_id`.
    pub fn object_key(&self, kara_id: i64) -> String {
        format!("{}/{}", self.directory(), kara_id)
    }
}

/// A fully loaded kara with every association resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kara {
    pub id: i64,
    pub title: String,
    pub extra_titles: Vec<String>,
    pub version: String,
    pub language: String,
    pub comment: String,
    pub song_order: u32,
    /// Duration in seconds, 0 when unknown.
    pub duration: u32,
    pub video_tags: Vec<VideoTag>,
    pub audio_tags: Vec<AudioTag>,
    pub source_media: Option<Media>,
    pub medias: Vec<Media>,
    pub artists: Vec<Artist>,
    pub authors: Vec<TimingAuthor>,
    pub video_uploaded: bool,
    pub instrumental_uploaded: bool,
    pub subtitles_uploaded: bool,
    pub hardsub: bool,
    /// Edited locally; the upstream refresh leaves its metadata alone.
    pub edited: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Kara {
    /// Video present and either subtitles or burned-in subtitles.
    pub fn is_publishable(&self) -> bool {
        self.video_uploaded && (self.subtitles_uploaded || self.hardsub)
    }

    pub fn is_uploaded(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Video => self.video_uploaded,
            AssetKind::Subtitles => self.subtitles_uploaded,
            AssetKind::Instrumental => self.instrumental_uploaded,
        }
    }
}

/// Input for creating a kara. Associations are referenced by local ID.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewKara {
    pub title: String,
    pub extra_titles: Vec<String>,
    pub version: String,
    pub language: String,
    pub comment: String,
    pub song_order: u32,
    pub duration: u32,
    pub video_tags: Vec<VideoTag>,
    pub audio_tags: Vec<AudioTag>,
    pub source_media_id: Option<i64>,
    pub media_ids: Vec<i64>,
    pub artist_ids: Vec<i64>,
    pub author_ids: Vec<i64>,
    pub hardsub: bool,
}

/// Link between an upstream kara ID and the local kara created from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamImport {
    pub upstream_id: Uuid,
    pub kara_id: i64,
    pub imported_at: i64,
}
