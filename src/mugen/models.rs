//! Wire models for the upstream karaoke base.

use crate::taxonomy::UpstreamTagRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Upstream sends `null` for empty lists and maps on some records.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDatabaseIds {
    #[serde(default)]
    pub anilist: Option<i64>,
}

/// A tag of any upstream category (series, singer, song type, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MugenTag {
    pub tid: Uuid,
    pub name: String,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub i18n: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_database_ids: ExternalDatabaseIds,
}

impl MugenTag {
    pub fn tag_ref(&self) -> UpstreamTagRef<'_> {
        UpstreamTagRef {
            tid: self.tid,
            short: self.short.as_deref(),
        }
    }
}

/// One upstream kara with every tag bundle expanded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MugenKara {
    pub kid: Uuid,
    /// Titles keyed by language code.
    pub titles: BTreeMap<String, String>,
    #[serde(rename = "titles_aliases", deserialize_with = "null_as_default")]
    pub title_aliases: Vec<String>,
    #[serde(rename = "titles_default_language")]
    pub title_default_language: String,
    #[serde(rename = "mediafile")]
    pub media_file: String,
    #[serde(rename = "mediasize")]
    pub media_size: u64,
    #[serde(rename = "subfile")]
    pub sub_file: String,
    #[serde(rename = "subchecksum")]
    pub sub_checksum: String,
    pub duration: u32,
    #[serde(rename = "songorder")]
    pub song_order: Option<u32>,
    pub series: Vec<MugenTag>,
    pub singers: Vec<MugenTag>,
    #[serde(rename = "songtypes")]
    pub song_types: Vec<MugenTag>,
    pub creators: Vec<MugenTag>,
    #[serde(rename = "langs")]
    pub languages: Vec<MugenTag>,
    pub authors: Vec<MugenTag>,
    pub misc: Vec<MugenTag>,
    #[serde(rename = "songwriters")]
    pub song_writers: Vec<MugenTag>,
    pub families: Vec<MugenTag>,
    pub origins: Vec<MugenTag>,
    pub genres: Vec<MugenTag>,
    pub platforms: Vec<MugenTag>,
    pub versions: Vec<MugenTag>,
    pub warnings: Vec<MugenTag>,
    #[serde(rename = "Collections")]
    pub collections: Vec<MugenTag>,
    #[serde(rename = "singergroups")]
    pub singer_groups: Vec<MugenTag>,
    pub franchises: Vec<MugenTag>,
    pub comment: Option<String>,
}

impl MugenKara {
    /// Title in the default language, falling back to any title.
    pub fn default_title(&self) -> Option<&str> {
        self.titles
            .get(&self.title_default_language)
            .or_else(|| self.titles.values().next())
            .map(|s| s.as_str())
    }
}
