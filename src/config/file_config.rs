use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub storage: Option<StorageConfig>,
    pub mugen: Option<MugenConfig>,
    pub dakara: Option<DakaraConfig>,
    pub sync: Option<SyncConfig>,
    pub taxonomy: Option<TaxonomyConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: Option<String>,
    pub assets_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MugenConfig {
    pub server: Option<String>,
    pub media_server: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DakaraConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub http_timeout_sec: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub refresh_interval_secs: Option<u64>,
    pub download_concurrency: Option<usize>,
}

/// Upstream tag IDs are given as UUID strings. Mapping tables are keyed by
/// local tag ID ("OP", "CONCERT", ...) and list upstream short codes or tag
/// UUIDs.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub video_game_tag: Option<String>,
    pub animation_tag: Option<String>,
    pub western_tag: Option<String>,
    pub cover_tag: Option<String>,
    pub video_tags: HashMap<String, Vec<String>>,
    pub audio_tags: HashMap<String, Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
