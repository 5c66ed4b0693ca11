mod file_config;

pub use file_config::{
    DakaraConfig, FileConfig, MugenConfig, StorageConfig, SyncConfig, TaxonomyConfig,
};

use crate::assets::DEFAULT_DOWNLOAD_CONCURRENCY;
use crate::mugen::{DEFAULT_MUGEN_MEDIA_SERVER, DEFAULT_MUGEN_SERVER};
use crate::taxonomy::{TaxonomyRegistry, UpstreamSentinels};
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use uuid::Uuid;

pub const DEFAULT_HTTP_TIMEOUT_SEC: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 3600;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub dakara_url: Option<String>,
    pub dakara_token: Option<String>,
    pub mugen_url: String,
    pub mugen_media_url: String,
    pub http_timeout_sec: u64,
    pub sweep_interval_secs: u64,
    pub download_concurrency: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            assets_dir: None,
            dakara_url: None,
            dakara_token: None,
            mugen_url: DEFAULT_MUGEN_SERVER.to_string(),
            mugen_media_url: DEFAULT_MUGEN_MEDIA_SERVER.to_string(),
            http_timeout_sec: DEFAULT_HTTP_TIMEOUT_SEC,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub assets_dir: PathBuf,
    pub http_timeout_sec: u64,
    pub mugen: MugenSettings,
    /// Present whenever a URL and token were configured; required for
    /// commands that export.
    pub dakara: Option<DakaraSettings>,
    pub sync: SyncSettings,
    pub taxonomy: TaxonomyRegistry,
}

#[derive(Debug, Clone)]
pub struct MugenSettings {
    pub server: String,
    pub media_server: String,
}

#[derive(Debug, Clone)]
pub struct DakaraSettings {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub sweep_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub download_concurrency: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    ///
    /// `require_dakara` makes a missing Dakara URL or token an error. The
    /// asset directory is created if it does not exist.
    pub fn resolve(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        require_dakara: bool,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let mugen = file.mugen.unwrap_or_default();
        let dakara = file.dakara.unwrap_or_default();
        let sync = file.sync.unwrap_or_default();

        let db_path = storage
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let assets_dir = storage
            .assets_dir
            .map(PathBuf::from)
            .or_else(|| cli.assets_dir.clone())
            .unwrap_or_else(|| {
                db_path
                    .parent()
                    .map(|dir| dir.join("assets"))
                    .unwrap_or_else(|| PathBuf::from("assets"))
            });
        std::fs::create_dir_all(&assets_dir)
            .with_context(|| format!("Failed to create assets directory: {:?}", assets_dir))?;

        let mugen = MugenSettings {
            server: mugen.server.unwrap_or_else(|| cli.mugen_url.clone()),
            media_server: mugen
                .media_server
                .unwrap_or_else(|| cli.mugen_media_url.clone()),
        };

        let dakara_url = dakara.url.or_else(|| cli.dakara_url.clone());
        let dakara_token = dakara.token.or_else(|| cli.dakara_token.clone());
        let dakara = match (dakara_url, dakara_token) {
            (Some(url), Some(token)) => Some(DakaraSettings { url, token }),
            (None, _) if require_dakara => {
                bail!("Dakara URL must be specified via --dakara-url or in config file")
            }
            (_, None) if require_dakara => {
                bail!("Dakara token must be specified via --dakara-token or in config file")
            }
            _ => None,
        };

        let http_timeout_sec = sync.http_timeout_sec.unwrap_or(cli.http_timeout_sec);
        let sync = SyncSettings {
            sweep_interval_secs: sync.sweep_interval_secs.unwrap_or(cli.sweep_interval_secs),
            refresh_interval_secs: sync
                .refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            download_concurrency: sync
                .download_concurrency
                .unwrap_or(cli.download_concurrency),
        };
        if sync.sweep_interval_secs == 0 || sync.refresh_interval_secs == 0 {
            bail!("Sync intervals must be greater than zero");
        }
        if sync.download_concurrency == 0 {
            bail!("download_concurrency must be greater than zero");
        }

        let taxonomy = resolve_taxonomy(file.taxonomy.unwrap_or_default())?;

        Ok(Self {
            db_path,
            assets_dir,
            http_timeout_sec,
            mugen,
            dakara,
            sync,
            taxonomy,
        })
    }

    pub fn dakara(&self) -> Result<&DakaraSettings> {
        self.dakara
            .as_ref()
            .ok_or_else(|| anyhow!("Dakara URL and token are not configured"))
    }
}

fn parse_tag_id(value: Option<String>, default: Uuid, field: &str) -> Result<Uuid> {
    match value {
        Some(s) => Uuid::parse_str(&s)
            .with_context(|| format!("Invalid taxonomy.{} {:?}", field, s)),
        None => Ok(default),
    }
}

fn resolve_taxonomy(config: TaxonomyConfig) -> Result<TaxonomyRegistry> {
    let defaults = UpstreamSentinels::default();
    let sentinels = UpstreamSentinels {
        video_game: parse_tag_id(config.video_game_tag, defaults.video_game, "video_game_tag")?,
        animation: parse_tag_id(config.animation_tag, defaults.animation, "animation_tag")?,
        western: parse_tag_id(config.western_tag, defaults.western, "western_tag")?,
        cover: parse_tag_id(config.cover_tag, defaults.cover, "cover_tag")?,
    };
    TaxonomyRegistry::with_overrides(sentinels, &config.video_tags, &config.audio_tags)
        .context("Invalid taxonomy mapping")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{UpstreamTagRef, VideoTag};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn cli_with_db(temp_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_path: Some(temp_dir.path().join("kara.db")),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            assets_dir: Some(temp_dir.path().join("media")),
            dakara_url: Some("http://dakara:8000/api".to_string()),
            dakara_token: Some("token".to_string()),
            sweep_interval_secs: 120,
            download_concurrency: 2,
            ..cli_with_db(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None, true).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("kara.db"));
        assert_eq!(config.assets_dir, temp_dir.path().join("media"));
        assert!(config.assets_dir.is_dir());
        assert_eq!(config.dakara().unwrap().url, "http://dakara:8000/api");
        assert_eq!(config.mugen.server, DEFAULT_MUGEN_SERVER);
        assert_eq!(config.sync.sweep_interval_secs, 120);
        assert_eq!(config.sync.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
        assert_eq!(config.sync.download_concurrency, 2);
        assert_eq!(config.http_timeout_sec, DEFAULT_HTTP_TIMEOUT_SEC);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            dakara_url: Some("http://cli/api".to_string()),
            dakara_token: Some("cli-token".to_string()),
            http_timeout_sec: 10,
            ..cli_with_db(&temp_dir)
        };

        let file_config = FileConfig {
            dakara: Some(DakaraConfig {
                url: Some("http://toml/api".to_string()),
                token: None,
            }),
            mugen: Some(MugenConfig {
                server: Some("http://mugen.local/api/".to_string()),
                media_server: None,
            }),
            sync: Some(SyncConfig {
                sweep_interval_secs: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config), true).unwrap();

        let dakara = config.dakara().unwrap();
        assert_eq!(dakara.url, "http://toml/api");
        // CLI value used when TOML doesn't specify
        assert_eq!(dakara.token, "cli-token");
        assert_eq!(config.mugen.server, "http://mugen.local/api/");
        assert_eq!(config.mugen.media_server, DEFAULT_MUGEN_MEDIA_SERVER);
        assert_eq!(config.sync.sweep_interval_secs, 60);
        assert_eq!(config.http_timeout_sec, 10);
    }

    #[test]
    fn test_assets_dir_defaults_next_to_db() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_db(&temp_dir), None, false).unwrap();
        assert_eq!(config.assets_dir, temp_dir.path().join("assets"));
        assert!(config.assets_dir.is_dir());
        assert!(config.dakara.is_none());
        assert!(config.dakara().is_err());
    }

    #[test]
    fn test_resolve_missing_db_path_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None, false);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_path must be specified"));
    }

    #[test]
    fn test_dakara_required_only_when_exporting() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            dakara_url: Some("http://dakara/api".to_string()),
            ..cli_with_db(&temp_dir)
        };

        assert!(AppConfig::resolve(&cli, None, false).is_ok());
        let err = AppConfig::resolve(&cli, None, true).unwrap_err();
        assert!(err.to_string().contains("Dakara token"));

        let err = AppConfig::resolve(&cli_with_db(&temp_dir), None, true).unwrap_err();
        assert!(err.to_string().contains("Dakara URL"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            download_concurrency: 0,
            ..cli_with_db(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None, false).is_err());
    }

    #[test]
    fn test_taxonomy_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let mut video_tags = HashMap::new();
        video_tags.insert("CONCERT".to_string(), vec!["CONCERT".to_string()]);
        let file_config = FileConfig {
            taxonomy: Some(TaxonomyConfig {
                cover_tag: Some("00000000-0000-0000-0000-000000000001".to_string()),
                video_tags,
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli_with_db(&temp_dir), Some(file_config), false).unwrap();

        assert_eq!(config.taxonomy.sentinels().cover, Uuid::from_u128(1));
        assert_eq!(
            config.taxonomy.sentinels().western,
            UpstreamSentinels::default().western
        );
        let concert = UpstreamTagRef {
            tid: Uuid::new_v4(),
            short: Some("CONCERT"),
        };
        assert_eq!(
            config.taxonomy.video_tags_for(&[concert]),
            vec![VideoTag::Concert]
        );
    }

    #[test]
    fn test_invalid_taxonomy_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            taxonomy: Some(TaxonomyConfig {
                western_tag: Some("not-a-uuid".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli_with_db(&temp_dir), Some(file_config), false).unwrap_err();
        assert!(err.to_string().contains("taxonomy.western_tag"));

        let mut audio_tags = HashMap::new();
        audio_tags.insert("NOPE".to_string(), vec![]);
        let file_config = FileConfig {
            taxonomy: Some(TaxonomyConfig {
                audio_tags,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_db(&temp_dir), Some(file_config), false).is_err());
    }
}
