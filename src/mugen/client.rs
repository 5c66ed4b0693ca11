//! HTTP client for the upstream karaoke base (read-only).

use super::models::MugenKara;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_MUGEN_SERVER: &str = "https://kara.moe/api/";
pub const DEFAULT_MUGEN_MEDIA_SERVER: &str = "https://kara.moe/downloads/";

/// Streamed body of a downloaded asset.
pub struct AssetDownload {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for AssetDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetDownload")
            .field("content_length", &self.content_length)
            .finish()
    }
}

#[async_trait]
pub trait MugenApi: Send + Sync {
    /// Fetch one kara by upstream ID. A 404 maps to [`SyncError::NotFound`].
    async fn get_kara(&self, kid: Uuid) -> Result<MugenKara>;

    /// Stream a media file. Non-2xx responses are transport errors.
    async fn download_media(&self, media_file: &str) -> Result<AssetDownload>;

    /// Stream a subtitle file. Non-2xx responses are transport errors.
    async fn download_lyrics(&self, sub_file: &str) -> Result<AssetDownload>;
}

pub struct MugenClient {
    client: reqwest::Client,
    server: String,
    media_server: String,
    timeout: Duration,
}

impl MugenClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `server` - Base URL of the API (e.g. "https://kara.moe/api/")
    /// * `media_server` - Base URL media and lyrics files are served from
    /// * `timeout_sec` - Timeout for metadata requests. Downloads only get a
    ///   connect timeout since media files can be large.
    pub fn new(server: &str, media_server: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| SyncError::transport("build mugen client", e))?;

        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            media_server: media_server.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_sec),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn download(&self, url: String, what: &str) -> Result<AssetDownload> {
        debug!("Downloading {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("download {}", what), e))?;

        if !response.status().is_success() {
            return Err(SyncError::http_status(
                format!("download {}", what),
                response.status(),
            ));
        }

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(AssetDownload {
            reader: Box::pin(StreamReader::new(stream)),
            content_length,
        })
    }
}

#[async_trait]
impl MugenApi for MugenClient {
    async fn get_kara(&self, kid: Uuid) -> Result<MugenKara> {
        let url = format!("{}/karas/{}/", self.server, kid);
        let context = format!("fetch upstream kara {}", kid);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::transport(context.as_str(), e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(SyncError::NotFound(format!("upstream kara {}", kid)));
            }
            status => return Err(SyncError::http_status(context, status)),
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport(context.as_str(), e))?;
        serde_json::from_slice(&body).map_err(|e| SyncError::decode(context, e))
    }

    async fn download_media(&self, media_file: &str) -> Result<AssetDownload> {
        let url = format!(
            "{}/medias/{}",
            self.media_server,
            urlencoding::encode(media_file)
        );
        self.download(url, media_file).await
    }

    async fn download_lyrics(&self, sub_file: &str) -> Result<AssetDownload> {
        let url = format!(
            "{}/lyrics/{}",
            self.media_server,
            urlencoding::encode(sub_file)
        );
        self.download(url, sub_file).await
    }
}
