//! HTTP client for the downstream karaoke library (read-write).

use super::models::*;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const ARTISTS_PATH: &str = "/api/library/artists/";
const WORK_TYPES_PATH: &str = "/api/library/work-types/";
const WORKS_PATH: &str = "/api/library/works/";
const TAGS_PATH: &str = "/api/library/song-tags/";
const SONGS_PATH: &str = "/api/library/songs/";

/// Operations the export sweep needs from the downstream library.
///
/// `list_*` calls return the whole collection, following pagination.
#[async_trait]
pub trait DakaraApi: Send + Sync {
    async fn list_work_types(&self) -> Result<Vec<DakaraWorkType>>;
    async fn create_work_type(&self, work_type: &DakaraWorkType) -> Result<()>;

    async fn list_works(&self) -> Result<Vec<DakaraWork>>;
    async fn create_work(&self, work: &DakaraWorkBody) -> Result<()>;
    /// Deletes every work no song references.
    async fn prune_works(&self) -> Result<()>;

    async fn list_artists(&self) -> Result<Vec<DakaraArtist>>;
    async fn create_artist(&self, artist: &DakaraArtistBody) -> Result<()>;
    /// Deletes every artist no song references.
    async fn prune_artists(&self) -> Result<()>;

    async fn list_tags(&self) -> Result<Vec<DakaraTag>>;
    async fn create_tag(&self, tag: &DakaraTagBody) -> Result<()>;
    async fn update_tag(&self, id: i64, tag: &DakaraTagBody) -> Result<()>;

    async fn list_songs(&self) -> Result<Vec<DakaraSong>>;
    async fn create_song(&self, song: &DakaraSongBody) -> Result<()>;
    async fn update_song(&self, id: i64, song: &DakaraSongBody) -> Result<()>;
    async fn delete_song(&self, id: i64) -> Result<()>;
}

pub struct DakaraClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl DakaraClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Root URL of the server (e.g. "https://dakara.example.org")
    /// * `token` - API token sent as `Authorization: Token <token>`
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: &str, token: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| SyncError::transport("build dakara client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let context = format!("{} {}", method, path);

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Token {}", self.token))
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(context.as_str(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        warn!("dakara responded to {} with {}: {}", context, status, text);
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(context));
        }
        Err(SyncError::http_status(context, status))
    }

    async fn write<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> Result<()> {
        self.send(method, path, &[], Some(body)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    /// Fetch one page of a collection.
    pub async fn fetch_page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Page<T>> {
        let response = self
            .send::<()>(Method::GET, path, &[("page", page.to_string())], None)
            .await?;
        let context = format!("GET {} page {}", path, page);
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport(context.as_str(), e))?;
        let parsed: PaginatedResponse<T> =
            serde_json::from_slice(&body).map_err(|e| SyncError::decode(context, e))?;
        Ok(parsed.into())
    }

    /// Fetch every page of a collection, starting at page 1 and continuing
    /// while the current page is before the last one.
    ///
    /// A server answering with a different page than the one requested is
    /// reported as a decode error rather than followed.
    pub async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut page_number = 1;
        let mut results = Vec::new();
        loop {
            let page: Page<T> = self.fetch_page(path, page_number).await?;
            if page.current_page != page_number {
                return Err(SyncError::decode(
                    format!("GET {} page {}", path, page_number),
                    format!("server answered with page {}", page.current_page),
                ));
            }
            let has_next = page.has_next();
            results.extend(page.results);
            if !has_next {
                break;
            }
            page_number += 1;
        }
        debug!("Fetched {} items from {}", results.len(), path);
        Ok(results)
    }
}

fn song_path(id: i64) -> String {
    format!("{}{}/", SONGS_PATH, id)
}

#[async_trait]
impl DakaraApi for DakaraClient {
    async fn list_work_types(&self) -> Result<Vec<DakaraWorkType>> {
        self.fetch_all(WORK_TYPES_PATH).await
    }

    async fn create_work_type(&self, work_type: &DakaraWorkType) -> Result<()> {
        self.write(Method::POST, WORK_TYPES_PATH, work_type).await
    }

    async fn list_works(&self) -> Result<Vec<DakaraWork>> {
        self.fetch_all(WORKS_PATH).await
    }

    async fn create_work(&self, work: &DakaraWorkBody) -> Result<()> {
        self.write(Method::POST, WORKS_PATH, work).await
    }

    async fn prune_works(&self) -> Result<()> {
        self.delete(&format!("{}prune/", WORKS_PATH)).await
    }

    async fn list_artists(&self) -> Result<Vec<DakaraArtist>> {
        self.fetch_all(ARTISTS_PATH).await
    }

    async fn create_artist(&self, artist: &DakaraArtistBody) -> Result<()> {
        self.write(Method::POST, ARTISTS_PATH, artist).await
    }

    async fn prune_artists(&self) -> Result<()> {
        self.delete(&format!("{}prune/", ARTISTS_PATH)).await
    }

    async fn list_tags(&self) -> Result<Vec<DakaraTag>> {
        self.fetch_all(TAGS_PATH).await
    }

    async fn create_tag(&self, tag: &DakaraTagBody) -> Result<()> {
        self.write(Method::POST, TAGS_PATH, tag).await
    }

    async fn update_tag(&self, id: i64, tag: &DakaraTagBody) -> Result<()> {
        self.write(Method::PUT, &format!("{}{}/", TAGS_PATH, id), tag)
            .await
    }

    async fn list_songs(&self) -> Result<Vec<DakaraSong>> {
        self.fetch_all(SONGS_PATH).await
    }

    async fn create_song(&self, song: &DakaraSongBody) -> Result<()> {
        self.write(Method::POST, SONGS_PATH, song).await
    }

    async fn update_song(&self, id: i64, song: &DakaraSongBody) -> Result<()> {
        self.write(Method::PUT, &song_path(id), song).await
    }

    async fn delete_song(&self, id: i64) -> Result<()> {
        self.delete(&song_path(id)).await
    }
}
