//! In-memory stand-ins for the upstream and downstream services.

use async_trait::async_trait;
use kara_catalog_server::dakara::*;
use kara_catalog_server::error::{Result, SyncError};
use kara_catalog_server::mugen::{AssetDownload, MugenApi, MugenKara};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub fn transport_error(context: &str) -> SyncError {
    SyncError::Transport {
        context: context.to_string(),
        status: Some(500),
        message: "injected failure".to_string(),
    }
}

#[derive(Default)]
pub struct FakeDakaraState {
    pub work_types: Vec<DakaraWorkType>,
    pub works: Vec<DakaraWork>,
    pub artists: Vec<DakaraArtist>,
    pub tags: Vec<DakaraTag>,
    pub songs: Vec<DakaraSong>,
    next_id: i64,
    /// Every write call, in order, e.g. "create_song 42.mkv".
    pub writes: Vec<String>,
    /// Song IDs whose delete fails.
    pub failing_deletes: HashSet<i64>,
    pub prune_works_calls: usize,
    pub prune_artists_calls: usize,
    pub list_work_types_calls: usize,
}

impl FakeDakaraState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory downstream library.
#[derive(Default)]
pub struct FakeDakara {
    pub state: Mutex<FakeDakaraState>,
    /// Cancelled from inside `create_work`, to stop a sweep half-way.
    pub cancel_on_create_work: Option<CancellationToken>,
    /// Each `list_work_types` call takes one permit before answering.
    pub list_work_types_gate: Option<Arc<Semaphore>>,
}

impl FakeDakara {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Puts a song straight into the remote, bypassing the write log.
    pub fn seed_song(&self, filename: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.songs.push(DakaraSong {
            id,
            title: filename.to_string(),
            filename: filename.to_string(),
            duration: 0,
            directory: String::new(),
            version: String::new(),
            detail: String::new(),
            detail_video: String::new(),
            tags: vec![],
            artists: vec![],
            works: vec![],
            lyrics_preview: None,
            has_instrumental: false,
        });
        id
    }

    pub fn song(&self, filename: &str) -> Option<DakaraSong> {
        let state = self.state.lock().unwrap();
        state.songs.iter().find(|s| s.filename == filename).cloned()
    }

    fn to_song(id: i64, body: &DakaraSongBody) -> DakaraSong {
        DakaraSong {
            id,
            title: body.title.clone(),
            filename: body.filename.clone(),
            duration: body.duration,
            directory: body.directory.clone(),
            version: body.version.clone(),
            detail: body.detail.clone(),
            detail_video: body.detail_video.clone(),
            tags: body.tags.clone(),
            artists: body.artists.clone(),
            works: body.works.clone(),
            lyrics_preview: None,
            has_instrumental: body.has_instrumental,
        }
    }
}

#[async_trait]
impl DakaraApi for FakeDakara {
    async fn list_work_types(&self) -> Result<Vec<DakaraWorkType>> {
        self.state.lock().unwrap().list_work_types_calls += 1;
        if let Some(gate) = &self.list_work_types_gate {
            gate.acquire()
                .await
                .map_err(|_| transport_error("list work types"))?
                .forget();
        }
        Ok(self.state.lock().unwrap().work_types.clone())
    }

    async fn create_work_type(&self, work_type: &DakaraWorkType) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .writes
            .push(format!("create_work_type {}", work_type.query_name));
        state.work_types.push(work_type.clone());
        Ok(())
    }

    async fn list_works(&self) -> Result<Vec<DakaraWork>> {
        Ok(self.state.lock().unwrap().works.clone())
    }

    async fn create_work(&self, work: &DakaraWorkBody) -> Result<()> {
        if let Some(token) = &self.cancel_on_create_work {
            token.cancel();
        }
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create_work {}", work.title));
        let id = state.next_id();
        state.works.push(DakaraWork {
            id,
            title: work.title.clone(),
            subtitle: String::new(),
            work_type: work.work_type.clone(),
            song_count: 0,
        });
        Ok(())
    }

    async fn prune_works(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.prune_works_calls += 1;
        let used: HashSet<i64> = state
            .songs
            .iter()
            .flat_map(|s| s.works.iter().map(|w| w.work.id))
            .collect();
        state.works.retain(|w| used.contains(&w.id));
        Ok(())
    }

    async fn list_artists(&self) -> Result<Vec<DakaraArtist>> {
        Ok(self.state.lock().unwrap().artists.clone())
    }

    async fn create_artist(&self, artist: &DakaraArtistBody) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create_artist {}", artist.name));
        let id = state.next_id();
        state.artists.push(DakaraArtist {
            id,
            name: artist.name.clone(),
            song_count: 0,
        });
        Ok(())
    }

    async fn prune_artists(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.prune_artists_calls += 1;
        let used: HashSet<i64> = state
            .songs
            .iter()
            .flat_map(|s| s.artists.iter().map(|a| a.id))
            .collect();
        state.artists.retain(|a| used.contains(&a.id));
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<DakaraTag>> {
        Ok(self.state.lock().unwrap().tags.clone())
    }

    async fn create_tag(&self, tag: &DakaraTagBody) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create_tag {}", tag.name));
        let id = state.next_id();
        state.tags.push(DakaraTag {
            id,
            name: tag.name.clone(),
            color_hue: tag.color_hue,
            disabled: false,
        });
        Ok(())
    }

    async fn update_tag(&self, id: i64, tag: &DakaraTagBody) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("update_tag {}", tag.name));
        let existing = state
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("tag {}", id)))?;
        existing.color_hue = tag.color_hue;
        Ok(())
    }

    async fn list_songs(&self) -> Result<Vec<DakaraSong>> {
        Ok(self.state.lock().unwrap().songs.clone())
    }

    async fn create_song(&self, song: &DakaraSongBody) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("create_song {}", song.filename));
        let id = state.next_id();
        state.songs.push(Self::to_song(id, song));
        Ok(())
    }

    async fn update_song(&self, id: i64, song: &DakaraSongBody) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("update_song {}", song.filename));
        let existing = state
            .songs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("song {}", id)))?;
        *existing = Self::to_song(id, song);
        Ok(())
    }

    async fn delete_song(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("delete_song {}", id));
        if state.failing_deletes.contains(&id) {
            return Err(transport_error("delete song"));
        }
        state.songs.retain(|s| s.id != id);
        Ok(())
    }
}

/// Upstream catalog serving a fixed set of karas and files.
#[derive(Default)]
pub struct FakeMugen {
    pub karas: Mutex<HashMap<Uuid, MugenKara>>,
    /// Media bytes keyed by media file name.
    pub media: Mutex<HashMap<String, Vec<u8>>>,
    pub lyrics: Mutex<HashMap<String, Vec<u8>>>,
    pub media_downloads: AtomicUsize,
    pub lyrics_downloads: AtomicUsize,
    /// Delay before a media download starts answering.
    pub media_delay: Mutex<Option<Duration>>,
}

impl FakeMugen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kara` with a video of `video` and subtitles of `subtitles`.
    pub fn add(&self, mut kara: MugenKara, video: &[u8], subtitles: &[u8]) {
        kara.media_size = video.len() as u64;
        self.media
            .lock()
            .unwrap()
            .insert(kara.media_file.clone(), video.to_vec());
        self.lyrics
            .lock()
            .unwrap()
            .insert(kara.sub_file.clone(), subtitles.to_vec());
        self.karas.lock().unwrap().insert(kara.kid, kara);
    }

    fn download(files: &Mutex<HashMap<String, Vec<u8>>>, name: &str) -> Result<AssetDownload> {
        let bytes = files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| transport_error(name))?;
        Ok(AssetDownload {
            content_length: Some(bytes.len() as u64),
            reader: Box::pin(std::io::Cursor::new(bytes)),
        })
    }
}

#[async_trait]
impl MugenApi for FakeMugen {
    async fn get_kara(&self, kid: Uuid) -> Result<MugenKara> {
        self.karas
            .lock()
            .unwrap()
            .get(&kid)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("kara {}", kid)))
    }

    async fn download_media(&self, media_file: &str) -> Result<AssetDownload> {
        self.media_downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.media_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::download(&self.media, media_file)
    }

    async fn download_lyrics(&self, sub_file: &str) -> Result<AssetDownload> {
        self.lyrics_downloads.fetch_add(1, Ordering::SeqCst);
        Self::download(&self.lyrics, sub_file)
    }
}
