//! Object storage for binary assets.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Size and user metadata of a stored object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams `reader` into `key`, replacing any previous object and its
    /// metadata. Returns the number of bytes stored.
    async fn put(
        &self,
        key: &str,
        reader: ObjectReader,
        metadata: HashMap<String, String>,
    ) -> Result<u64>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn stat(&self, key: &str) -> Result<Option<ObjectStat>>;

    /// Reads `key` starting at byte `offset`.
    async fn open(&self, key: &str, offset: u64) -> Result<ObjectReader>;
}

/// Stores objects as plain files under a root directory, with user metadata
/// in a JSON sidecar next to each object.
pub struct FsObjectStore {
    root: PathBuf,
}

const METADATA_SUFFIX: &str = ".meta.json";

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Maps a key like "video/42" to a path under the root, rejecting keys
    /// that would escape it.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.contains('\0')
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(part) if !part.to_string_lossy().starts_with('.')));
        if !valid {
            return Err(SyncError::validation(format!("invalid object key {:?}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn metadata_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(METADATA_SUFFIX);
        PathBuf::from(name)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}.part", uuid::Uuid::new_v4()));
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        mut reader: ObjectReader,
        metadata: HashMap<String, String>,
    ) -> Result<u64> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temporary file first so readers never see a partial object
        let temp = Self::temp_path(&path);
        let written = async {
            let mut file = fs::File::create(&temp).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;
        let written = match written {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                return Err(e.into());
            }
        };
        fs::rename(&temp, &path).await?;

        let meta_json = serde_json::to_vec(&metadata)
            .map_err(|e| SyncError::decode("object metadata", e))?;
        let meta_path = Self::metadata_path(&path);
        let meta_temp = Self::temp_path(&meta_path);
        fs::write(&meta_temp, meta_json).await?;
        fs::rename(&meta_temp, &meta_path).await?;

        debug!("Stored {} bytes at {}", written, key);
        Ok(written)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectStat>> {
        let path = self.object_path(key)?;
        let file_meta = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata = match fs::read(Self::metadata_path(&path)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SyncError::decode(format!("metadata of {}", key), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(ObjectStat {
            size: file_meta.len(),
            metadata,
        }))
    }

    async fn open(&self, key: &str, offset: u64) -> Result<ObjectReader> {
        let path = self.object_path(key)?;
        let mut file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(format!("object {}", key)));
            }
            Err(e) => return Err(e.into()),
        };
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(Box::pin(file))
    }
}
