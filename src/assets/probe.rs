//! Validation of stored video files.

use super::object_store::ObjectStore;
use crate::error::Result;
use async_trait::async_trait;
use infer::MatcherType;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Decides whether a stored object is a playable video.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, store: &dyn ObjectStore, key: &str) -> Result<bool>;
}

/// Accepts every object. Useful when no validation is wanted.
pub struct AcceptAllProbe;

#[async_trait]
impl MediaProbe for AcceptAllProbe {
    async fn probe(&self, _store: &dyn ObjectStore, _key: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Bytes read from the start of an object before sniffing its type.
const SNIFF_HEAD_LEN: usize = 8192;

/// Accepts objects whose leading bytes identify a video container
/// (Matroska/WebM, MP4, AVI, MOV...).
pub struct SignatureProbe;

async fn read_at(store: &dyn ObjectStore, key: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut reader = store.open(key, offset).await?;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[async_trait]
impl MediaProbe for SignatureProbe {
    async fn probe(&self, store: &dyn ObjectStore, key: &str) -> Result<bool> {
        let head = read_at(store, key, 0, SNIFF_HEAD_LEN).await?;
        match infer::get(&head) {
            Some(kind) => {
                debug!("Object {} sniffed as {}", key, kind.mime_type());
                Ok(kind.matcher_type() == MatcherType::Video)
            }
            None => Ok(false),
        }
    }
}
