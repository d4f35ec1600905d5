//! Disk-backed response body store.

use axum::body::Bytes;
use dashmap::DashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::cache::key::CacheKey;

const TEMP_PREFIX: &str = ".tmp-";

/// Temp files younger than this may belong to another instance sharing the root.
const STALE_TEMP_AGE: Duration = Duration::from_secs(600);

/// Maps cache keys to files under a root directory.
///
/// Writes go to a temporary file which is then renamed over the entry, and
/// writers of the same key are serialized, so readers only ever see complete
/// bodies. Nothing is ever evicted.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    write_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl CacheStore {
    /// Open (and create if needed) the store rooted at `root`.
    ///
    /// Relative roots resolve against the current working directory. Temporary
    /// files from an interrupted write are removed once they are ten minutes
    /// old.
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };

        fs::create_dir_all(&root).await?;
        let removed = remove_stale_temp_files(&root).await?;

        tracing::info!(root = %root.display(), stale_temp_files = removed, "Cache store opened");

        Ok(Self {
            root,
            write_locks: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the entry for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Read the entry for `key`.
    ///
    /// A missing entry and an unreadable one both yield `None`; the latter is
    /// logged so the request falls back to the upstream.
    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// Store `body` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &CacheKey, body: &[u8]) -> io::Result<()> {
        let lock = Arc::clone(&self.write_locks.entry(key.clone()).or_default());
        let guard = lock.lock().await;

        let result = self.write_atomically(key, body).await;

        drop(guard);
        // Two references: the map's and ours. Anyone else waiting keeps it alive.
        self.write_locks
            .remove_if(key, |_, held| Arc::strong_count(held) <= 2);

        result
    }

    async fn write_atomically(&self, key: &CacheKey, body: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;

        let temp_path = self
            .root
            .join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));

        if let Err(e) = write_file(&temp_path, body).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, self.path_for(key)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tracing::debug!(key = %key, bytes = body.len(), "Cache entry written");
        Ok(())
    }
}

async fn write_file(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    Ok(())
}

async fn remove_stale_temp_files(root: &Path) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .await
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if !matches!(age, Some(age) if age >= STALE_TEMP_AGE) {
            continue;
        }
        if let Err(e) = fs::remove_file(entry.path()).await {
            tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stale temp file");
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}
