use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::errors::CacheError;
use crate::models::events::CacheSnapshot;

const CACHE_FILE_NAME: &str = "cache.json";

/// Flat-file store for the scrape result. Holds exactly one snapshot; a
/// reader either sees a complete file or none at all.
#[derive(Clone, Debug)]
pub struct EventCache {
    cache_dir: PathBuf,
    cache_file: PathBuf,
}

impl EventCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        let cache_file = cache_dir.join(CACHE_FILE_NAME);
        Self {
            cache_dir,
            cache_file,
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_file
    }

    pub async fn read(&self) -> Result<String, CacheError> {
        match tokio::fs::read_to_string(&self.cache_file).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(CacheError::NotFound {
                path: self.cache_file.clone(),
            }),
            Err(err) => Err(CacheError::Io(err)),
        }
    }

    pub async fn read_snapshot(&self) -> Result<CacheSnapshot, CacheError> {
        let raw = self.read().await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overwrites the cache with `data`. Stages the content in a temp file in
    /// the same directory and renames it over the destination, so an
    /// interrupted write never leaves a readable partial file.
    pub async fn write(&self, data: &str) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let staging = self.cache_file.with_extension("json.tmp");
        let staged = match tokio::fs::write(&staging, data).await {
            Ok(()) => tokio::fs::rename(&staging, &self.cache_file).await,
            Err(err) => Err(err),
        };
        if let Err(err) = staged {
            // do not leave a stale staging file behind
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(CacheError::Io(err));
        }
        debug!("wrote {} bytes to {}", data.len(), self.cache_file.display());
        Ok(())
    }

    pub async fn write_snapshot(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let body = serde_json::to_string_pretty(snapshot).map_err(CacheError::Encode)?;
        self.write(&body).await
    }

    pub async fn delete(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.cache_file).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(CacheError::NotFound {
                path: self.cache_file.clone(),
            }),
            Err(err) => Err(CacheError::Io(err)),
        }
    }
}
