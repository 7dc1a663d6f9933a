use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} not set")]
    Missing { name: &'static str },
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file not found at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Cache data invalid: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Failed to encode cache data: {0}")]
    Encode(serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
