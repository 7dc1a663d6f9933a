use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::errors::ConfigError;

/// Environment variable overriding `auth_signer_key` from the config file.
pub const AUTH_SIGNER_KEY_VAR: &str = "AUTH_SIGNER_KEY";

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub rpc_url: String,
    #[serde(default = "default_mev_share_url")]
    pub mev_share_url: String,
    #[serde(default)]
    pub auth_signer_key: Option<String>,
    pub block_window: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_mev_share_url() -> String {
    "https://mev-share.flashbots.net/api/v1".to_string()
}

fn default_cache_dir() -> String {
    "./data".to_string()
}

impl Config {
    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        if self.rpc_url.is_empty() {
            return Err(ConfigError::Missing { name: "rpc_url" });
        }
        self.rpc_url
            .parse()
            .map_err(|err: url::ParseError| ConfigError::Invalid {
                name: "rpc_url",
                reason: err.to_string(),
            })
    }

    /// Resolves the signing credential for the events API. The environment
    /// variable takes precedence over the config file; absence of both is
    /// startup-fatal.
    pub fn auth_signer(&self) -> Result<PrivateKeySigner, ConfigError> {
        let key = std::env::var(AUTH_SIGNER_KEY_VAR)
            .ok()
            .or_else(|| self.auth_signer_key.clone())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing {
                name: AUTH_SIGNER_KEY_VAR,
            })?;
        key.parse()
            .map_err(|err: alloy_signer_local::LocalSignerError| ConfigError::Invalid {
                name: AUTH_SIGNER_KEY_VAR,
                reason: err.to_string(),
            })
    }
}

/// Entry mode, selected once from the positional CLI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the scrape pipeline (cache-aware).
    Normal,
    /// Delete the cache and exit.
    Clean,
}

impl RunMode {
    pub fn from_args<I>(mut args: I) -> Self
    where
        I: Iterator<Item = String>,
    {
        if args.any(|arg| arg == "clean" || arg == "delete") {
            Self::Clean
        } else {
            Self::Normal
        }
    }
}
