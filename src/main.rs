use alloy_provider::ProviderBuilder;
use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

use mev_share_scraper::models::common::RunMode;
use mev_share_scraper::scraper::transactions::RpcNodeClient;
use mev_share_scraper::scraper::{self, history::EventClient, Scraper};
use mev_share_scraper::storage::cache::EventCache;
use mev_share_scraper::utils::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mode = RunMode::from_args(std::env::args().skip(1));

    // Load config
    let config = match load_config("config.yml") {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Err(e);
        }
    };

    let cache = EventCache::new(&config.cache_dir);

    if mode == RunMode::Clean {
        return scraper::clean(&cache).await;
    }

    // Validate connection and credential before any network call
    let rpc_url = config.rpc_url()?;
    let signer = config.auth_signer()?;
    info!("RPC URL: {:?}", config.rpc_url);
    info!("auth signer address: {}", signer.address());

    let node = RpcNodeClient::new(ProviderBuilder::new().connect_http(rpc_url));
    let source = EventClient::new(config.mev_share_url.as_str(), signer);

    let scraper = Scraper::new(source, node, cache, config.block_window);
    let snapshot = scraper.run().await?;
    info!(
        "run complete: {} events, {} transactions",
        snapshot.events.len(),
        snapshot.transactions.len()
    );

    Ok(())
}
