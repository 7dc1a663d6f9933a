pub mod filter;
pub mod history;
pub mod transactions;

use std::collections::HashMap;

use alloy_primitives::B256;
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::errors::CacheError;
use crate::models::events::CacheSnapshot;
use crate::scraper::filter::{FilterOutcome, UNISWAP_TOPICS};
use crate::scraper::history::HistorySource;
use crate::scraper::transactions::NodeClient;
use crate::storage::cache::EventCache;

/// Drives the fetch → filter → resolve pipeline over a cache-aware run.
pub struct Scraper<S, N> {
    source: S,
    node: N,
    cache: EventCache,
    block_window: u64,
}

impl<S, N> Scraper<S, N>
where
    S: HistorySource,
    N: NodeClient,
{
    pub fn new(source: S, node: N, cache: EventCache, block_window: u64) -> Self {
        Self {
            source,
            node,
            cache,
            block_window,
        }
    }

    /// Runs the pipeline once. A readable cache short-circuits the run and
    /// is returned as-is; a missing or corrupt cache falls through to a live
    /// fetch whose result is written back atomically. Live-step errors abort
    /// without touching the cache, so a failed run never poisons the next
    /// one. A failed cache write is fatal too, but only after the run
    /// summary has been reported.
    pub async fn run(&self) -> Result<CacheSnapshot> {
        match self.cache.read_snapshot().await {
            Ok(snapshot) => {
                info!(
                    "loaded cached data: {} events, {} transactions",
                    snapshot.events.len(),
                    snapshot.transactions.len()
                );
                return Ok(snapshot);
            }
            Err(CacheError::NotFound { path }) => {
                info!("no cache file at {}, fetching live", path.display())
            }
            Err(CacheError::Corrupt(err)) => {
                warn!("cache file corrupt, refetching: {}", err)
            }
            Err(err) => return Err(err).context("failed to read cache file"),
        }

        let events =
            history::fetch_latest_events(&self.source, &self.node, self.block_window).await?;
        info!("total events {}", events.len());

        let FilterOutcome { matched, tally } =
            filter::filter_events_by_topic(&events, &UNISWAP_TOPICS);
        log_tally(&tally);
        info!(
            "filtered for uniswap events. {} events eligible.",
            matched.len()
        );

        let transactions = transactions::fetch_txs(&self.node, &matched).await;
        info!(
            "resolved {} of {} transactions",
            transactions.len(),
            matched.len()
        );

        let snapshot = CacheSnapshot {
            events: matched,
            transactions,
        };
        self.cache
            .write_snapshot(&snapshot)
            .await
            .context("failed to write cache file")?;
        Ok(snapshot)
    }
}

/// Clean-mode entry: removes the cache file. An already-absent cache is
/// reported but is not an error, so `clean` stays idempotent.
pub async fn clean(cache: &EventCache) -> Result<()> {
    info!("deleting cache data");
    match cache.delete().await {
        Ok(()) => {
            info!("removed cache file at {}", cache.path().display());
            Ok(())
        }
        Err(CacheError::NotFound { path }) => {
            warn!("no cache file to delete at {}", path.display());
            Ok(())
        }
        Err(err) => Err(err).context("failed to delete cache file"),
    }
}

fn log_tally(tally: &HashMap<B256, u64>) {
    let mut entries: Vec<_> = tally.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (topic, count) in entries {
        info!("topic {} seen {} times", topic, count);
    }
}
