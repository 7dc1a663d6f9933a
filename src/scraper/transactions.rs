use alloy_primitives::TxHash;
use alloy_provider::Provider;
use alloy_rpc_types_eth::Transaction;
use anyhow::Result;
use tracing::{debug, warn};

use crate::models::events::{EventHistory, ResolvedTransaction};

/// The node connection as the pipeline sees it: chain head lookups and
/// transaction resolution. Any alloy provider qualifies; tests use fakes.
#[allow(async_fn_in_trait)]
pub trait NodeClient {
    async fn block_number(&self) -> Result<u64>;
    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<Transaction>>;
}

/// Adapter giving the pipeline its [`NodeClient`] view of an alloy provider.
#[derive(Clone, Debug)]
pub struct RpcNodeClient<P> {
    provider: P,
}

impl<P> RpcNodeClient<P>
where
    P: Provider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> NodeClient for RpcNodeClient<P>
where
    P: Provider,
{
    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<Transaction>> {
        Ok(self.provider.get_transaction_by_hash(hash).await?)
    }
}

/// Resolves the landed transaction for each matched event, one at a time in
/// event order. A hash that cannot be resolved (not found onchain, transport
/// error) is logged and skipped; the batch never aborts and the event itself
/// stays eligible. Output entries carry the event hash they resolve, so the
/// correlation does not depend on positions.
pub async fn fetch_txs<N>(node: &N, events: &[EventHistory]) -> Vec<ResolvedTransaction>
where
    N: NodeClient,
{
    let mut resolved = Vec::with_capacity(events.len());
    for event in events {
        let hash = event.hint.hash;
        match node.transaction_by_hash(hash).await {
            Ok(Some(transaction)) => {
                debug!("tx found onchain\t{:?}", hash);
                resolved.push(ResolvedTransaction {
                    event_hash: hash,
                    transaction,
                });
            }
            Ok(None) => warn!("tx not found onchain\t{:?}", hash),
            Err(err) => warn!("error fetching tx {:?}: {:#}", hash, err),
        }
    }
    resolved
}
