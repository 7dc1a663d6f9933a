use alloy_primitives::{Address, Bytes, FixedBytes, TxHash, B256, U256};
use alloy_rpc_types_eth::Transaction;
use serde::{Deserialize, Serialize};

/// Metadata returned by the events API `history/info` endpoint. `max_limit`
/// caps the page size for `history` queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHistoryInfo {
    pub count: u64,
    pub min_block: u64,
    pub max_block: u64,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub max_limit: u64,
}

/// Query parameters for the events API `history` endpoint.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHistoryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_end: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// One historical hint record from the MEV-Share event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHistory {
    pub block: u64,
    pub timestamp: u64,
    pub hint: EventHint,
}

/// The shared portion of an event: the transaction hash it refers to and
/// whatever the originator chose to reveal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHint {
    pub hash: TxHash,
    #[serde(default)]
    pub logs: Vec<EventLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txs: Option<Vec<HintTransaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mev_gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U256>,
}

/// A log revealed in a hint. `topics[0]` is the event signature hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Partially-revealed transaction body attached to a hint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_selector: Option<FixedBytes<4>>,
}

/// A transaction fetched from the node for a matched event, tagged with the
/// hash of the event it resolves so the correlation survives resolution
/// failures dropping entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTransaction {
    pub event_hash: TxHash,
    pub transaction: Transaction,
}

/// The unit persisted to disk: filtered events alongside the transactions
/// that could be resolved for them. `transactions` is keyed back to `events`
/// by `event_hash`; the two lists are not guaranteed equal length.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub events: Vec<EventHistory>,
    pub transactions: Vec<ResolvedTransaction>,
}
