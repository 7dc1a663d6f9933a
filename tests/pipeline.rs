use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, TxHash, B256};
use alloy_rpc_types_eth::Transaction;
use anyhow::Result;
use serde_json::json;
use tempfile::TempDir;

use mev_share_scraper::models::errors::CacheError;
use mev_share_scraper::models::events::{
    EventHint, EventHistory, EventHistoryInfo, EventHistoryParams, EventLog,
};
use mev_share_scraper::scraper::filter::UNISWAP_TOPICS;
use mev_share_scraper::scraper::history::HistorySource;
use mev_share_scraper::scraper::transactions::NodeClient;
use mev_share_scraper::scraper::{self, Scraper};
use mev_share_scraper::storage::cache::EventCache;

const BLOCK_WINDOW: u64 = 300;

/// History source playing back scripted pages, counting every request.
#[derive(Clone, Default)]
struct ScriptedSource {
    max_limit: u64,
    pages: Arc<Mutex<VecDeque<Vec<EventHistory>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(max_limit: u64, pages: Vec<Vec<EventHistory>>) -> Self {
        Self {
            max_limit,
            pages: Arc::new(Mutex::new(pages.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl HistorySource for ScriptedSource {
    async fn event_history_info(&self) -> Result<EventHistoryInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EventHistoryInfo {
            count: 0,
            min_block: 0,
            max_block: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            max_limit: self.max_limit,
        })
    }

    async fn event_history(&self, _params: &EventHistoryParams) -> Result<Vec<EventHistory>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Node connection serving a fixed transaction set, counting every request.
#[derive(Clone, Default)]
struct ScriptedNode {
    txs: HashMap<TxHash, Transaction>,
    calls: Arc<AtomicUsize>,
}

impl NodeClient for ScriptedNode {
    async fn block_number(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(17_000_000)
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<Transaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.txs.get(&hash).cloned())
    }
}

fn rpc_transaction(hash: TxHash) -> Transaction {
    serde_json::from_value(json!({
        "hash": hash,
        "nonce": "0x0",
        "blockHash": null,
        "blockNumber": null,
        "transactionIndex": null,
        "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        "to": "0x5db3d38bd40c862ba1fdb2286c32a62ab954d36d",
        "value": "0xde0b6b3a7640000",
        "gas": "0x5208",
        "gasPrice": "0x4a817c800",
        "input": "0x",
        "v": "0x1b",
        "r": "0x1b5e176d927f8e9ab405058b2d2457392da3e20f328b16ddabcebc33eaac5fea",
        "s": "0x4ba69724e8f69de52f0125ad8b3c5c2cef33019bac3249e2c0a2192766d1721c",
        "type": "0x0"
    }))
    .expect("static transaction json should deserialize")
}

fn event(n: u8, signature: B256) -> EventHistory {
    EventHistory {
        block: 17_000_000 - 10,
        timestamp: 1_688_000_000 + n as u64,
        hint: EventHint {
            hash: B256::repeat_byte(n),
            logs: vec![EventLog {
                address: Address::repeat_byte(0x5d),
                topics: vec![signature],
                data: Bytes::new(),
            }],
            txs: None,
            mev_gas_price: None,
            gas_used: None,
        },
    }
}

#[tokio::test]
async fn live_run_filters_resolves_and_writes_cache() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());

    let unrelated_topic = B256::repeat_byte(0xee);
    let source = ScriptedSource::new(
        500,
        vec![vec![
            event(1, UNISWAP_TOPICS[0]),
            event(2, unrelated_topic),
            event(3, UNISWAP_TOPICS[2]),
        ]],
    );
    // only event 1's transaction landed onchain
    let node = ScriptedNode {
        txs: HashMap::from([(B256::repeat_byte(1), rpc_transaction(B256::repeat_byte(1)))]),
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let snapshot = Scraper::new(source, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await
        .unwrap();

    let matched: Vec<_> = snapshot.events.iter().map(|e| e.hint.hash).collect();
    assert_eq!(matched, vec![B256::repeat_byte(1), B256::repeat_byte(3)]);
    // event 3's resolution failure drops the transaction, not the event
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.transactions[0].event_hash, B256::repeat_byte(1));

    let persisted = cache.read_snapshot().await.unwrap();
    assert_eq!(persisted.events, snapshot.events);
    assert_eq!(persisted.transactions.len(), 1);
}

#[tokio::test]
async fn cached_run_issues_zero_collaborator_calls() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());

    // first run populates the cache
    let source = ScriptedSource::new(500, vec![vec![event(1, UNISWAP_TOPICS[1])]]);
    let node = ScriptedNode {
        txs: HashMap::from([(B256::repeat_byte(1), rpc_transaction(B256::repeat_byte(1)))]),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let first = Scraper::new(source, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await
        .unwrap();

    // second run must replay the cache without touching either collaborator
    let idle_source = ScriptedSource::new(500, vec![]);
    let idle_node = ScriptedNode::default();
    let source_calls = idle_source.calls.clone();
    let node_calls = idle_node.calls.clone();

    let second = Scraper::new(idle_source, idle_node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await
        .unwrap();

    assert_eq!(source_calls.load(Ordering::SeqCst), 0);
    assert_eq!(node_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.events, first.events);
    assert_eq!(second.transactions.len(), first.transactions.len());
}

#[tokio::test]
async fn corrupt_cache_falls_back_to_live_fetch() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());
    cache.write("not json at all").await.unwrap();

    let source = ScriptedSource::new(500, vec![vec![event(1, UNISWAP_TOPICS[0])]]);
    let source_calls = source.calls.clone();
    let node = ScriptedNode {
        txs: HashMap::from([(B256::repeat_byte(1), rpc_transaction(B256::repeat_byte(1)))]),
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let snapshot = Scraper::new(source, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await
        .unwrap();

    assert!(source_calls.load(Ordering::SeqCst) > 0);
    assert_eq!(snapshot.events.len(), 1);
    // the rewritten cache is valid again
    cache.read_snapshot().await.unwrap();
}

#[tokio::test]
async fn clean_mode_removes_cache_and_tolerates_absence() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());

    // no cache yet: clean completes without error
    scraper::clean(&cache).await.unwrap();

    let source = ScriptedSource::new(500, vec![vec![event(1, UNISWAP_TOPICS[0])]]);
    let node = ScriptedNode {
        txs: HashMap::from([(B256::repeat_byte(1), rpc_transaction(B256::repeat_byte(1)))]),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    Scraper::new(source, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await
        .unwrap();
    assert!(cache.path().exists());

    scraper::clean(&cache).await.unwrap();
    assert!(matches!(
        cache.read_snapshot().await,
        Err(CacheError::NotFound { .. })
    ));
}

#[tokio::test]
async fn failed_cache_write_is_fatal_only_after_the_pipeline_ran() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());
    // a directory squatting on the staging path makes the cache write fail,
    // while the cache read still reports NotFound and the run goes live
    tokio::fs::create_dir(cache.path().with_extension("json.tmp"))
        .await
        .unwrap();

    let source = ScriptedSource::new(500, vec![vec![event(1, UNISWAP_TOPICS[0])]]);
    let source_calls = source.calls.clone();
    let node = ScriptedNode {
        txs: HashMap::from([(B256::repeat_byte(1), rpc_transaction(B256::repeat_byte(1)))]),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let node_calls = node.calls.clone();

    let result = Scraper::new(source, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await;

    assert!(result.is_err());
    // fetch, filter and resolve all completed before persistence failed:
    // one info query plus one page, one head-block query plus one resolution
    assert_eq!(source_calls.load(Ordering::SeqCst), 2);
    assert_eq!(node_calls.load(Ordering::SeqCst), 2);
    // and the failed write left no cache (or staging debris) behind
    assert!(!cache.path().exists());
    assert!(!cache.path().with_extension("json.tmp").is_file());
}

#[tokio::test]
async fn live_run_aborts_without_cache_write_when_fetch_fails() {
    let dir = TempDir::new().unwrap();
    let cache = EventCache::new(dir.path());

    struct BrokenSource;
    impl HistorySource for BrokenSource {
        async fn event_history_info(&self) -> Result<EventHistoryInfo> {
            anyhow::bail!("503 service unavailable")
        }
        async fn event_history(&self, _params: &EventHistoryParams) -> Result<Vec<EventHistory>> {
            anyhow::bail!("503 service unavailable")
        }
    }

    let node = ScriptedNode::default();
    let result = Scraper::new(BrokenSource, node, cache.clone(), BLOCK_WINDOW)
        .run()
        .await;

    assert!(result.is_err());
    // a failed run must not leave a cache behind
    assert!(!cache.path().exists());
}
