use alloy_primitives::{hex, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{ensure, Context, Result};
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::models::events::{EventHistory, EventHistoryInfo, EventHistoryParams};
use crate::scraper::transactions::NodeClient;

const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// Remote source of historical event hints. Implemented over HTTP by
/// [`EventClient`]; tests substitute bounded fakes.
#[allow(async_fn_in_trait)]
pub trait HistorySource {
    async fn event_history_info(&self) -> Result<EventHistoryInfo>;
    async fn event_history(&self, params: &EventHistoryParams) -> Result<Vec<EventHistory>>;
}

/// HTTP client for the MEV-Share events API. Requests carry the Flashbots
/// signature header, signed with the configured auth key over the keccak
/// hash of the request URL.
#[derive(Clone, Debug)]
pub struct EventClient {
    http: reqwest::Client,
    base_url: String,
    signer: PrivateKeySigner,
}

impl EventClient {
    pub fn new(base_url: impl Into<String>, signer: PrivateKeySigner) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            signer,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn signature_header(&self, payload: &str) -> Result<String> {
        let digest = keccak256(payload.as_bytes());
        let signature = self
            .signer
            .sign_message_sync(digest.to_string().as_bytes())?;
        Ok(format!(
            "{}:{}",
            self.signer.address(),
            hex::encode_prefixed(signature.as_bytes())
        ))
    }

    async fn send_get<T>(&self, url: String, params: Option<&EventHistoryParams>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut builder = self.http.get(&url);
        if let Some(params) = params {
            builder = builder.query(params);
        }
        let mut request = builder.build()?;
        let auth = self.signature_header(request.url().as_str())?;
        request
            .headers_mut()
            .insert(SIGNATURE_HEADER, HeaderValue::from_str(&auth)?);
        debug!("GET {}", request.url());
        let response = self.http.execute(request).await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

impl HistorySource for EventClient {
    async fn event_history_info(&self) -> Result<EventHistoryInfo> {
        self.send_get(self.endpoint("history/info"), None).await
    }

    async fn event_history(&self, params: &EventHistoryParams) -> Result<Vec<EventHistory>> {
        self.send_get(self.endpoint("history"), Some(params)).await
    }
}

/// Fetches every event hint within the last `block_window` blocks,
/// iteratively querying pages of `info.max_limit` entries until the source
/// returns a short page.
///
/// Pages are requested strictly sequentially: the termination check depends
/// on the previous page's size, and the offset math is not safe to issue
/// concurrently. Entries written to the remote feed between the first and
/// last page can shift page boundaries; that race is accepted. Any page
/// error aborts the fetch with no partial result.
pub async fn fetch_latest_events<S, N>(
    source: &S,
    node: &N,
    block_window: u64,
) -> Result<Vec<EventHistory>>
where
    S: HistorySource,
    N: NodeClient,
{
    let info = source
        .event_history_info()
        .await
        .context("failed to query event history info")?;
    ensure!(info.max_limit > 0, "event source reported max_limit of 0");

    let latest_block = node
        .block_number()
        .await
        .context("failed to query latest block number")?;
    let block_start = latest_block.saturating_sub(block_window);
    info!(
        "scanning event history from block {} to {} (page size {})",
        block_start, latest_block, info.max_limit
    );

    let mut events: Vec<EventHistory> = vec![];
    let mut page_index = 0u64;
    loop {
        let chunk = source
            .event_history(&EventHistoryParams {
                block_start: Some(block_start),
                limit: Some(info.max_limit),
                offset: Some(page_index * info.max_limit),
                ..Default::default()
            })
            .await
            .with_context(|| format!("event history page {} failed", page_index))?;
        let chunk_len = chunk.len() as u64;
        events.extend(chunk);
        info!("fetched {} events ({} events total)", chunk_len, events.len());
        // a short page signals the feed is exhausted
        if chunk_len < info.max_limit {
            break;
        }
        page_index += 1;
    }
    Ok(events)
}
