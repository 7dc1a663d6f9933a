use std::collections::HashMap;

use alloy_primitives::{b256, B256};

use crate::models::events::EventHistory;

/// Log signatures the pipeline considers interesting. Fixed at build time.
pub const UNISWAP_TOPICS: [B256; 3] = [
    // univ3
    // Swap(address,address,int256,int256,uint160,uint128,int24)
    b256!("c42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67"),
    // univ2
    // Sync(uint112,uint112)
    b256!("1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1"),
    // univ2
    // Swap(address,uint256,uint256,uint256,uint256,address)
    b256!("d78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822"),
];

#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Events with at least one log whose signature is in the filter set.
    /// Each event appears exactly once, in input order.
    pub matched: Vec<EventHistory>,
    /// Occurrence count of every log signature observed during the scan,
    /// seeded with the filter set at zero. Diagnostic only, never persisted.
    pub tally: HashMap<B256, u64>,
}

/// Selects the events whose logs mention one of `filter_topics`, tallying
/// every observed event signature along the way. Only `topics[0]` of each
/// log is inspected; secondary (indexed-argument) topics are not.
///
/// An event with several matching logs is still selected once.
pub fn filter_events_by_topic(
    events: &[EventHistory],
    filter_topics: &[B256],
) -> FilterOutcome {
    let mut tally: HashMap<B256, u64> = filter_topics.iter().map(|topic| (*topic, 0)).collect();
    let mut matched = vec![];

    for event in events {
        let mut is_match = false;
        for log in &event.hint.logs {
            let Some(signature) = log.topics.first() else {
                continue;
            };
            *tally.entry(*signature).or_insert(0) += 1;
            if !is_match && filter_topics.contains(signature) {
                is_match = true;
            }
        }
        if is_match {
            matched.push(event.clone());
        }
    }

    FilterOutcome { matched, tally }
}
