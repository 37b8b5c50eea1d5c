//! Reciprocal Rank Fusion (RRF).
//!
//! For each record `d` the fused score is `Σ 1 / (k + rank_c(d))` over the channels `c`
//! that returned it. A channel that did not return a record contributes nothing.

use serde::Serialize;
use std::collections::HashMap;

use crate::channel::Hit;
use crate::record::RecordId;

/// Fusion constant used by the search engine.
pub const RRF_K: usize = 50;

/// A record after fusion, with the channel hits that produced its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedHit {
    pub record_id: RecordId,
    pub score: f64,
    pub contributions: Vec<Hit>,
}

/// Combines ranked channel lists. Ordered by descending score, ties by ascending id.
pub fn reciprocal_rank_fusion(lists: &[Vec<Hit>], k: usize) -> Vec<FusedHit> {
    let mut fused: HashMap<RecordId, FusedHit> = HashMap::new();
    for hit in lists.iter().flatten() {
        let entry = fused.entry(hit.record_id).or_insert_with(|| FusedHit {
            record_id: hit.record_id,
            score: 0.0,
            contributions: Vec::new(),
        });
        entry.score += 1.0 / (k + hit.rank) as f64;
        entry.contributions.push(hit.clone());
    }

    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.record_id.cmp(&b.record_id)));
    out
}
