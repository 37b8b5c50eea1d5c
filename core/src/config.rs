use serde::{Deserialize, Serialize};

use crate::fusion::RRF_K;
use crate::fuzzy::{DEFAULT_FUZZINESS, DEFAULT_MIN_SCORE};

/// Search tunables. Every field falls back to its default when omitted from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Leakage tolerance of the fuzzy channel; `<= 0` rejects any unmatched character.
    pub fuzziness: f64,
    /// Fuzzy hits scoring below this are dropped before ranking.
    pub fuzzy_min_score: f64,
    /// Hits kept per channel before fusion.
    pub channel_limit: usize,
    pub rrf_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzziness: DEFAULT_FUZZINESS,
            fuzzy_min_score: DEFAULT_MIN_SCORE,
            channel_limit: 30,
            rrf_k: RRF_K,
        }
    }
}
