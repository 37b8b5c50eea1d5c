use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::config::EngineConfig;
use crate::engine::IndexState;
use crate::error::{Error, Result};
use crate::fuzzy::string_score;
use crate::index::Posting;
use crate::record::{Exam, Record, RecordId};
use crate::tokenizer::tokenize;

/// One independent retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Subsequence scoring of the whole query against each record's text.
    Fuzzy,
    /// Every query token must appear in the record.
    FullText,
    /// Like full-text, but the last query token only needs to prefix a record token.
    Prefix,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Fuzzy, Channel::FullText, Channel::Prefix];

    /// Ranks visible records for `query`, best first, at most `limit` hits.
    pub(crate) fn rank(self, state: &IndexState, query: &PreparedQuery, limit: usize) -> Result<Vec<Hit>> {
        let scores = match self {
            Channel::Fuzzy => fuzzy_scores(state, query)?,
            Channel::FullText => token_scores(state, query, false)?,
            Channel::Prefix => token_scores(state, query, true)?,
        };
        Ok(into_hits(self, scores, limit))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Fuzzy => write!(f, "fuzzy"),
            Channel::FullText => write!(f, "full_text"),
            Channel::Prefix => write!(f, "prefix"),
        }
    }
}

/// A record's placement in one channel's result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub record_id: RecordId,
    pub channel: Channel,
    /// 1-based position within the channel's list.
    pub rank: usize,
    pub raw_score: f64,
}

/// Query text and tokens, normalized once and shared by every channel.
#[derive(Debug, Clone)]
pub(crate) struct PreparedQuery {
    pub text: String,
    /// Distinct tokens in first-occurrence order.
    pub tokens: Vec<String>,
    pub exam: Option<Exam>,
    pub fuzziness: f64,
    pub min_score: f64,
}

impl PreparedQuery {
    pub fn new(raw: &str, exam: Option<Exam>, config: &EngineConfig) -> Self {
        let all: Vec<String> = tokenize(raw).into_iter().map(|(t, _)| t).collect();
        let text = all.join(" ");
        let mut tokens: Vec<String> = Vec::with_capacity(all.len());
        for tok in all {
            if !tokens.contains(&tok) {
                tokens.push(tok);
            }
        }
        Self { text, tokens, exam, fuzziness: config.fuzziness, min_score: config.fuzzy_min_score }
    }

    /// Public visibility plus the optional exam filter (`unknown` exams always pass).
    fn admits(&self, record: &Record) -> bool {
        record.is_searchable()
            && match self.exam {
                Some(exam) => record.exam == exam || record.exam == Exam::Unknown,
                None => true,
            }
    }
}

/// Scores the query against the searchable text cached in the token index, keeping
/// positive scores at or above the configured floor.
fn fuzzy_scores(state: &IndexState, query: &PreparedQuery) -> Result<Vec<(RecordId, f64)>> {
    if query.text.is_empty() {
        return Ok(Vec::new());
    }
    let mut scores = Vec::new();
    for record in state.docs.scan(|r| query.admits(r)) {
        let text = state
            .tokens
            .text(record.id)
            .ok_or_else(|| Error::IndexCorruption(format!("searchable record {} is not indexed", record.id)))?;
        let score = string_score(text, &query.text, query.fuzziness);
        if score > 0.0 && score >= query.min_score {
            scores.push((record.id, score));
        }
    }
    Ok(scores)
}

/// Length-normalized term frequency over the matched tokens. With `prefix`, the last
/// query token matches any record token it prefixes; all other tokens match exactly.
fn token_scores(state: &IndexState, query: &PreparedQuery, prefix: bool) -> Result<Vec<(RecordId, f64)>> {
    let Some((last, leading)) = query.tokens.split_last() else {
        return Ok(Vec::new());
    };

    // record -> (query tokens matched, summed frequency)
    let mut acc: HashMap<RecordId, (usize, u32)> = HashMap::new();

    for tok in leading {
        let mut per_record = HashMap::new();
        tally(state.tokens.postings(tok), &mut per_record);
        merge(&mut acc, per_record);
    }
    let mut per_record = HashMap::new();
    if prefix {
        for (_, plist) in state.tokens.prefix_postings(last) {
            tally(plist, &mut per_record);
        }
    } else {
        tally(state.tokens.postings(last), &mut per_record);
    }
    merge(&mut acc, per_record);

    let required = query.tokens.len();
    let mut scores = Vec::new();
    for (id, (matched, freq)) in acc {
        if matched < required {
            continue;
        }
        let record = state
            .docs
            .get(id)
            .ok_or_else(|| Error::IndexCorruption(format!("posting references missing record {id}")))?;
        if !query.admits(record) {
            continue;
        }
        let len = state
            .tokens
            .doc_len(id)
            .filter(|&n| n > 0)
            .ok_or_else(|| Error::IndexCorruption(format!("record {id} has postings but no token count")))?;
        scores.push((id, freq as f64 / len as f64));
    }
    Ok(scores)
}

fn tally(plist: &[Posting], per_record: &mut HashMap<RecordId, u32>) {
    for p in plist {
        *per_record.entry(p.record_id).or_insert(0) += p.frequency;
    }
}

fn merge(acc: &mut HashMap<RecordId, (usize, u32)>, per_record: HashMap<RecordId, u32>) {
    for (id, freq) in per_record {
        let e = acc.entry(id).or_insert((0, 0));
        e.0 += 1;
        e.1 += freq;
    }
}

/// Sorts descending by score (ties by ascending id), keeps the top `limit`, assigns ranks.
fn into_hits(channel: Channel, mut scores: Vec<(RecordId, f64)>, limit: usize) -> Vec<Hit> {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scores.truncate(limit);
    scores
        .into_iter()
        .enumerate()
        .map(|(i, (record_id, raw_score))| Hit { record_id, channel, rank: i + 1, raw_score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(records: &[(RecordId, &str, &str, bool)]) -> IndexState {
        let mut s = IndexState::default();
        for &(id, code, name, approved) in records {
            let mut r = Record::new(id, code, name);
            r.approved = approved;
            s.apply_upsert(r);
        }
        s
    }

    fn ids(hits: &[Hit]) -> Vec<RecordId> {
        hits.iter().map(|h| h.record_id).collect()
    }

    fn q(raw: &str) -> PreparedQuery {
        PreparedQuery::new(raw, None, &EngineConfig::default())
    }

    #[test]
    fn full_text_requires_every_token() {
        let s = state(&[
            (1, "CS101", "Data Structures", true),
            (2, "CS201", "Data Mining", true),
        ]);
        let hits = Channel::FullText.rank(&s, &q("data structures"), 30).unwrap();
        assert_eq!(ids(&hits), vec![1]);
        let hits = Channel::FullText.rank(&s, &q("data"), 30).unwrap();
        assert_eq!(ids(&hits), vec![1, 2]);
    }

    #[test]
    fn full_text_prefers_concise_text() {
        let s = state(&[
            (1, "EE201", "Signals and Systems Laboratory", true),
            (2, "EE202", "Signals", true),
        ]);
        let hits = Channel::FullText.rank(&s, &q("signals"), 30).unwrap();
        assert_eq!(ids(&hits), vec![2, 1]);
        assert!((hits[0].raw_score - 0.5).abs() < 1e-9);
        assert!((hits[1].raw_score - 0.2).abs() < 1e-9);
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn prefix_matches_partial_last_token() {
        let s = state(&[
            (1, "CS101", "Data Structures", true),
            (2, "CS102", "Algorithms", true),
        ]);
        let hits = Channel::Prefix.rank(&s, &q("algo"), 30).unwrap();
        assert_eq!(ids(&hits), vec![2]);
        assert!(Channel::FullText.rank(&s, &q("algo"), 30).unwrap().is_empty());

        let hits = Channel::Prefix.rank(&s, &q("data str"), 30).unwrap();
        assert_eq!(ids(&hits), vec![1]);
    }

    #[test]
    fn hidden_records_never_rank() {
        let s = state(&[(1, "CS101", "Data Structures", false)]);
        for c in Channel::ALL {
            assert!(c.rank(&s, &q("data structures"), 30).unwrap().is_empty(), "{c}");
        }
    }

    #[test]
    fn fuzzy_ties_break_by_id_and_respect_limit() {
        let s = state(&[
            (3, "XX100", "Geology", true),
            (1, "XX100", "Geology", true),
            (2, "XX100", "Geology", true),
        ]);
        let hits = Channel::Fuzzy.rank(&s, &q("geology"), 2).unwrap();
        assert_eq!(ids(&hits), vec![1, 2]);
        assert_eq!(hits[0].raw_score, hits[1].raw_score);
    }

    #[test]
    fn exam_filter_keeps_matching_and_unknown() {
        let mut s = IndexState::default();
        for (id, exam) in [(1, Exam::Midsem), (2, Exam::Endsem), (3, Exam::Unknown)] {
            let mut r = Record::new(id, "PH100", "Physics");
            r.approved = true;
            r.exam = exam;
            s.apply_upsert(r);
        }
        let query = PreparedQuery::new("physics", Some(Exam::Midsem), &EngineConfig::default());
        let hits = Channel::FullText.rank(&s, &query, 30).unwrap();
        assert_eq!(ids(&hits), vec![1, 3]);
    }

    #[test]
    fn fuzzy_drops_single_character_overlap() {
        let s = state(&[
            (1, "CS101", "Data Structures", true),
            (2, "CS102", "Algorithms", true),
        ]);
        assert_eq!(ids(&Channel::Fuzzy.rank(&s, &q("data structures"), 30).unwrap()), vec![1]);
        assert_eq!(ids(&Channel::Fuzzy.rank(&s, &q("algo"), 30).unwrap()), vec![2]);

        let lenient = EngineConfig { fuzzy_min_score: 0.0, ..EngineConfig::default() };
        let hits = Channel::Fuzzy.rank(&s, &PreparedQuery::new("algo", None, &lenient), 30).unwrap();
        assert_eq!(ids(&hits), vec![2, 1]);
        assert!(hits[1].raw_score < 0.1);
    }

    #[test]
    fn fuzzy_scores_cached_text() {
        let mut s = state(&[(1, "CS101", "Data Structures", true)]);
        assert_eq!(s.tokens.text(1), Some("cs101 data structures"));
        s.tokens.remove_record(1);
        let err = Channel::Fuzzy.rank(&s, &q("data"), 30).unwrap_err();
        assert!(matches!(err, Error::IndexCorruption(_)));
    }

    #[test]
    fn dangling_posting_is_corruption() {
        let mut s = state(&[(1, "CS101", "Data Structures", true)]);
        s.tokens.index_record(99, "data structures");
        let err = Channel::FullText.rank(&s, &q("data"), 30).unwrap_err();
        assert!(matches!(err, Error::IndexCorruption(_)));
    }
}
