use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, Hit, PreparedQuery};
use crate::config::EngineConfig;
use crate::document::DocumentIndex;
use crate::duplicates::{self, DuplicateQuery};
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeOp};
use crate::fusion::{reciprocal_rank_fusion, FusedHit};
use crate::index::TokenIndex;
use crate::record::{Exam, Record, RecordId, RecordPatch};

/// Records plus the token index derived from them. Always mutated together.
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub docs: DocumentIndex,
    pub tokens: TokenIndex,
}

impl IndexState {
    /// Stores `record` and brings its postings in line: soft-deleted records have none.
    pub fn apply_upsert(&mut self, record: Record) -> Option<Record> {
        let reindex = self.docs.get(record.id).map_or(true, |prev| prev.needs_reindex(&record));
        if reindex {
            if record.soft_deleted {
                self.tokens.remove_record(record.id);
            } else {
                self.tokens.index_record(record.id, &record.searchable_text());
            }
            debug!(id = record.id, deleted = record.soft_deleted, "reindexed record");
        }
        self.docs.upsert(record)
    }

    fn check(&self) -> Result<()> {
        for id in self.tokens.posted_ids() {
            match self.docs.get(id) {
                None => return Err(Error::IndexCorruption(format!("posting references missing record {id}"))),
                Some(r) if r.soft_deleted => {
                    return Err(Error::IndexCorruption(format!("posting references deleted record {id}")))
                }
                Some(_) => {}
            }
        }
        for id in self.tokens.record_ids() {
            if self.docs.get(id).map_or(true, |r| r.soft_deleted) {
                return Err(Error::IndexCorruption(format!("token entry for dead record {id}")));
            }
        }
        if let Some(r) = self.docs.scan(|r| !r.soft_deleted).find(|r| !self.tokens.contains(r.id)) {
            return Err(Error::IndexCorruption(format!("live record {} is not indexed", r.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Only papers of this exam (or of unknown exam) are considered.
    pub exam: Option<Exam>,
}

/// The hybrid search engine: a document index, its token index, and the query paths
/// over both. Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct SearchEngine {
    state: RwLock<IndexState>,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { state: RwLock::new(IndexState::default()), config }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Inserts or replaces a record, returning the previous version. The token index is
    /// updated before the write lock is released.
    pub fn upsert(&self, record: Record) -> Option<Record> {
        self.state.write().apply_upsert(record)
    }

    /// Hides a record from search and drops its postings. Unknown ids are logged and
    /// reported as `false`.
    pub fn remove_soft(&self, id: RecordId) -> bool {
        let mut state = self.state.write();
        let Some(record) = state.docs.get_mut(id) else {
            warn!(id, "soft delete of unknown record ignored");
            return false;
        };
        record.soft_deleted = true;
        record.approved = false;
        state.tokens.remove_record(id);
        debug!(id, "soft deleted record");
        true
    }

    /// Brings a soft-deleted record back as unapproved.
    pub fn restore(&self, id: RecordId) -> Result<Record> {
        let mut state = self.state.write();
        let mut record = state.docs.get(id).cloned().ok_or(Error::UnknownRecord(id))?;
        record.soft_deleted = false;
        record.approved = false;
        state.apply_upsert(record.clone());
        Ok(record)
    }

    /// Edits a live record in place and returns the new version.
    pub fn update(&self, id: RecordId, patch: RecordPatch) -> Result<Record> {
        let mut state = self.state.write();
        let mut record = state
            .docs
            .get(id)
            .filter(|r| !r.soft_deleted)
            .cloned()
            .ok_or(Error::UnknownRecord(id))?;
        patch.apply_to(&mut record);
        state.apply_upsert(record.clone());
        Ok(record)
    }

    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.state.read().docs.get(id).cloned()
    }

    /// Records matching `predicate`, oldest first.
    pub fn list<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.state.read().docs.list(predicate)
    }

    /// Papers awaiting moderation.
    pub fn unapproved(&self) -> Vec<Record> {
        self.list(|r| !r.approved && !r.soft_deleted)
    }

    pub fn unapproved_count(&self) -> usize {
        self.state.read().docs.scan(|r| !r.approved && !r.soft_deleted).count()
    }

    pub fn soft_deleted(&self) -> Vec<Record> {
        self.list(|r| r.soft_deleted)
    }

    pub fn len(&self) -> usize { self.state.read().docs.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn search(&self, query: &str) -> Result<Vec<FusedHit>> {
        self.search_with(query, &SearchOptions::default())
    }

    /// Runs the fuzzy, full-text and prefix channels in parallel and fuses their lists.
    pub fn search_with(&self, query: &str, options: &SearchOptions) -> Result<Vec<FusedHit>> {
        let prepared = self.prepare(query, options)?;
        let guard = self.state.read();
        let state: &IndexState = &guard;
        let lists: Vec<Vec<Hit>> = Channel::ALL
            .par_iter()
            .map(|c| c.rank(state, &prepared, self.config.channel_limit))
            .collect::<Result<_>>()
            .map_err(log_corruption)?;
        drop(guard);
        let fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);
        debug!(query, hits = fused.len(), "search");
        Ok(fused)
    }

    /// Search hits resolved to their records. Hits whose record changed visibility
    /// since ranking are dropped.
    pub fn search_records(&self, query: &str, options: &SearchOptions) -> Result<Vec<(FusedHit, Record)>> {
        let hits = self.search_with(query, options)?;
        let state = self.state.read();
        Ok(hits
            .into_iter()
            .filter_map(|h| {
                let rec = state.docs.get(h.record_id).filter(|r| r.is_searchable())?.clone();
                Some((h, rec))
            })
            .collect())
    }

    /// A single channel's ranked list.
    pub fn rank_channel(&self, channel: Channel, query: &str, options: &SearchOptions) -> Result<Vec<Hit>> {
        let prepared = self.prepare(query, options)?;
        channel
            .rank(&self.state.read(), &prepared, self.config.channel_limit)
            .map_err(log_corruption)
    }

    pub fn find_duplicates(&self, query: &DuplicateQuery) -> Vec<Record> {
        duplicates::find_duplicates(&self.state.read().docs, query)
    }

    /// Applies one change-feed event.
    pub fn apply(&self, event: ChangeEvent) {
        let ChangeEvent { op, mut record } = event;
        if op == ChangeOp::SoftDelete {
            record.soft_deleted = true;
            record.approved = false;
        }
        self.upsert(record);
    }

    pub fn load<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        let mut applied = 0;
        for event in events {
            self.apply(event);
            applied += 1;
        }
        info!(applied, records = self.len(), "change feed applied");
        applied
    }

    /// Verifies the token index against the document index.
    pub fn check_consistency(&self) -> Result<()> {
        self.state.read().check().map_err(log_corruption)
    }

    pub fn num_terms(&self) -> usize { self.state.read().tokens.num_terms() }

    fn prepare(&self, query: &str, options: &SearchOptions) -> Result<PreparedQuery> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery);
        }
        Ok(PreparedQuery::new(query, options.exam, &self.config))
    }
}

fn log_corruption(e: Error) -> Error {
    if let Error::IndexCorruption(msg) = &e {
        error!(%msg, "index corruption");
    }
    e
}
