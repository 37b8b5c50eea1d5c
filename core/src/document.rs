use std::collections::BTreeMap;

use crate::record::{Record, RecordId};

/// Authoritative table of records, keyed by id. Records are never physically removed.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    records: BTreeMap<RecordId, Record>,
}

impl DocumentIndex {
    pub fn new() -> Self { Self::default() }

    /// Inserts or replaces the record with the same id, returning the previous one.
    pub fn upsert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id, record)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    /// Iterates records matching `predicate` in id order.
    pub fn scan<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a Record> + 'a
    where
        F: Fn(&Record) -> bool + 'a,
    {
        self.records.values().filter(move |r| predicate(r))
    }

    /// Records matching `predicate`, oldest first (ties by id).
    pub fn list<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let mut out: Vec<Record> = self.scan(predicate).cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}
