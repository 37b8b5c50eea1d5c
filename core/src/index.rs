use std::collections::{BTreeMap, HashMap};

use crate::record::RecordId;
use crate::tokenizer::tokenize;

pub type TermId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub record_id: RecordId,
    pub frequency: u32,
    /// Token positions within the record's searchable text.
    pub positions: Vec<u32>,
}

#[derive(Debug, Default)]
struct DocEntry {
    terms: Vec<TermId>,
    length: u32,
    /// Searchable text as indexed, scored directly by the fuzzy channel.
    text: String,
}

/// Inverted index from normalized tokens to postings, maintained one record at a time.
///
/// The dictionary is ordered so prefix lookups are a range scan. Terms whose postings
/// become empty are dropped from the dictionary.
#[derive(Debug, Default)]
pub struct TokenIndex {
    dictionary: BTreeMap<String, TermId>,
    postings: HashMap<TermId, Vec<Posting>>, // postings sorted by record_id
    docs: HashMap<RecordId, DocEntry>,
    next_term_id: TermId,
}

impl TokenIndex {
    pub fn new() -> Self { Self::default() }

    /// Replaces every posting of `id` with postings for `text`.
    pub fn index_record(&mut self, id: RecordId, text: &str) {
        self.remove_record(id);

        let tokens = tokenize(text);
        let length = tokens.len() as u32;
        let mut positions: HashMap<TermId, Vec<u32>> = HashMap::new();
        for (term, pos) in tokens {
            let tid = match self.dictionary.get(&term) {
                Some(&tid) => tid,
                None => {
                    let tid = self.next_term_id;
                    self.next_term_id += 1;
                    self.dictionary.insert(term, tid);
                    tid
                }
            };
            positions.entry(tid).or_default().push(pos as u32);
        }

        let mut terms = Vec::with_capacity(positions.len());
        for (tid, pos) in positions {
            let plist = self.postings.entry(tid).or_default();
            let posting = Posting { record_id: id, frequency: pos.len() as u32, positions: pos };
            let at = plist.partition_point(|p| p.record_id < id);
            plist.insert(at, posting);
            terms.push(tid);
        }
        self.docs.insert(id, DocEntry { terms, length, text: text.to_owned() });
    }

    /// Drops every posting of `id`. Returns false when the record had none.
    pub fn remove_record(&mut self, id: RecordId) -> bool {
        let Some(entry) = self.docs.remove(&id) else { return false };
        let mut emptied = Vec::new();
        for tid in entry.terms {
            if let Some(plist) = self.postings.get_mut(&tid) {
                if let Ok(at) = plist.binary_search_by_key(&id, |p| p.record_id) {
                    plist.remove(at);
                }
                if plist.is_empty() {
                    self.postings.remove(&tid);
                    emptied.push(tid);
                }
            }
        }
        if !emptied.is_empty() {
            self.dictionary.retain(|_, tid| !emptied.contains(tid));
        }
        true
    }

    pub fn postings(&self, token: &str) -> &[Posting] {
        self.dictionary
            .get(token)
            .and_then(|tid| self.postings.get(tid))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every (token, postings) pair whose token starts with `prefix`.
    pub fn prefix_postings<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [Posting])> + 'a {
        self.dictionary
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(term, _)| term.starts_with(prefix))
            .filter_map(move |(term, tid)| self.postings.get(tid).map(|p| (term.as_str(), p.as_slice())))
    }

    /// Total token count of the record's text, if indexed.
    pub fn doc_len(&self, id: RecordId) -> Option<u32> {
        self.docs.get(&id).map(|d| d.length)
    }

    /// The text the record was last indexed with.
    pub fn text(&self, id: RecordId) -> Option<&str> {
        self.docs.get(&id).map(|d| d.text.as_str())
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.docs.contains_key(&id)
    }

    pub fn record_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.docs.keys().copied()
    }

    /// Every record id referenced by some posting.
    pub fn posted_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.postings.values().flat_map(|plist| plist.iter().map(|p| p.record_id))
    }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn num_docs(&self) -> usize { self.docs.len() }
}
