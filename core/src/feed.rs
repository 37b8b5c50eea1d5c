use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::{Error, Result};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    SoftDelete,
}

/// One persisted change, always carrying the full record snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub record: Record,
}

/// A feed entry: an explicit event, or a bare record snapshot treated as an insert.
#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Event(ChangeEvent),
    Snapshot(Record),
}

impl From<Entry> for ChangeEvent {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Event(e) => e,
            Entry::Snapshot(record) => ChangeEvent { op: ChangeOp::Insert, record },
        }
    }
}

/// Parses a change feed: a JSON array, a single JSON object, or JSON Lines.
pub fn read_events<R: Read>(mut reader: R) -> Result<Vec<ChangeEvent>> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let trimmed = buf.trim_start();

    if trimmed.starts_with('[') {
        let entries: Vec<Entry> =
            serde_json::from_str(&buf).map_err(|source| Error::Feed { line: source.line(), source })?;
        return Ok(entries.into_iter().map(ChangeEvent::from).collect());
    }
    // A whole-document parse succeeds for one (possibly pretty-printed) object.
    if let Ok(entry) = serde_json::from_str::<Entry>(&buf) {
        return Ok(vec![entry.into()]);
    }

    let mut events = Vec::new();
    for (i, line) in buf.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: Entry = serde_json::from_str(line).map_err(|source| Error::Feed { line: i + 1, source })?;
        events.push(entry.into());
    }
    Ok(events)
}
