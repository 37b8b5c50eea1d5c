//! Hybrid search over question-paper records.
//!
//! A query runs through three channels (fuzzy subsequence scoring, full-text AND
//! matching, and prefix matching on the last token) whose top hits are merged by
//! reciprocal rank fusion. Exact structured lookups back the duplicate check of the
//! approval workflow.

pub mod channel;
pub mod config;
pub mod document;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod feed;
pub mod fusion;
pub mod fuzzy;
pub mod index;
pub mod record;
pub mod tokenizer;

pub use channel::{Channel, Hit};
pub use config::EngineConfig;
pub use duplicates::DuplicateQuery;
pub use engine::{SearchEngine, SearchOptions};
pub use error::{Error, Result};
pub use feed::{read_events, ChangeEvent, ChangeOp};
pub use fusion::FusedHit;
pub use record::{Exam, Record, RecordId, RecordPatch};
