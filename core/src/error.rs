use crate::RecordId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query was empty (or normalized to nothing).
    #[error("course is required")]
    InvalidQuery,

    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),

    /// A broken index invariant. Callers must treat this as fatal.
    #[error("index corruption: {0}")]
    IndexCorruption(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("malformed change feed at line {line}: {source}")]
    Feed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
