use arbor_store::{NodeKind, StoreError};
use arbor_types::ObjectId;

/// Errors from directory encoding operations.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// No link with this name exists in the table.
    #[error("no link named {0:?}")]
    NotFound(String),

    /// Shard fan-out must be a power of two in `2..=1024`.
    #[error("invalid shard fan-out {0}: must be a power of two between 2 and 1024")]
    InvalidFanout(usize),

    /// A node of this kind cannot back a directory or leaf.
    #[error("node {id} has kind {kind}, expected {expected}")]
    UnexpectedKind {
        id: ObjectId,
        kind: NodeKind,
        expected: &'static str,
    },

    /// Payload does not decode.
    #[error("corrupt node {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    /// Two names hash identically across the whole shard key.
    #[error("shard key space exhausted for {0:?}")]
    KeySpaceExhausted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for encoding operations.
pub type EncodingResult<T> = Result<T, EncodingError>;
