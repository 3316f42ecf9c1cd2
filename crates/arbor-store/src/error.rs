use arbor_types::ObjectId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested node is not in the store.
    #[error("node not found: {0}")]
    NotFound(ObjectId),

    /// Payload encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The stored bytes do not decode as the kind they claim to be.
    #[error("corrupt node {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Attempted to write a node whose identity is null.
    #[error("cannot store node with null ID")]
    NullObjectId,

    /// The backend observed cancellation of the surrounding operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other backend failure, carried as text.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
