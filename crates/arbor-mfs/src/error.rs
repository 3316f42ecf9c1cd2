use std::sync::Arc;

use arbor_encoding::EncodingError;
use arbor_store::{NodeKind, StoreError};

use crate::dir::Directory;

/// Errors from tree operations.
#[derive(Debug, thiserror::Error)]
pub enum MfsError {
    /// No entry by that name in the cache or the encoding.
    #[error("no entry named {0:?}")]
    NotFound(String),

    /// The target name already resolves. When the existing entry is a
    /// directory it is carried along for idempotent callers.
    #[error("entry {name:?} already exists")]
    AlreadyExists {
        name: String,
        existing: Option<Arc<Directory>>,
    },

    /// The entry has a recognized kind the tree layer does not handle.
    #[error("unsupported node kind: {0}")]
    Unsupported(NodeKind),

    /// The entry has an unrecognized kind or unexpected representation.
    #[error("invalid child node: {0}")]
    Invalid(String),

    /// Entry names must be non-empty, not `.` or `..`, and contain no `/`.
    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    /// A file offset or length that does not fit in memory.
    #[error("offset {offset} out of range for file {name:?}")]
    OffsetOutOfRange { name: String, offset: u64 },

    /// A path component that must be a directory is a file.
    #[error("{0:?} is not a directory")]
    NotADirectory(String),

    /// The entry's parent is gone, so a flush has nowhere to go.
    #[error("{0:?} is detached from its tree")]
    Detached(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(EncodingError),
}

impl From<EncodingError> for MfsError {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::NotFound(name) => Self::NotFound(name),
            EncodingError::Store(err) => Self::Store(err),
            other => Self::Encoding(other),
        }
    }
}

impl MfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// The existing directory carried by an `AlreadyExists` error.
    pub fn existing_directory(&self) -> Option<&Arc<Directory>> {
        match self {
            Self::AlreadyExists { existing, .. } => existing.as_ref(),
            _ => None,
        }
    }

    /// Recover the existing directory, or give the error back.
    pub fn into_existing_directory(self) -> Result<Arc<Directory>, Self> {
        match self {
            Self::AlreadyExists {
                existing: Some(dir),
                ..
            } => Ok(dir),
            other => Err(other),
        }
    }
}

/// Result alias for tree operations.
pub type MfsResult<T> = Result<T, MfsError>;
