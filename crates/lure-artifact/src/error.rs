//! Artifact store errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactState;
use crate::hash::ContentHash;

/// Errors from artifact store operations.
///
/// A duplicate target at commit time is not an error: it surfaces as
/// `Committed { duplicate: true, .. }`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage root is missing, unwritable or out of space.
    #[error("storage root {} unavailable: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A write, sync, rename or delete failed.
    #[error("I/O failure during {op} on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact is {0}; operation not permitted")]
    InvalidState(ArtifactState),

    #[error("no artifact stored for {0}")]
    NotFound(ContentHash),

    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for lookups of content that was never committed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for artifact store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StorageUnavailable { source, .. } | StoreError::Io { source, .. } => {
                source
            }
            StoreError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            StoreError::InvalidHash(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            StoreError::InvalidState(_) => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}
