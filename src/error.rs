use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failures of the record store. `Read`/`Corrupt` mean the persisted state
/// cannot be trusted and needs an operator; `Write`/`Encode` mean the
/// previous persisted state is still in place. `load` only ever returns
/// `Read` or `Corrupt`, including when creating a missing file fails.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode collection: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StorageError {
    pub fn is_read_failure(&self) -> bool {
        matches!(self, StorageError::Read { .. } | StorageError::Corrupt { .. })
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("movie {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Storage(StorageError),

    /// A mutation could not be committed; the persisted collection is unchanged.
    #[error("change was not persisted: {0}")]
    Persistence(#[source] StorageError),

    #[error("catalog lock poisoned")]
    LockPoisoned,
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        CatalogError::Storage(err)
    }
}
