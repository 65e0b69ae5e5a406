use indexmap::IndexMap;

use crate::{collection::Collection, models::write::ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
    #[error("unknown database: {0}")]
    UnknownDatabase(String),
    #[error("unknown collection: {database}/{collection}")]
    UnknownCollection { database: String, collection: String },
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
}

impl StorageError {
    /// True for failures that mean the durable write did not happen.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            StorageError::IOError(_) | StorageError::Serialization(_) | StorageError::Other(_)
        )
    }
}

/// Every collection of one logical database, keyed by collection name.
pub type DatabaseState = IndexMap<String, Collection>;

/// Durable home of one logical database.
///
/// A backend only moves whole states in and out; all merge rules live in
/// [`crate::Database`], which is the sole caller and serializes writes.
pub trait StorageBackend: Send + Sync {
    /// Returns the last persisted state, or `None` if nothing was written yet.
    fn load(&self) -> Result<Option<DatabaseState>, StorageError>;

    /// Durably writes `state`. `changed` names the collection that was
    /// mutated, for backends that can write less than the whole state.
    /// Must not return before the data is on stable storage.
    fn persist(&self, state: &DatabaseState, changed: &str) -> Result<(), StorageError>;

    /// Short human-readable location, used in logs.
    fn describe(&self) -> String;
}
