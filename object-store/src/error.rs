use std::error::Error;

use serde_json::error::Error as SerdeError;
use thiserror::Error;

use crate::store::types::ObjectId;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(ObjectId),

    #[error("{0}")]
    Invalid(String),

    #[error("object exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The chunks of an object do not add up to what its manifest declares.
    #[error("integrity failure in object {id}: {reason}")]
    Integrity { id: ObjectId, reason: String },

    #[error("storage I/O failure: {0}")]
    Io(#[source] Box<dyn Error + Send + Sync>),

    #[error("manifest database failure")]
    Rocks(#[from] rocksdb::Error),

    #[error("failed to encode or decode a manifest")]
    Json(#[from] SerdeError),
}

impl StoreError {
    pub fn io(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        StoreError::Io(err.into())
    }

    pub fn integrity(id: ObjectId, reason: impl Into<String>) -> Self {
        StoreError::Integrity { id, reason: reason.into() }
    }

    /// Whether the failure was caused by the request rather than by the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::Invalid(_) | StoreError::TooLarge { .. }
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}
