use towerline_core::{ContractError, Domain, TransitionError};
use towerline_storage::StorageError;

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("decision not found: {id}")]
    NotFound { id: String },

    /// The decision changed since it was read (optimistic concurrency).
    #[error("decision {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("malformed row {id}: {message}")]
    MalformedRow { id: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cannot reassign a {from} decision to {to}")]
    InvalidReassign { from: Domain, to: Domain },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("persistence failure: {0}")]
    Storage(StorageError),

    #[error("fact source failure: {0}")]
    FactSource(String),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConcurrentConflict {
                id,
                expected_version,
                actual_version,
                ..
            } => EngineError::Conflict {
                id,
                expected: expected_version,
                actual: actual_version,
            },
            StorageError::RowNotFound { id, .. } => EngineError::NotFound { id },
            other => EngineError::Storage(other),
        }
    }
}
