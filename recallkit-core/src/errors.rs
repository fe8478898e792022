use crate::{Algo, DeckId};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("algorithm mismatch: expected {expected}, found {found}")]
    AlgoMismatch { expected: Algo, found: Algo },
    #[error("slot conflict: key {key} in card source {source_id}")]
    SlotConflict { source_id: String, key: String },
    #[error("deck parent chain is malformed at {0}")]
    CycleDetected(DeckId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::TaskJoin(err.to_string())
    }
}
