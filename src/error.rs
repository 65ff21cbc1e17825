//! Error types for the LifeLens engine

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the engine verbs
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Habit not found: {0}")]
    HabitNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid pet update: {0}")]
    InvalidPetUpdate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// True for the distinct not-found conditions a transport maps to 404
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::UserNotFound(_)
                | EngineError::HabitNotFound(_)
                | EngineError::GroupNotFound(_)
        )
    }
}

/// Errors raised by store collaborators
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Timestamp out of storable range: {0}")]
    TimestampOutOfRange(String),
}

/// Failures of the external text generator. Never leaves the nudge composer.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Text generation is disabled")]
    Disabled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generator returned HTTP {0}: {1}")]
    Status(u16, String),

    #[error("Malformed generator response: {0}")]
    Malformed(String),

    #[error("Generator timed out after {0:?}")]
    Timeout(Duration),
}
