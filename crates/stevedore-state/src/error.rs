//! Error types for the coordination store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during coordination store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Operation rejected because of a mode mismatch (the 409 of the
    /// command surface), e.g. a cache refresh while caching is disabled.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The leadership lock is held by another scheduler instance.
    #[error("leadership lock for {service} held by {holder}")]
    LockContended { service: String, holder: uuid::Uuid },
}
