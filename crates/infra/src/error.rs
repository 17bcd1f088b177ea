//! Infrastructure and engine error types.

use thiserror::Error;

use palletflow_core::DomainError;

/// Failure of a storage or directory collaborator.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// missing referents). The engine never retries them; that belongs to the
/// backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Error returned by [`crate::LedgerEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::validation(msg))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Domain(DomainError::not_found(what))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
