//! Error types for keygate storage collaborators

use thiserror::Error;

use crate::domain::AccountId;

/// Errors surfaced by account and token stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Account does not exist
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// A unique field (username, external id, access token) is already held
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// Backend could not be reached
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
