use thiserror::Error;

/// Errors from repository operations (used by port definitions in conduit-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to secret lookups.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found")]
    NotFound,

    #[error("secret provider unavailable")]
    ProviderUnavailable,

    #[error("storage error: {0}")]
    StorageError(String),
}
