//! Checkpoint store trait.
//!
//! The store treats checkpoints as opaque JSON scoped to one trigger
//! instance. Decoding and merge rules belong to the engine.

use conduit_types::error::RepositoryError;

/// Key-value storage for per-trigger checkpoints.
///
/// No transactionality is assumed beyond the engine's in-process lock.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait CheckpointStore: Send + Sync {
    /// Get the stored checkpoint. Returns None if none was ever written.
    fn get(
        &self,
        trigger_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Store a checkpoint (upsert).
    fn set(
        &self,
        trigger_id: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a checkpoint. No-op if none exists.
    fn delete(
        &self,
        trigger_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
