//! SQLite checkpoint store.
//!
//! Implements `CheckpointStore` from `conduit-core`. Checkpoints are stored
//! as JSON text and handed back as an opaque `serde_json::Value`.

use chrono::Utc;
use conduit_core::repository::checkpoint::CheckpointStore;
use conduit_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, trigger_id: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT checkpoint FROM trigger_checkpoints WHERE trigger_id = ?")
            .bind(trigger_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let text: String = row
            .try_get("checkpoint")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RepositoryError::Query(format!("invalid checkpoint JSON: {e}")))
    }

    async fn set(&self, trigger_id: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let text = serde_json::to_string(value)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize checkpoint: {e}")))?;

        sqlx::query(
            r#"INSERT INTO trigger_checkpoints (trigger_id, checkpoint, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (trigger_id) DO UPDATE SET checkpoint = excluded.checkpoint, updated_at = excluded.updated_at"#,
        )
        .bind(trigger_id)
        .bind(&text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, trigger_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM trigger_checkpoints WHERE trigger_id = ?")
            .bind(trigger_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use serde_json::json;

    async fn store() -> (tempfile::TempDir, SqliteCheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        (dir, SqliteCheckpointStore::new(pool))
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_dir, store) = store().await;
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_dir, store) = store().await;
        let value = json!({"lastExecutionId": "exec-1", "lastExecutionEndedAt": 1_700_000_000_000_i64});
        store.set("t1", &value).await.unwrap();
        assert_eq!(store.get("t1").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_set_upserts() {
        let (_dir, store) = store().await;
        store.set("t1", &json!({"pollErrorCount": 1})).await.unwrap();
        store.set("t1", &json!({"pollErrorCount": 2})).await.unwrap();
        assert_eq!(
            store.get("t1").await.unwrap(),
            Some(json!({"pollErrorCount": 2}))
        );
    }

    #[tokio::test]
    async fn test_triggers_are_isolated() {
        let (_dir, store) = store().await;
        store.set("t1", &json!({"a": 1})).await.unwrap();
        store.set("t2", &json!({"a": 2})).await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
        assert_eq!(store.get("t2").await.unwrap(), Some(json!({"a": 2})));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (_dir, store) = store().await;
        store.delete("never-written").await.unwrap();
    }
}
