//! In-memory checkpoint store.
//!
//! Nothing survives a restart. Backs `conduit poll --dry-run`, where a cycle
//! runs against a copy of the stored checkpoint and nothing is persisted.

use conduit_core::repository::checkpoint::CheckpointStore;
use conduit_types::error::RepositoryError;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: DashMap<String, Value>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, trigger_id: &str) -> Result<Option<Value>, RepositoryError> {
        Ok(self.entries.get(trigger_id).map(|v| v.value().clone()))
    }

    async fn set(&self, trigger_id: &str, value: &Value) -> Result<(), RepositoryError> {
        self.entries.insert(trigger_id.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, trigger_id: &str) -> Result<(), RepositoryError> {
        self.entries.remove(trigger_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get("t1").await.unwrap().is_none());

        store.set("t1", &json!({"lastExecutionId": "e1"})).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("t1").await.unwrap(),
            Some(json!({"lastExecutionId": "e1"}))
        );

        store.delete("t1").await.unwrap();
        assert!(store.is_empty());
    }
}
