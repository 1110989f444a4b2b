//! Downstream completion events handed to the workflow engine.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionStatus;

/// Event type string for a completed pipeline execution.
pub const COMPLETION_EVENT_TYPE: &str = "pipeline.execution.completed";

/// Which ingress path delivered an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverySource {
    Webhook,
    Poll,
}

impl std::fmt::Display for DeliverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliverySource::Webhook => write!(f, "webhook"),
            DeliverySource::Poll => write!(f, "poll"),
        }
    }
}

/// Payload of a `pipeline.execution.completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub trigger_id: String,
    pub execution_id: String,
    pub pipeline_identifier: String,
    /// Canonical status.
    pub status: ExecutionStatus,
    /// Status exactly as the vendor reported it.
    pub raw_status: String,
    /// Normalized start time in epoch milliseconds (0 if unknown).
    pub started_at: i64,
    /// Normalized end time in epoch milliseconds (0 if unknown).
    pub ended_at: i64,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub url: String,
    pub source: DeliverySource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_event_serializes_canonical_status() {
        let event = CompletionEvent {
            trigger_id: "t1".to_string(),
            execution_id: "exec-1".to_string(),
            pipeline_identifier: "deploy".to_string(),
            status: ExecutionStatus::Succeeded,
            raw_status: "SUCCESS".to_string(),
            started_at: 0,
            ended_at: 1_700_000_000_000,
            url: String::new(),
            source: DeliverySource::Poll,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["raw_status"], "SUCCESS");
        assert_eq!(value["source"], "poll");
        assert!(value.get("url").is_none());
    }
}
