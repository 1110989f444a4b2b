//! Execution summaries observed through either delivery path.
//!
//! An `ExecutionSummary` is transient: it is built from a webhook payload or a
//! polled listing item, consumed once, and never persisted. Timestamps stay in
//! their raw vendor encoding until the engine normalizes them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical execution status vocabulary.
///
/// Vendor strings are mapped onto the four terminal states; anything
/// unrecognized is kept (lower-cased) in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
    Aborted,
    Expired,
    Other(String),
}

impl ExecutionStatus {
    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Aborted => "aborted",
            ExecutionStatus::Expired => "expired",
            ExecutionStatus::Other(s) => s,
        }
    }

    /// True for the four terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Other(_))
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the canonical names only. Vendor vocabulary goes through
/// `conduit_core::reconcile::ordering::canonical_status`.
impl From<String> for ExecutionStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "succeeded" => ExecutionStatus::Succeeded,
            "failed" => ExecutionStatus::Failed,
            "aborted" => ExecutionStatus::Aborted,
            "expired" => ExecutionStatus::Expired,
            _ => ExecutionStatus::Other(s.to_lowercase()),
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(s: ExecutionStatus) -> Self {
        s.as_str().to_string()
    }
}

/// A single pipeline execution as reported by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub pipeline_identifier: String,
    /// Raw vendor status string.
    pub status: String,
    /// Raw start timestamp (epoch seconds/millis or textual).
    #[serde(default)]
    pub started_at: String,
    /// Raw end timestamp; empty while the execution is still running.
    #[serde(default)]
    pub ended_at: String,
    #[serde(default)]
    pub url: String,
}

impl ExecutionSummary {
    /// Build a summary with just an ID and raw status.
    pub fn new(execution_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn with_pipeline(mut self, pipeline_identifier: impl Into<String>) -> Self {
        self.pipeline_identifier = pipeline_identifier.into();
        self
    }

    pub fn with_started_at(mut self, started_at: impl Into<String>) -> Self {
        self.started_at = started_at.into();
        self
    }

    pub fn with_ended_at(mut self, ended_at: impl Into<String>) -> Self {
        self.ended_at = ended_at.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}
