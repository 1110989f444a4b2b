//! Poll scheduling port.
//!
//! The scheduler is responsible for at most one in-flight poll per trigger;
//! the engine only ever asks for the next single-shot invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Action name the poll runner reschedules itself under.
pub const POLL_ACTION: &str = "poll";

/// Parameters carried by a scheduled poll action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollParams {
    pub trigger_id: String,
}

impl PollParams {
    pub fn new(trigger_id: impl Into<String>) -> Self {
        Self {
            trigger_id: trigger_id.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("failed to schedule {action}: {message}")]
    Rejected { action: String, message: String },
}

/// Single-shot delayed action scheduling.
pub trait PollScheduler: Send + Sync {
    /// Schedule `action` to run once after `delay`. Replaces any pending
    /// invocation for the same trigger.
    fn schedule(
        &self,
        action: &str,
        params: PollParams,
        delay: Duration,
    ) -> impl std::future::Future<Output = Result<(), ScheduleError>> + Send;

    /// Drop the pending invocation for a trigger, if any.
    fn cancel(
        &self,
        trigger_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ScheduleError>> + Send;
}
