//! Trigger listing and checkpoint inspection handlers.

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use conduit_types::checkpoint::Checkpoint;
use conduit_types::trigger::TriggerSpec;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerView {
    pub id: String,
    pub organization: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_identifier: Option<String>,
    pub status_filter: Vec<String>,
    pub listing_url: String,
    pub prefers_webhook: bool,
}

impl From<TriggerSpec> for TriggerView {
    fn from(spec: TriggerSpec) -> Self {
        let prefers_webhook = spec.prefers_webhook();
        Self {
            id: spec.id,
            organization: spec.organization,
            project: spec.project,
            pipeline_identifier: spec.pipeline_identifier,
            status_filter: spec.status_filter,
            listing_url: spec.listing_url,
            prefers_webhook,
        }
    }
}

/// Decoded checkpoint with the watermark also rendered as RFC 3339.
#[derive(Debug, Serialize)]
pub struct CheckpointView {
    pub trigger_id: String,
    pub last_execution_id: String,
    pub last_execution_ended_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_execution_ended_at_iso: Option<String>,
    pub timestampless_execution_ids: Vec<String>,
    pub poll_error_count: u32,
    pub server_filter_disabled: bool,
}

impl CheckpointView {
    pub fn new(trigger_id: &str, checkpoint: &Checkpoint) -> Self {
        let ended_at = checkpoint.last_execution_ended_at;
        Self {
            trigger_id: trigger_id.to_string(),
            last_execution_id: checkpoint.last_execution_id.clone(),
            last_execution_ended_at: ended_at,
            last_execution_ended_at_iso: (ended_at > 0)
                .then(|| DateTime::<Utc>::from_timestamp_millis(ended_at))
                .flatten()
                .map(|dt| dt.to_rfc3339()),
            timestampless_execution_ids: checkpoint
                .timestampless_execution_ids
                .iter()
                .map(str::to_string)
                .collect(),
            poll_error_count: checkpoint.poll_error_count,
            server_filter_disabled: checkpoint.server_filter_disabled,
        }
    }
}

/// GET /api/v1/triggers - List registered triggers.
pub async fn list_triggers(State(state): State<AppState>) -> Json<ApiResponse<Vec<TriggerView>>> {
    let clock = RequestClock::start();
    let triggers: Vec<TriggerView> = state
        .triggers
        .list()
        .into_iter()
        .map(TriggerView::from)
        .collect();
    Json(ApiResponse::success(triggers, clock))
}

/// GET /api/v1/triggers/{trigger_id}/checkpoint - Show the stored checkpoint.
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path(trigger_id): Path<String>,
) -> Result<Json<ApiResponse<CheckpointView>>, AppError> {
    let clock = RequestClock::start();

    if state.triggers.get(&trigger_id).is_none() {
        return Err(AppError::NotFound(format!("Trigger '{trigger_id}' not found")));
    }
    let checkpoint = state
        .engine
        .stored_checkpoint(&trigger_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No checkpoint for trigger '{trigger_id}'")))?;

    let resp = ApiResponse::success(CheckpointView::new(&trigger_id, &checkpoint), clock)
        .with_link("webhook", &format!("/api/v1/triggers/{trigger_id}/webhook"));
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_view_renders_watermark() {
        let mut checkpoint = Checkpoint::default();
        checkpoint.last_execution_id = "e1".to_string();
        checkpoint.last_execution_ended_at = 1_700_000_000_000;
        checkpoint.timestampless_execution_ids.insert("e0");

        let view = CheckpointView::new("t1", &checkpoint);
        assert_eq!(
            view.last_execution_ended_at_iso.as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
        assert_eq!(view.timestampless_execution_ids, vec!["e0".to_string()]);
    }

    #[test]
    fn test_zero_watermark_has_no_iso() {
        let view = CheckpointView::new("t1", &Checkpoint::default());
        assert!(view.last_execution_ended_at_iso.is_none());
    }
}
