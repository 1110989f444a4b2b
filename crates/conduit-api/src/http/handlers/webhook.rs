//! Webhook receiver handler for the REST API.
//!
//! Hands the raw body and headers to the webhook ingress, which
//! authenticates, extracts and delivers the execution inline. Any
//! well-formed, authenticated notification is acknowledged with 200, even
//! when it changes nothing.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::Serialize;

use conduit_core::reconcile::auth::RequestHeaders;
use conduit_core::reconcile::webhook::WebhookOutcome;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub trigger_id: String,
    /// `emitted`, `suppressed` or `ignored`.
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl WebhookAck {
    fn new(trigger_id: String, outcome: WebhookOutcome) -> Self {
        let (result, execution_id, reason) = match outcome {
            WebhookOutcome::Emitted { execution_id } => ("emitted", Some(execution_id), None),
            WebhookOutcome::Suppressed {
                execution_id,
                reason,
            } => ("suppressed", Some(execution_id), Some(reason.as_str())),
            WebhookOutcome::Ignored(reason) => ("ignored", None, Some(reason.as_str())),
        };
        Self {
            trigger_id,
            result,
            execution_id,
            reason,
        }
    }
}

/// Copy the request headers that can be read as UTF-8.
fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    RequestHeaders::from_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
    )
}

/// POST /api/v1/triggers/{trigger_id}/webhook - Receive a completion notification.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(trigger_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, AppError> {
    let clock = RequestClock::start();

    let outcome = state
        .ingress
        .handle(&trigger_id, &request_headers(&headers), &body)
        .await?;

    tracing::debug!(%trigger_id, ?outcome, "webhook handled");

    let checkpoint_link = format!("/api/v1/triggers/{trigger_id}/checkpoint");
    let resp = ApiResponse::success(WebhookAck::new(trigger_id, outcome), clock)
        .with_link("checkpoint", &checkpoint_link);
    Ok(Json(resp))
}
