//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub triggers: usize,
    pub pending_polls: usize,
}

/// GET /api/v1/health
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Health>> {
    let clock = RequestClock::start();
    let health = Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        triggers: state.triggers.list().len(),
        pending_polls: state.scheduler.pending_count(),
    };
    Json(ApiResponse::success(health, clock))
}
