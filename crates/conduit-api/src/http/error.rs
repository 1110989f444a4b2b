//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use conduit_core::reconcile::engine::ReconcileError;
use conduit_core::reconcile::webhook::WebhookError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Webhook(WebhookError),
    Reconcile(ReconcileError),
    NotFound(String),
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Webhook(e)
    }
}

impl From<ReconcileError> for AppError {
    fn from(e: ReconcileError) -> Self {
        AppError::Reconcile(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Webhook(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let code = match e {
                    WebhookError::UnknownTrigger(_) => "TRIGGER_NOT_FOUND",
                    WebhookError::SecretUnavailable | WebhookError::Unauthorized(_) => "FORBIDDEN",
                    WebhookError::MalformedBody(_) => "MALFORMED_BODY",
                    WebhookError::Reconcile(_) => "RECONCILE_ERROR",
                };
                (status, code, e.to_string())
            }
            AppError::Reconcile(ReconcileError::UnknownTrigger(id)) => (
                StatusCode::NOT_FOUND,
                "TRIGGER_NOT_FOUND",
                format!("Trigger '{id}' not found"),
            ),
            AppError::Reconcile(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RECONCILE_ERROR",
                e.to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string());
        let mut response = body.into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::reconcile::auth::AuthError;

    #[test]
    fn test_webhook_errors_keep_their_status() {
        let cases = [
            (WebhookError::UnknownTrigger("t1".into()), StatusCode::NOT_FOUND),
            (WebhookError::SecretUnavailable, StatusCode::FORBIDDEN),
            (
                WebhookError::Unauthorized(AuthError::InvalidCredential),
                StatusCode::FORBIDDEN,
            ),
        ];
        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_malformed_body_is_400() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let response = AppError::from(WebhookError::MalformedBody(source)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found() {
        let response = AppError::NotFound("no checkpoint".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
