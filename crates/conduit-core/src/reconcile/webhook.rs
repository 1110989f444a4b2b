//! Webhook ingress: authenticate, extract, and deliver one pushed execution.

use std::sync::Arc;

use conduit_types::event::DeliverySource;
use conduit_types::secret::SecretScope;
use secrecy::SecretString;

use super::auth::{AuthError, RequestHeaders, SecretHeaders, authorize};
use super::emitter::EventEmitter;
use super::engine::{DeliveryDecision, ReconcileEngine, ReconcileError, SuppressReason};
use super::extract::{extract_event, is_completion_event};
use super::ordering::canonical_status;
use crate::repository::checkpoint::CheckpointStore;
use crate::repository::secret::SecretProvider;

/// Why a well-formed, authenticated webhook was acknowledged without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotCompletionEvent,
    NonTerminalStatus,
    MissingExecutionId,
    /// The payload names a different pipeline than the trigger pins.
    OtherPipeline,
    /// Already covered by the checkpoint.
    AlreadySeen,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::NotCompletionEvent => "not_completion_event",
            IgnoreReason::NonTerminalStatus => "non_terminal_status",
            IgnoreReason::MissingExecutionId => "missing_execution_id",
            IgnoreReason::OtherPipeline => "other_pipeline",
            IgnoreReason::AlreadySeen => "already_seen",
        }
    }
}

/// Result of a successfully handled webhook. Always acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Emitted { execution_id: String },
    Suppressed {
        execution_id: String,
        reason: SuppressReason,
    },
    Ignored(IgnoreReason),
}

impl WebhookOutcome {
    pub fn status_code(&self) -> u16 {
        200
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("unknown trigger '{0}'")]
    UnknownTrigger(String),

    #[error("webhook secret is not configured")]
    SecretUnavailable,

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("malformed webhook body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl WebhookError {
    /// HTTP status the sender should see.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::UnknownTrigger(_) => 404,
            WebhookError::SecretUnavailable | WebhookError::Unauthorized(_) => 403,
            WebhookError::MalformedBody(_) => 400,
            WebhookError::Reconcile(_) => 500,
        }
    }
}

pub struct WebhookIngress<S, E, P> {
    engine: Arc<ReconcileEngine<S, E>>,
    secrets: P,
    header_names: SecretHeaders,
}

impl<S, E, P> WebhookIngress<S, E, P>
where
    S: CheckpointStore,
    E: EventEmitter,
    P: SecretProvider,
{
    pub fn new(engine: Arc<ReconcileEngine<S, E>>, secrets: P) -> Self {
        let header_names = SecretHeaders {
            vendor_header: engine.config().vendor_secret_header.clone(),
            api_key_header: engine.config().api_key_header.clone(),
        };
        Self {
            engine,
            secrets,
            header_names,
        }
    }

    /// Handle one inbound notification for `trigger_id`.
    ///
    /// Nothing is mutated unless the request authenticates and parses. At
    /// most one checkpoint write and one emission happen per call.
    pub async fn handle(
        &self,
        trigger_id: &str,
        headers: &RequestHeaders,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let spec = self
            .engine
            .trigger(trigger_id)
            .ok_or_else(|| WebhookError::UnknownTrigger(trigger_id.to_string()))?;

        let expected = self.resolve_secret(trigger_id, spec.secret_key()).await?;
        authorize(headers, &expected, &self.header_names).inspect_err(|e| {
            tracing::warn!(trigger_id, error = %e, "rejected webhook");
        })?;

        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(WebhookError::MalformedBody)?;
        let event = extract_event(&payload);
        let execution = event.execution;

        if !is_completion_event(&event.event_type) {
            tracing::debug!(trigger_id, event_type = %event.event_type, "ignoring non-completion event");
            return Ok(WebhookOutcome::Ignored(IgnoreReason::NotCompletionEvent));
        }
        if !canonical_status(&execution.status).is_terminal() {
            tracing::debug!(trigger_id, status = %execution.status, "ignoring non-terminal status");
            return Ok(WebhookOutcome::Ignored(IgnoreReason::NonTerminalStatus));
        }
        if execution.execution_id.is_empty() {
            tracing::debug!(trigger_id, "ignoring completion event without execution id");
            return Ok(WebhookOutcome::Ignored(IgnoreReason::MissingExecutionId));
        }
        if let Some(pinned) = spec.pipeline_identifier.as_deref().filter(|p| !p.is_empty()) {
            if !execution.pipeline_identifier.is_empty() && execution.pipeline_identifier != pinned
            {
                return Ok(WebhookOutcome::Ignored(IgnoreReason::OtherPipeline));
            }
        }

        let _guard = self.engine.lock(&spec).await;
        let mut checkpoint = self.engine.load_checkpoint(trigger_id).await?;

        let decision = match self.engine.decide(&spec, &checkpoint, &execution) {
            DeliveryDecision::Stale | DeliveryDecision::Suppress(SuppressReason::WatermarkRefresh) => {
                tracing::debug!(
                    trigger_id,
                    execution_id = %execution.execution_id,
                    "webhook execution already covered by checkpoint"
                );
                return Ok(WebhookOutcome::Ignored(IgnoreReason::AlreadySeen));
            }
            decision => decision,
        };

        self.engine
            .apply(
                &spec,
                &mut checkpoint,
                &execution,
                decision,
                DeliverySource::Webhook,
            )
            .await?;
        self.engine.save_checkpoint(trigger_id, &checkpoint).await?;

        let execution_id = execution.execution_id;
        Ok(match decision {
            DeliveryDecision::Suppress(reason) => WebhookOutcome::Suppressed {
                execution_id,
                reason,
            },
            _ => WebhookOutcome::Emitted { execution_id },
        })
    }

    async fn resolve_secret(
        &self,
        trigger_id: &str,
        key: &str,
    ) -> Result<SecretString, WebhookError> {
        let scope = SecretScope::Trigger(trigger_id.to_string());
        match self.secrets.get(key, &scope).await {
            Ok(Some(secret)) if !secret.is_empty() => Ok(SecretString::from(secret)),
            Ok(_) => {
                tracing::warn!(trigger_id, key, "webhook secret not configured");
                Err(WebhookError::SecretUnavailable)
            }
            Err(e) => {
                tracing::warn!(trigger_id, key, error = %e, "webhook secret lookup failed");
                Err(WebhookError::SecretUnavailable)
            }
        }
    }
}
