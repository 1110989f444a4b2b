//! The reconciliation engine shared by both ingress paths.
//!
//! `ReconcileEngine` owns the trigger registry, the lock shards and the two
//! outbound ports (checkpoint store and event emitter). Webhook ingress and
//! the poll runner both funnel every execution through `decide()` and
//! `apply()` while holding the trigger's lock, so emission and checkpoint
//! advancement follow one set of rules regardless of delivery path.

use conduit_types::checkpoint::Checkpoint;
use conduit_types::config::EngineConfig;
use conduit_types::error::RepositoryError;
use conduit_types::event::{COMPLETION_EVENT_TYPE, CompletionEvent, DeliverySource};
use conduit_types::execution::ExecutionSummary;
use conduit_types::trigger::TriggerSpec;
use dashmap::DashMap;
use tokio::sync::MutexGuard;

use super::emitter::{EmitError, EventEmitter};
use super::listing::ListError;
use super::lock::KeyedLocks;
use super::ordering::{
    canonical_status, is_newer, is_watermark_refresh, ordering_timestamp, status_allowed,
    update_checkpoint,
};
use super::schedule::ScheduleError;
use super::timestamp::normalize_timestamp;
use crate::repository::checkpoint::CheckpointStore;

/// Errors that abort a delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("stored checkpoint for trigger '{trigger_id}' could not be decoded: {source}")]
    CheckpointDecode {
        trigger_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint persistence failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("event emission failed: {0}")]
    Emit(#[from] EmitError),

    #[error("execution listing failed: {0}")]
    Listing(#[from] ListError),

    #[error("poll scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("unknown trigger '{0}'")]
    UnknownTrigger(String),
}

/// Why an execution advances the checkpoint without being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Fails the trigger's status allow-list.
    StatusFiltered,
    /// First seen timestampless and already handled; now carries a timestamp.
    AlreadyEmitted,
    /// The checkpointed execution reappeared with a later timestamp.
    WatermarkRefresh,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::StatusFiltered => "status_filtered",
            SuppressReason::AlreadyEmitted => "already_emitted",
            SuppressReason::WatermarkRefresh => "watermark_refresh",
        }
    }
}

/// What to do with one execution, given the current checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// Already covered by the checkpoint; leave everything untouched.
    Stale,
    /// Emit downstream, then advance the checkpoint.
    Emit,
    /// Advance the checkpoint only.
    Suppress(SuppressReason),
}

impl DeliveryDecision {
    pub fn mutates_checkpoint(&self) -> bool {
        !matches!(self, DeliveryDecision::Stale)
    }
}

pub struct ReconcileEngine<S, E> {
    store: S,
    emitter: E,
    locks: KeyedLocks,
    config: EngineConfig,
    triggers: DashMap<String, TriggerSpec>,
}

impl<S, E> ReconcileEngine<S, E>
where
    S: CheckpointStore,
    E: EventEmitter,
{
    pub fn new(store: S, emitter: E, config: EngineConfig) -> Self {
        Self {
            store,
            emitter,
            locks: KeyedLocks::new(config.lock_shards),
            config,
            triggers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    // -----------------------------------------------------------------------
    // Trigger registry
    // -----------------------------------------------------------------------

    /// Register (or replace) a trigger spec.
    pub fn register(&self, spec: TriggerSpec) {
        self.triggers.insert(spec.id.clone(), spec);
    }

    pub fn unregister(&self, trigger_id: &str) -> Option<TriggerSpec> {
        self.triggers.remove(trigger_id).map(|(_, spec)| spec)
    }

    pub fn trigger(&self, trigger_id: &str) -> Option<TriggerSpec> {
        self.triggers.get(trigger_id).map(|entry| entry.value().clone())
    }

    /// All registered triggers, ordered by ID.
    pub fn triggers(&self) -> Vec<TriggerSpec> {
        let mut specs: Vec<TriggerSpec> = self
            .triggers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        specs.sort_by(|a, b| a.id.cmp(&b.id));
        specs
    }

    // -----------------------------------------------------------------------
    // Checkpoint persistence
    // -----------------------------------------------------------------------

    /// Load and decode the stored checkpoint, or `None` if never written.
    pub async fn stored_checkpoint(
        &self,
        trigger_id: &str,
    ) -> Result<Option<Checkpoint>, ReconcileError> {
        let Some(raw) = self.store.get(trigger_id).await? else {
            return Ok(None);
        };
        let mut checkpoint: Checkpoint =
            serde_json::from_value(raw).map_err(|source| ReconcileError::CheckpointDecode {
                trigger_id: trigger_id.to_string(),
                source,
            })?;
        checkpoint
            .timestampless_execution_ids
            .set_capacity(self.config.dedup_capacity);
        Ok(Some(checkpoint))
    }

    /// Load the checkpoint, falling back to the zero value.
    pub async fn load_checkpoint(&self, trigger_id: &str) -> Result<Checkpoint, ReconcileError> {
        Ok(self
            .stored_checkpoint(trigger_id)
            .await?
            .unwrap_or_else(|| Checkpoint::with_dedup_capacity(self.config.dedup_capacity)))
    }

    pub async fn save_checkpoint(
        &self,
        trigger_id: &str,
        checkpoint: &Checkpoint,
    ) -> Result<(), ReconcileError> {
        let value = serde_json::to_value(checkpoint).map_err(|source| ReconcileError::Encode {
            what: "checkpoint",
            source,
        })?;
        self.store.set(trigger_id, &value).await?;
        Ok(())
    }

    pub async fn delete_checkpoint(&self, trigger_id: &str) -> Result<(), ReconcileError> {
        self.store.delete(trigger_id).await?;
        Ok(())
    }

    /// Acquire the lock serializing checkpoint mutation for this trigger's key.
    pub async fn lock(&self, spec: &TriggerSpec) -> MutexGuard<'_, ()> {
        self.locks.lock(&spec.lock_key()).await
    }

    /// Locked read-modify-write of bookkeeping fields. Returns the saved value.
    pub async fn modify_checkpoint<F>(
        &self,
        spec: &TriggerSpec,
        modify: F,
    ) -> Result<Checkpoint, ReconcileError>
    where
        F: FnOnce(&mut Checkpoint) + Send,
    {
        let _guard = self.lock(spec).await;
        let mut checkpoint = self.load_checkpoint(&spec.id).await?;
        modify(&mut checkpoint);
        self.save_checkpoint(&spec.id, &checkpoint).await?;
        Ok(checkpoint)
    }

    // -----------------------------------------------------------------------
    // Delivery rules
    // -----------------------------------------------------------------------

    /// Classify one execution against the current checkpoint.
    pub fn decide(
        &self,
        spec: &TriggerSpec,
        checkpoint: &Checkpoint,
        execution: &ExecutionSummary,
    ) -> DeliveryDecision {
        if !is_newer(checkpoint, execution) {
            return if is_watermark_refresh(checkpoint, execution) {
                DeliveryDecision::Suppress(SuppressReason::WatermarkRefresh)
            } else {
                DeliveryDecision::Stale
            };
        }

        if ordering_timestamp(execution) > 0
            && checkpoint
                .timestampless_execution_ids
                .contains(&execution.execution_id)
        {
            return DeliveryDecision::Suppress(SuppressReason::AlreadyEmitted);
        }

        if !status_allowed(&spec.status_filter, &canonical_status(&execution.status)) {
            return DeliveryDecision::Suppress(SuppressReason::StatusFiltered);
        }

        DeliveryDecision::Emit
    }

    /// Carry out a decision: emit first (if any), then merge into `checkpoint`.
    ///
    /// The caller persists the checkpoint afterwards. On emission failure the
    /// checkpoint is left untouched.
    pub async fn apply(
        &self,
        spec: &TriggerSpec,
        checkpoint: &mut Checkpoint,
        execution: &ExecutionSummary,
        decision: DeliveryDecision,
        source: DeliverySource,
    ) -> Result<(), ReconcileError> {
        match decision {
            DeliveryDecision::Stale => return Ok(()),
            DeliveryDecision::Emit => {
                let event = completion_event(spec, execution, source);
                let payload =
                    serde_json::to_value(&event).map_err(|source| ReconcileError::Encode {
                        what: "completion event",
                        source,
                    })?;
                self.emitter.emit(COMPLETION_EVENT_TYPE, payload).await?;
                tracing::info!(
                    trigger_id = %spec.id,
                    execution_id = %execution.execution_id,
                    status = %event.status,
                    source = %source,
                    "emitted completion event"
                );
            }
            DeliveryDecision::Suppress(reason) => {
                tracing::debug!(
                    trigger_id = %spec.id,
                    execution_id = %execution.execution_id,
                    ?reason,
                    source = %source,
                    "suppressed emission, advancing checkpoint"
                );
            }
        }
        update_checkpoint(checkpoint, execution);
        Ok(())
    }
}

/// Build the downstream payload for an execution.
pub fn completion_event(
    spec: &TriggerSpec,
    execution: &ExecutionSummary,
    source: DeliverySource,
) -> CompletionEvent {
    let pipeline_identifier = if execution.pipeline_identifier.is_empty() {
        spec.pipeline_identifier.clone().unwrap_or_default()
    } else {
        execution.pipeline_identifier.clone()
    };
    CompletionEvent {
        trigger_id: spec.id.clone(),
        execution_id: execution.execution_id.clone(),
        pipeline_identifier,
        status: canonical_status(&execution.status),
        raw_status: execution.status.clone(),
        started_at: normalize_timestamp(&execution.started_at),
        ended_at: normalize_timestamp(&execution.ended_at),
        url: execution.url.clone(),
        source,
    }
}
