//! Trigger lifecycle: setup creates the zero checkpoint and starts polling,
//! teardown removes both.

use std::sync::Arc;
use std::time::Duration;

use conduit_types::trigger::TriggerSpec;

use super::emitter::EventEmitter;
use super::engine::{ReconcileEngine, ReconcileError};
use super::schedule::{POLL_ACTION, PollParams, PollScheduler};
use crate::repository::checkpoint::CheckpointStore;

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid trigger: {0}")]
    Invalid(String),

    #[error("trigger '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

pub struct TriggerManager<S, E, Sch> {
    engine: Arc<ReconcileEngine<S, E>>,
    scheduler: Arc<Sch>,
}

impl<S, E, Sch> TriggerManager<S, E, Sch>
where
    S: CheckpointStore,
    E: EventEmitter,
    Sch: PollScheduler,
{
    pub fn new(engine: Arc<ReconcileEngine<S, E>>, scheduler: Arc<Sch>) -> Self {
        Self { engine, scheduler }
    }

    /// Register a trigger and start its poll loop.
    ///
    /// An existing checkpoint is kept, so re-running setup after a restart
    /// resumes from the stored watermark.
    pub async fn setup(&self, spec: TriggerSpec) -> Result<(), TriggerError> {
        validate(&spec)?;

        {
            let _guard = self.engine.lock(&spec).await;
            if self.engine.stored_checkpoint(&spec.id).await?.is_none() {
                let zero = self.engine.load_checkpoint(&spec.id).await?;
                self.engine.save_checkpoint(&spec.id, &zero).await?;
                tracing::debug!(trigger_id = %spec.id, "created zero checkpoint");
            }
        }

        let trigger_id = spec.id.clone();
        self.engine.register(spec);
        self.scheduler
            .schedule(POLL_ACTION, PollParams::new(&trigger_id), Duration::ZERO)
            .await
            .map_err(ReconcileError::from)?;

        tracing::info!(trigger_id = %trigger_id, "trigger set up");
        Ok(())
    }

    /// Unregister a trigger, delete its checkpoint and cancel its poll.
    pub async fn teardown(&self, trigger_id: &str) -> Result<(), TriggerError> {
        let spec = self
            .engine
            .unregister(trigger_id)
            .ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))?;

        {
            let _guard = self.engine.lock(&spec).await;
            self.engine.delete_checkpoint(trigger_id).await?;
        }
        self.scheduler
            .cancel(trigger_id)
            .await
            .map_err(ReconcileError::from)?;

        tracing::info!(trigger_id, "trigger torn down");
        Ok(())
    }

    pub fn get(&self, trigger_id: &str) -> Option<TriggerSpec> {
        self.engine.trigger(trigger_id)
    }

    pub fn list(&self) -> Vec<TriggerSpec> {
        self.engine.triggers()
    }
}

fn validate(spec: &TriggerSpec) -> Result<(), TriggerError> {
    let required = [
        ("id", &spec.id),
        ("organization", &spec.organization),
        ("project", &spec.project),
        ("listing_url", &spec.listing_url),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(TriggerError::Invalid(format!("{field} must not be empty")));
        }
    }
    if spec.id.contains('/') {
        return Err(TriggerError::Invalid("id must not contain '/'".to_string()));
    }
    Ok(())
}
