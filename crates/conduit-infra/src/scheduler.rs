//! One-shot poll scheduling on `tokio-cron-scheduler`.
//!
//! Each `schedule()` call adds a single-shot job that fires the registered
//! poll callback after the requested delay. A trigger has at most one
//! pending job: rescheduling replaces it, `cancel()` removes it.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use conduit_core::reconcile::schedule::{POLL_ACTION, PollParams, PollScheduler, ScheduleError};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Callback invoked when a scheduled poll fires.
pub type PollCallback = Arc<dyn Fn(PollParams) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct CronPollScheduler {
    inner: RwLock<Option<JobScheduler>>,
    callback: OnceLock<PollCallback>,
    /// trigger_id -> pending job
    pending: DashMap<String, Uuid>,
}

impl CronPollScheduler {
    /// Create a scheduler (not yet started, no callback).
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            callback: OnceLock::new(),
            pending: DashMap::new(),
        }
    }

    /// Register the poll callback. Only the first registration takes effect.
    ///
    /// The callback usually captures the poll runner, which itself holds
    /// this scheduler.
    pub fn set_callback(&self, callback: PollCallback) -> bool {
        self.callback.set(callback).is_ok()
    }

    pub async fn start(&self) -> Result<(), ScheduleError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| ScheduleError::Unavailable(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| ScheduleError::Unavailable(e.to_string()))?;

        *self.inner.write().await = Some(scheduler);
        tracing::info!("poll scheduler started");
        Ok(())
    }

    /// Stop the scheduler and drop all pending polls.
    pub async fn stop(&self) -> Result<(), ScheduleError> {
        if let Some(mut scheduler) = self.inner.write().await.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| ScheduleError::Unavailable(e.to_string()))?;
            tracing::info!("poll scheduler stopped");
        }
        self.pending.clear();
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, trigger_id: &str) -> bool {
        self.pending.contains_key(trigger_id)
    }

    async fn running(&self) -> Result<JobScheduler, ScheduleError> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or_else(|| ScheduleError::Unavailable("scheduler not started".to_string()))
    }
}

impl Default for CronPollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler for CronPollScheduler {
    async fn schedule(
        &self,
        action: &str,
        params: PollParams,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        if action != POLL_ACTION {
            return Err(ScheduleError::Rejected {
                action: action.to_string(),
                message: "unknown action".to_string(),
            });
        }
        let callback = self
            .callback
            .get()
            .cloned()
            .ok_or_else(|| ScheduleError::Unavailable("no poll callback registered".to_string()))?;
        let scheduler = self.running().await?;

        let trigger_id = params.trigger_id.clone();
        let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
            let callback = Arc::clone(&callback);
            let params = params.clone();
            Box::pin(async move {
                callback(params).await;
            })
        })
        .map_err(|e| ScheduleError::Rejected {
            action: action.to_string(),
            message: e.to_string(),
        })?;

        let job_id = scheduler
            .add(job)
            .await
            .map_err(|e| ScheduleError::Unavailable(e.to_string()))?;

        if let Some(previous) = self.pending.insert(trigger_id.clone(), job_id) {
            // The previous job is usually the one currently running this call.
            if let Err(e) = scheduler.remove(&previous).await {
                tracing::debug!(%trigger_id, error = %e, "previous poll job already gone");
            }
        }

        tracing::debug!(%trigger_id, %job_id, delay_ms = delay.as_millis() as u64, "poll scheduled");
        Ok(())
    }

    async fn cancel(&self, trigger_id: &str) -> Result<(), ScheduleError> {
        let Some((_, job_id)) = self.pending.remove(trigger_id) else {
            return Ok(());
        };
        if let Ok(scheduler) = self.running().await {
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| ScheduleError::Unavailable(e.to_string()))?;
        }
        tracing::debug!(trigger_id, %job_id, "poll cancelled");
        Ok(())
    }
}

/// Scheduler for one-off cycles run from the CLI: remembers the requested
/// next poll without ever firing it.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: std::sync::Mutex<Option<(PollParams, Duration)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently requested poll, if any.
    pub fn next_requested(&self) -> Option<(PollParams, Duration)> {
        self.next.lock().ok().and_then(|next| next.clone())
    }
}

impl PollScheduler for ManualScheduler {
    async fn schedule(
        &self,
        _action: &str,
        params: PollParams,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        if let Ok(mut next) = self.next.lock() {
            *next = Some((params, delay));
        }
        Ok(())
    }

    async fn cancel(&self, trigger_id: &str) -> Result<(), ScheduleError> {
        if let Ok(mut next) = self.next.lock() {
            if next.as_ref().is_some_and(|(p, _)| p.trigger_id == trigger_id) {
                *next = None;
            }
        }
        Ok(())
    }
}
