//! Polling fallback: page the remote listing, find the unseen window, replay.
//!
//! Each invocation is one single-shot cycle. The runner schedules the next
//! cycle before returning, whatever the outcome.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use conduit_types::checkpoint::Checkpoint;
use conduit_types::event::DeliverySource;
use conduit_types::execution::ExecutionSummary;
use conduit_types::trigger::TriggerSpec;

use super::arbiter::{Arbitration, RaceWindowArbiter};
use super::emitter::EventEmitter;
use super::engine::{DeliveryDecision, ReconcileEngine, ReconcileError};
use super::listing::{ExecutionLister, ListError};
use super::ordering::{
    is_newer, is_terminal, is_watermark_refresh, ordering_timestamp, sort_newest_first,
    sort_oldest_first,
};
use super::schedule::{POLL_ACTION, PollParams, PollScheduler};
use super::timestamp::normalize_timestamp;
use crate::repository::checkpoint::CheckpointStore;

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Items returned by the remote API across all pages.
    pub fetched: usize,
    /// Items in the unseen window.
    pub collected: usize,
    pub emitted: usize,
    /// Items that advanced the checkpoint without an emission.
    pub suppressed: usize,
    /// Execution at which processing stopped for the race window.
    pub deferred: Option<String>,
    /// Whether this cycle ran without the server-side identifier filter.
    pub filter_disabled: bool,
}

struct Window {
    executions: Vec<ExecutionSummary>,
    fetched: usize,
}

pub struct PollRunner<S, E, L, Sch> {
    engine: Arc<ReconcileEngine<S, E>>,
    lister: L,
    scheduler: Arc<Sch>,
    arbiter: RaceWindowArbiter,
}

impl<S, E, L, Sch> PollRunner<S, E, L, Sch>
where
    S: CheckpointStore,
    E: EventEmitter,
    L: ExecutionLister,
    Sch: PollScheduler,
{
    pub fn new(engine: Arc<ReconcileEngine<S, E>>, lister: L, scheduler: Arc<Sch>) -> Self {
        let arbiter = RaceWindowArbiter::new(engine.config().race_window());
        Self {
            engine,
            lister,
            scheduler,
            arbiter,
        }
    }

    /// Run one cycle against the wall clock.
    pub async fn run(&self, params: &PollParams) -> Result<PollReport, ReconcileError> {
        self.run_at(params, Utc::now().timestamp_millis()).await
    }

    /// Run one cycle as of `now_ms`, then schedule the next one.
    ///
    /// The next cycle is scheduled on success, failure and deferral alike.
    /// Only a trigger that is no longer registered stops the loop.
    pub async fn run_at(
        &self,
        params: &PollParams,
        now_ms: i64,
    ) -> Result<PollReport, ReconcileError> {
        let Some(spec) = self.engine.trigger(&params.trigger_id) else {
            tracing::info!(trigger_id = %params.trigger_id, "poll for unregistered trigger, stopping");
            return Err(ReconcileError::UnknownTrigger(params.trigger_id.clone()));
        };

        let result = self.poll_cycle(&spec, now_ms).await;

        if self.engine.trigger(&spec.id).is_some() {
            let interval = self.engine.config().poll_interval();
            if let Err(e) = self
                .scheduler
                .schedule(POLL_ACTION, params.clone(), interval)
                .await
            {
                tracing::error!(trigger_id = %spec.id, error = %e, "failed to reschedule poll");
                if result.is_ok() {
                    return Err(e.into());
                }
            }
        }

        match &result {
            Ok(report) => tracing::debug!(
                trigger_id = %spec.id,
                fetched = report.fetched,
                collected = report.collected,
                emitted = report.emitted,
                suppressed = report.suppressed,
                deferred = ?report.deferred,
                "poll cycle complete"
            ),
            Err(e) => tracing::debug!(trigger_id = %spec.id, error = %e, "poll cycle failed"),
        }
        result
    }

    async fn poll_cycle(
        &self,
        spec: &TriggerSpec,
        now_ms: i64,
    ) -> Result<PollReport, ReconcileError> {
        let checkpoint = self.engine.load_checkpoint(&spec.id).await?;
        let mut filter_disabled = checkpoint.server_filter_disabled;
        let filter = server_filter(spec, filter_disabled);

        let window = match self.fetch_window(spec, &checkpoint, filter).await {
            Ok(window) => window,
            Err(e) if filter.is_some() && e.is_filter_unsupported() => {
                tracing::info!(
                    trigger_id = %spec.id,
                    error = %e,
                    "remote API rejected identifier filter, falling back to client-side filtering"
                );
                self.engine
                    .modify_checkpoint(spec, |cp| cp.server_filter_disabled = true)
                    .await?;
                filter_disabled = true;
                match self.fetch_window(spec, &checkpoint, None).await {
                    Ok(window) => window,
                    Err(e) => return Err(self.record_failure(spec, e).await),
                }
            }
            Err(e) => return Err(self.record_failure(spec, e).await),
        };

        if checkpoint.poll_error_count > 0 {
            self.engine
                .modify_checkpoint(spec, |cp| cp.poll_error_count = 0)
                .await?;
            tracing::info!(
                trigger_id = %spec.id,
                previous_errors = checkpoint.poll_error_count,
                "poll recovered"
            );
        }

        let mut report = PollReport {
            fetched: window.fetched,
            collected: window.executions.len(),
            filter_disabled,
            ..Default::default()
        };
        self.replay(spec, window.executions, now_ms, &mut report)
            .await?;
        Ok(report)
    }

    /// Page through the listing and collect executions beyond the checkpoint.
    async fn fetch_window(
        &self,
        spec: &TriggerSpec,
        checkpoint: &Checkpoint,
        filter: Option<&str>,
    ) -> Result<Window, ListError> {
        let config = self.engine.config();
        let page_size = config.page_size.max(1);
        let mut executions = Vec::new();
        let mut seen = HashSet::new();
        let mut fetched = 0;

        'pages: for page in 0..config.max_pages.max(1) {
            let mut items = self.lister.list_page(spec, page, page_size, filter).await?;
            let page_len = items.len();
            fetched += page_len;

            items.retain(|e| is_terminal(&e.status) && matches_pipeline(spec, e));
            sort_newest_first(&mut items);

            for item in items {
                if is_newer(checkpoint, &item) {
                    if seen.insert(item.execution_id.clone()) {
                        executions.push(item);
                    }
                } else if is_watermark_refresh(checkpoint, &item) {
                    if seen.insert(item.execution_id.clone()) {
                        executions.push(item);
                    }
                    break 'pages;
                } else {
                    break 'pages;
                }
            }

            if page_len < page_size as usize {
                break;
            }
        }

        Ok(Window {
            executions,
            fetched,
        })
    }

    /// Process the window oldest-first; stop at the first deferral.
    async fn replay(
        &self,
        spec: &TriggerSpec,
        mut executions: Vec<ExecutionSummary>,
        now_ms: i64,
        report: &mut PollReport,
    ) -> Result<(), ReconcileError> {
        sort_oldest_first(&mut executions);

        for execution in &executions {
            let _guard = self.engine.lock(spec).await;
            let mut checkpoint = self.engine.load_checkpoint(&spec.id).await?;
            let decision = self.engine.decide(spec, &checkpoint, execution);

            if decision == DeliveryDecision::Emit {
                let ended_at = match normalize_timestamp(&execution.ended_at) {
                    0 => ordering_timestamp(execution),
                    ts => ts,
                };
                if self.arbiter.arbitrate(spec, ended_at, now_ms) == Arbitration::Defer {
                    tracing::debug!(
                        trigger_id = %spec.id,
                        execution_id = %execution.execution_id,
                        "deferring to in-flight webhook, stopping batch"
                    );
                    report.deferred = Some(execution.execution_id.clone());
                    break;
                }
            }

            if !decision.mutates_checkpoint() {
                continue;
            }

            self.engine
                .apply(
                    spec,
                    &mut checkpoint,
                    execution,
                    decision,
                    DeliverySource::Poll,
                )
                .await?;
            self.engine.save_checkpoint(&spec.id, &checkpoint).await?;

            match decision {
                DeliveryDecision::Emit => report.emitted += 1,
                _ => report.suppressed += 1,
            }
        }
        Ok(())
    }

    /// Count a failed cycle against the checkpoint and log by severity.
    async fn record_failure(&self, spec: &TriggerSpec, error: ListError) -> ReconcileError {
        let threshold = self.engine.config().error_log_threshold;
        match self
            .engine
            .modify_checkpoint(spec, |cp| {
                cp.poll_error_count = cp.poll_error_count.saturating_add(1)
            })
            .await
        {
            Ok(cp) if cp.poll_error_count >= threshold => tracing::error!(
                trigger_id = %spec.id,
                error_count = cp.poll_error_count,
                error = %error,
                "poll keeps failing"
            ),
            Ok(cp) => tracing::warn!(
                trigger_id = %spec.id,
                error_count = cp.poll_error_count,
                error = %error,
                "poll failed"
            ),
            Err(persist) => tracing::error!(
                trigger_id = %spec.id,
                error = %error,
                persist_error = %persist,
                "poll failed and error count could not be recorded"
            ),
        }
        ReconcileError::Listing(error)
    }
}

fn server_filter(spec: &TriggerSpec, filter_disabled: bool) -> Option<&str> {
    if filter_disabled {
        return None;
    }
    spec.pipeline_identifier.as_deref().filter(|p| !p.is_empty())
}

/// Client-side pipeline filter. Items without an identifier are kept.
fn matches_pipeline(spec: &TriggerSpec, execution: &ExecutionSummary) -> bool {
    match spec.pipeline_identifier.as_deref() {
        Some(pinned) if !pinned.is_empty() && !execution.pipeline_identifier.is_empty() => {
            execution.pipeline_identifier == pinned
        }
        _ => true,
    }
}
