//! In-memory doubles for the engine's ports, shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use conduit_types::error::{RepositoryError, SecretError};
use conduit_types::execution::ExecutionSummary;
use conduit_types::secret::SecretScope;
use conduit_types::trigger::TriggerSpec;
use serde_json::Value;

use super::emitter::{EmitError, EmittedEvent, EventEmitter};
use super::listing::{ExecutionLister, ListError};
use super::ordering::sort_newest_first;
use super::schedule::{PollParams, PollScheduler, ScheduleError};
use crate::repository::checkpoint::CheckpointStore;
use crate::repository::secret::SecretProvider;

pub const T: i64 = 1_700_000_000_000;

pub fn spec(id: &str, pipeline: Option<&str>, filter: &[&str]) -> TriggerSpec {
    TriggerSpec {
        id: id.to_string(),
        organization: "acme".to_string(),
        project: "platform".to_string(),
        pipeline_identifier: pipeline.map(str::to_string),
        status_filter: filter.iter().map(|s| s.to_string()).collect(),
        listing_url: "https://ci.example.com/api/executions".to_string(),
        secret_key: None,
    }
}

/// Execution ending at `ended_ms` (0 means timestampless).
pub fn exec(id: &str, status: &str, ended_ms: i64) -> ExecutionSummary {
    let summary = ExecutionSummary::new(id, status);
    if ended_ms == 0 {
        summary
    } else {
        summary.with_ended_at(ended_ms.to_string())
    }
}

// ---------------------------------------------------------------------------
// Checkpoint store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn raw(&self, trigger_id: &str) -> Option<Value> {
        self.values.lock().unwrap().get(trigger_id).cloned()
    }

    pub fn put_raw(&self, trigger_id: &str, value: Value) {
        self.values
            .lock()
            .unwrap()
            .insert(trigger_id.to_string(), value);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CheckpointStore for MemoryStore {
    async fn get(&self, trigger_id: &str) -> Result<Option<Value>, RepositoryError> {
        Ok(self.raw(trigger_id))
    }

    async fn set(&self, trigger_id: &str, value: &Value) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.put_raw(trigger_id, value.clone());
        Ok(())
    }

    async fn delete(&self, trigger_id: &str) -> Result<(), RepositoryError> {
        self.values.lock().unwrap().remove(trigger_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<EmittedEvent>>,
    fail_next: AtomicBool,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn emitted_ids(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.payload["execution_id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl EventEmitter for RecordingEmitter {
    async fn emit(&self, event_type: &str, payload: Value) -> Result<(), EmitError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EmitError::Rejected("consumer busy".to_string()));
        }
        self.events.lock().unwrap().push(EmittedEvent {
            event_type: event_type.to_string(),
            payload,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lister
// ---------------------------------------------------------------------------

/// Serves a fixed execution history newest-first, optionally rejecting the
/// server-side filter or failing with scripted errors first.
#[derive(Default)]
pub struct ScriptedLister {
    executions: Mutex<Vec<ExecutionSummary>>,
    errors: Mutex<VecDeque<ListError>>,
    reject_filter: AtomicBool,
    calls: Mutex<Vec<(u32, Option<String>)>>,
}

impl ScriptedLister {
    pub fn with_executions(executions: Vec<ExecutionSummary>) -> Self {
        let lister = Self::default();
        lister.set_executions(executions);
        lister
    }

    pub fn set_executions(&self, mut executions: Vec<ExecutionSummary>) {
        sort_newest_first(&mut executions);
        *self.executions.lock().unwrap() = executions;
    }

    pub fn push_error(&self, error: ListError) {
        self.errors.lock().unwrap().push_back(error);
    }

    pub fn reject_filter(&self) {
        self.reject_filter.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(u32, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ExecutionLister for ScriptedLister {
    async fn list_page(
        &self,
        _trigger: &TriggerSpec,
        page: u32,
        page_size: u32,
        filter: Option<&str>,
    ) -> Result<Vec<ExecutionSummary>, ListError> {
        self.calls
            .lock()
            .unwrap()
            .push((page, filter.map(str::to_string)));

        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        if filter.is_some() && self.reject_filter.load(Ordering::SeqCst) {
            return Err(ListError::Status {
                status: 400,
                message: "Unknown field: pipelineIdentifier".to_string(),
            });
        }

        let start = (page * page_size) as usize;
        let items = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter.is_none_or(|f| e.pipeline_identifier == f))
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(String, PollParams, Duration)>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<(String, PollParams, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl PollScheduler for RecordingScheduler {
    async fn schedule(
        &self,
        action: &str,
        params: PollParams,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        self.scheduled
            .lock()
            .unwrap()
            .push((action.to_string(), params, delay));
        Ok(())
    }

    async fn cancel(&self, trigger_id: &str) -> Result<(), ScheduleError> {
        self.cancelled.lock().unwrap().push(trigger_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
    unavailable: bool,
}

impl StaticSecrets {
    pub fn with(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        Self {
            values,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            values: HashMap::new(),
            unavailable: true,
        }
    }
}

impl SecretProvider for StaticSecrets {
    async fn get(&self, key: &str, _scope: &SecretScope) -> Result<Option<String>, SecretError> {
        if self.unavailable {
            return Err(SecretError::ProviderUnavailable);
        }
        Ok(self.values.get(key).cloned())
    }
}
