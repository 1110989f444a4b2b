//! Vendor-agnostic field extraction from arbitrarily shaped JSON.
//!
//! Vendors are inconsistent about nesting and casing, so every field is
//! looked up through an ordered list of dotted paths across the known
//! wrapper shapes, then through a depth-bounded recursive key search.

use conduit_types::execution::ExecutionSummary;
use serde_json::Value;

/// Maximum nesting depth visited by the recursive key search.
pub const MAX_SEARCH_DEPTH: usize = 5;

const EXECUTION_ID_PATHS: &[&str] = &[
    "eventData.planExecutionId",
    "eventData.executionId",
    "data.planExecutionId",
    "data.executionId",
    "pipelineExecutionSummary.planExecutionId",
    "planExecutionId",
    "executionId",
    "execution.id",
];
const EXECUTION_ID_KEYS: &[&str] = &["planExecutionId", "executionId", "execution_id"];

const PIPELINE_PATHS: &[&str] = &[
    "eventData.pipelineIdentifier",
    "data.pipelineIdentifier",
    "pipelineExecutionSummary.pipelineIdentifier",
    "pipelineIdentifier",
    "pipeline.identifier",
];
const PIPELINE_KEYS: &[&str] = &["pipelineIdentifier", "pipeline_identifier", "pipelineId"];

const STATUS_PATHS: &[&str] = &[
    "eventData.pipelineStatus",
    "eventData.status",
    "eventData.nodeStatus",
    "data.status",
    "pipelineExecutionSummary.status",
    "status",
    "execution.status",
];
const STATUS_KEYS: &[&str] = &["pipelineStatus", "status", "nodeStatus", "executionStatus"];

const EVENT_TYPE_PATHS: &[&str] = &["eventType", "eventData.eventType", "data.eventType", "type", "event"];
const EVENT_TYPE_KEYS: &[&str] = &["eventType", "event_type"];

const STARTED_PATHS: &[&str] = &[
    "eventData.startTs",
    "eventData.startedAt",
    "data.startTs",
    "pipelineExecutionSummary.startTs",
    "startTs",
    "startedAt",
    "execution.startedAt",
];
const STARTED_KEYS: &[&str] = &["startTs", "startedAt", "started_at", "startTime"];

const ENDED_PATHS: &[&str] = &[
    "eventData.endTs",
    "eventData.endedAt",
    "data.endTs",
    "pipelineExecutionSummary.endTs",
    "endTs",
    "endedAt",
    "execution.endedAt",
];
const ENDED_KEYS: &[&str] = &["endTs", "endedAt", "ended_at", "endTime"];

const URL_PATHS: &[&str] = &[
    "eventData.executionUrl",
    "eventData.pipelineExecutionUrl",
    "data.executionUrl",
    "executionUrl",
    "url",
];
const URL_KEYS: &[&str] = &["executionUrl", "pipelineExecutionUrl"];

/// Normalized webhook event record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEvent {
    pub event_type: String,
    pub execution: ExecutionSummary,
}

/// Extract the event type and execution fields from a webhook payload.
pub fn extract_event(payload: &Value) -> ExtractedEvent {
    ExtractedEvent {
        event_type: lookup(payload, EVENT_TYPE_PATHS, EVENT_TYPE_KEYS),
        execution: summary_from_value(payload),
    }
}

/// Map one vendor execution object onto an `ExecutionSummary`.
pub fn summary_from_value(value: &Value) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: lookup(value, EXECUTION_ID_PATHS, EXECUTION_ID_KEYS),
        pipeline_identifier: lookup(value, PIPELINE_PATHS, PIPELINE_KEYS),
        status: lookup(value, STATUS_PATHS, STATUS_KEYS),
        started_at: lookup(value, STARTED_PATHS, STARTED_KEYS),
        ended_at: lookup(value, ENDED_PATHS, ENDED_KEYS),
        url: lookup(value, URL_PATHS, URL_KEYS),
    }
}

/// Known completion event types, compared after stripping separators and case.
const COMPLETION_EVENT_TYPES: &[&str] = &[
    "pipelineend",
    "pipelinecompleted",
    "pipelinecompletion",
    "pipelinefinished",
    "executioncompleted",
    "executionend",
    "executionfinished",
];

/// Whether an event type denotes a completed execution.
pub fn is_completion_event(event_type: &str) -> bool {
    let normalized: String = event_type
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    COMPLETION_EVENT_TYPES.contains(&normalized.as_str())
}

/// Ordered path lookup, then recursive key search. Empty if nothing matched.
fn lookup(value: &Value, paths: &[&str], keys: &[&str]) -> String {
    paths
        .iter()
        .find_map(|path| get_path(value, path).and_then(scalar_to_string))
        .or_else(|| find_key(value, keys, MAX_SEARCH_DEPTH))
        .unwrap_or_default()
}

/// Resolve a dotted path (`a.b.c`) through nested objects.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Depth-bounded search for the first scalar under any of `keys`
/// (case-insensitive). Arrays are descended into.
pub fn find_key(value: &Value, keys: &[&str], max_depth: usize) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if keys.iter().any(|key| key.eq_ignore_ascii_case(k)) {
                    if let Some(s) = scalar_to_string(v) {
                        return Some(s);
                    }
                }
            }
            if max_depth == 0 {
                return None;
            }
            map.values()
                .find_map(|child| find_key(child, keys, max_depth - 1))
        }
        Value::Array(items) if max_depth > 0 => items
            .iter()
            .find_map(|child| find_key(child, keys, max_depth - 1)),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        // Whole floats such as 1.7e12 keep their integer form for timestamp parsing.
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some((f as i64).to_string())
            }
            _ => Some(n.to_string()),
        },
        _ => None,
    }
}
