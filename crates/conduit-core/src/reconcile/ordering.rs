//! Ordering and de-duplication rules over checkpoints.
//!
//! Pure functions shared by both ingress paths:
//! - `canonical_status()` -- vendor status vocabulary -> `ExecutionStatus`
//! - `is_newer()` -- has this execution not been accepted yet?
//! - `update_checkpoint()` -- merge an accepted execution into the checkpoint
//! - `sort_oldest_first()` / `sort_newest_first()` -- deterministic batch order

use std::cmp::Ordering;

use conduit_types::checkpoint::Checkpoint;
use conduit_types::execution::{ExecutionStatus, ExecutionSummary};

use super::timestamp::normalize_timestamp;

/// Map a vendor status string onto the canonical vocabulary.
///
/// Unrecognized strings pass through lower-cased.
pub fn canonical_status(raw: &str) -> ExecutionStatus {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "succeeded" | "success" | "successful" | "completed" | "complete" => {
            ExecutionStatus::Succeeded
        }
        "failed" | "failure" | "error" | "errored" => ExecutionStatus::Failed,
        "aborted" | "cancelled" | "canceled" | "stopped" | "rejected" | "approvalrejected" => {
            ExecutionStatus::Aborted
        }
        "expired" => ExecutionStatus::Expired,
        _ => ExecutionStatus::Other(lower),
    }
}

/// True iff the canonical form of `raw` is a terminal state.
pub fn is_terminal(raw: &str) -> bool {
    canonical_status(raw).is_terminal()
}

/// Whether `status` passes a configured allow-list.
///
/// Filter entries may use vendor or canonical spelling. An empty filter
/// allows everything.
pub fn status_allowed(filter: &[String], status: &ExecutionStatus) -> bool {
    filter.is_empty() || filter.iter().any(|f| canonical_status(f) == *status)
}

/// `endedAt` if parseable, else `startedAt`, else 0 (timestampless).
pub fn ordering_timestamp(execution: &ExecutionSummary) -> i64 {
    match normalize_timestamp(&execution.ended_at) {
        0 => normalize_timestamp(&execution.started_at),
        ended => ended,
    }
}

/// Decide whether `execution` lies beyond the checkpoint.
pub fn is_newer(checkpoint: &Checkpoint, execution: &ExecutionSummary) -> bool {
    let id = execution.execution_id.as_str();
    if id.is_empty() || id == checkpoint.last_execution_id {
        return false;
    }

    let ts = ordering_timestamp(execution);
    if ts == 0 {
        return !checkpoint.timestampless_execution_ids.contains(id);
    }

    if checkpoint.timestampless_execution_ids.contains(id) {
        // One-time refresh once a previously timestampless ID gains a time.
        return ts > checkpoint.last_execution_ended_at;
    }

    ts > checkpoint.last_execution_ended_at
        || (ts == checkpoint.last_execution_ended_at && id > checkpoint.last_execution_id.as_str())
}

/// The checkpointed execution reappearing with a later timestamp.
///
/// Not "newer", but still worth applying once so the watermark catches up.
pub fn is_watermark_refresh(checkpoint: &Checkpoint, execution: &ExecutionSummary) -> bool {
    !execution.execution_id.is_empty()
        && execution.execution_id == checkpoint.last_execution_id
        && ordering_timestamp(execution) > checkpoint.last_execution_ended_at
}

/// Merge an accepted execution into the checkpoint.
///
/// Timestampless executions only enter the dedup set. Timestamped ones move
/// the watermark forward; it never moves backwards.
pub fn update_checkpoint(checkpoint: &mut Checkpoint, execution: &ExecutionSummary) {
    let id = execution.execution_id.as_str();
    if id.is_empty() {
        return;
    }

    let ts = ordering_timestamp(execution);
    if ts == 0 {
        checkpoint.timestampless_execution_ids.insert(id);
        return;
    }

    if id == checkpoint.last_execution_id {
        if ts > checkpoint.last_execution_ended_at {
            checkpoint.last_execution_ended_at = ts;
        }
    } else if ts > checkpoint.last_execution_ended_at {
        checkpoint.last_execution_id = id.to_string();
        checkpoint.last_execution_ended_at = ts;
    } else if ts == checkpoint.last_execution_ended_at && id > checkpoint.last_execution_id.as_str()
    {
        checkpoint.last_execution_id = id.to_string();
    }
}

/// Timestamp ascending, ties broken by ID ascending.
pub fn compare_oldest_first(a: &ExecutionSummary, b: &ExecutionSummary) -> Ordering {
    ordering_timestamp(a)
        .cmp(&ordering_timestamp(b))
        .then_with(|| a.execution_id.cmp(&b.execution_id))
}

pub fn sort_oldest_first(executions: &mut [ExecutionSummary]) {
    executions.sort_by(compare_oldest_first);
}

pub fn sort_newest_first(executions: &mut [ExecutionSummary]) {
    executions.sort_by(|a, b| compare_oldest_first(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(id: &str, ended_ms: i64) -> ExecutionSummary {
        let ended = if ended_ms == 0 {
            String::new()
        } else {
            ended_ms.to_string()
        };
        ExecutionSummary::new(id, "SUCCESS").with_ended_at(ended)
    }

    fn checkpoint(id: &str, watermark: i64) -> Checkpoint {
        Checkpoint {
            last_execution_id: id.to_string(),
            last_execution_ended_at: watermark,
            ..Default::default()
        }
    }

    const T: i64 = 1_700_000_000_000;

    // -------------------------------------------------------------------
    // canonical_status
    // -------------------------------------------------------------------

    #[test]
    fn test_canonical_status_table() {
        assert_eq!(canonical_status("SUCCESS"), ExecutionStatus::Succeeded);
        assert_eq!(canonical_status("Completed"), ExecutionStatus::Succeeded);
        assert_eq!(canonical_status("errored"), ExecutionStatus::Failed);
        assert_eq!(canonical_status("Error"), ExecutionStatus::Failed);
        assert_eq!(canonical_status("FAILED"), ExecutionStatus::Failed);
        assert_eq!(canonical_status("Cancelled"), ExecutionStatus::Aborted);
        assert_eq!(canonical_status("canceled"), ExecutionStatus::Aborted);
        assert_eq!(canonical_status("Stopped"), ExecutionStatus::Aborted);
        assert_eq!(canonical_status("REJECTED"), ExecutionStatus::Aborted);
        assert_eq!(canonical_status("Expired"), ExecutionStatus::Expired);
    }

    #[test]
    fn test_canonical_status_passthrough_lowercases() {
        assert_eq!(
            canonical_status("Running"),
            ExecutionStatus::Other("running".to_string())
        );
        assert!(!is_terminal("Running"));
        assert!(is_terminal("ABORTED"));
    }

    #[test]
    fn test_status_allowed() {
        let filter = vec!["succeeded".to_string()];
        assert!(status_allowed(&filter, &canonical_status("SUCCESS")));
        assert!(!status_allowed(&filter, &canonical_status("FAILED")));
        assert!(status_allowed(&[], &canonical_status("FAILED")));

        let vendor_spelling = vec!["Error".to_string()];
        assert!(status_allowed(&vendor_spelling, &ExecutionStatus::Failed));
    }

    // -------------------------------------------------------------------
    // ordering_timestamp
    // -------------------------------------------------------------------

    #[test]
    fn test_ordering_timestamp_prefers_end() {
        let e = ExecutionSummary::new("a", "SUCCESS")
            .with_started_at("1700000000")
            .with_ended_at("1700000100");
        assert_eq!(ordering_timestamp(&e), 1_700_000_100_000);
    }

    #[test]
    fn test_ordering_timestamp_falls_back_to_start() {
        let e = ExecutionSummary::new("a", "SUCCESS").with_started_at("1700000000");
        assert_eq!(ordering_timestamp(&e), 1_700_000_000_000);

        let unparseable_end = e.clone().with_ended_at("garbage");
        assert_eq!(ordering_timestamp(&unparseable_end), 1_700_000_000_000);
    }

    #[test]
    fn test_ordering_timestamp_zero_when_missing() {
        assert_eq!(ordering_timestamp(&ExecutionSummary::new("a", "SUCCESS")), 0);
    }

    // -------------------------------------------------------------------
    // is_newer
    // -------------------------------------------------------------------

    #[test]
    fn test_is_newer_empty_id() {
        assert!(!is_newer(&Checkpoint::default(), &exec("", T)));
    }

    #[test]
    fn test_is_newer_exact_replay() {
        let cp = checkpoint("exec-1", T);
        assert!(!is_newer(&cp, &exec("exec-1", T)));
        assert!(!is_newer(&cp, &exec("exec-1", T + 10)));
    }

    #[test]
    fn test_is_newer_timestamp_comparison() {
        let cp = checkpoint("exec-m", T);
        assert!(is_newer(&cp, &exec("exec-a", T + 1)));
        assert!(!is_newer(&cp, &exec("exec-z", T - 1)));
    }

    #[test]
    fn test_is_newer_tie_breaks_on_id() {
        let cp = checkpoint("exec-m", T);
        assert!(is_newer(&cp, &exec("exec-z", T)));
        assert!(!is_newer(&cp, &exec("exec-a", T)));
    }

    #[test]
    fn test_is_newer_timestampless() {
        let mut cp = checkpoint("exec-1", T);
        assert!(is_newer(&cp, &exec("exec-2", 0)));
        cp.timestampless_execution_ids.insert("exec-2");
        assert!(!is_newer(&cp, &exec("exec-2", 0)));
    }

    #[test]
    fn test_is_newer_timestampless_id_gains_timestamp() {
        let mut cp = checkpoint("exec-1", T);
        cp.timestampless_execution_ids.insert("exec-2");
        assert!(is_newer(&cp, &exec("exec-2", T + 5)));
        assert!(!is_newer(&cp, &exec("exec-2", T)));
    }

    #[test]
    fn test_watermark_refresh_detection() {
        let cp = checkpoint("exec-1", T);
        assert!(is_watermark_refresh(&cp, &exec("exec-1", T + 1)));
        assert!(!is_watermark_refresh(&cp, &exec("exec-1", T)));
        assert!(!is_watermark_refresh(&cp, &exec("exec-2", T + 1)));
    }

    // -------------------------------------------------------------------
    // update_checkpoint
    // -------------------------------------------------------------------

    #[test]
    fn test_update_ignores_empty_id() {
        let mut cp = checkpoint("exec-1", T);
        update_checkpoint(&mut cp, &exec("", T + 10));
        assert_eq!(cp, checkpoint("exec-1", T));
    }

    #[test]
    fn test_update_timestampless_only_touches_dedup_set() {
        let mut cp = checkpoint("exec-1", T);
        update_checkpoint(&mut cp, &exec("exec-2", 0));
        assert_eq!(cp.last_execution_id, "exec-1");
        assert_eq!(cp.last_execution_ended_at, T);
        assert!(cp.timestampless_execution_ids.contains("exec-2"));
    }

    #[test]
    fn test_update_advances_watermark() {
        let mut cp = checkpoint("exec-1", T);
        update_checkpoint(&mut cp, &exec("exec-2", T + 100));
        assert_eq!(cp, checkpoint("exec-2", T + 100));
    }

    #[test]
    fn test_update_never_moves_watermark_back() {
        let mut cp = checkpoint("exec-2", T + 100);
        update_checkpoint(&mut cp, &exec("exec-1", T));
        assert_eq!(cp, checkpoint("exec-2", T + 100));
        update_checkpoint(&mut cp, &exec("exec-2", T));
        assert_eq!(cp, checkpoint("exec-2", T + 100));
    }

    #[test]
    fn test_update_same_id_refreshes_watermark() {
        let mut cp = checkpoint("exec-1", T);
        update_checkpoint(&mut cp, &exec("exec-1", T + 50));
        assert_eq!(cp, checkpoint("exec-1", T + 50));
    }

    #[test]
    fn test_update_tie_takes_larger_id() {
        let mut cp = checkpoint("exec-b", T);
        update_checkpoint(&mut cp, &exec("exec-a", T));
        assert_eq!(cp.last_execution_id, "exec-b");
        update_checkpoint(&mut cp, &exec("exec-c", T));
        assert_eq!(cp.last_execution_id, "exec-c");
        assert_eq!(cp.last_execution_ended_at, T);
    }

    #[test]
    fn test_watermark_monotonic_over_sequence() {
        let mut cp = Checkpoint::default();
        let sequence = [
            exec("a", T + 30),
            exec("b", T + 10),
            exec("c", 0),
            exec("d", T + 30),
            exec("e", T + 5),
            exec("c", T + 40),
        ];
        let mut last = cp.last_execution_ended_at;
        for e in &sequence {
            update_checkpoint(&mut cp, e);
            assert!(cp.last_execution_ended_at >= last);
            last = cp.last_execution_ended_at;
        }
        assert_eq!(cp.last_execution_id, "c");
        assert_eq!(cp.last_execution_ended_at, T + 40);
    }

    // -------------------------------------------------------------------
    // sorting
    // -------------------------------------------------------------------

    #[test]
    fn test_sort_orders_by_timestamp_then_id() {
        let mut batch = vec![exec("b", T + 20), exec("c", T + 10), exec("a", T + 20)];
        sort_oldest_first(&mut batch);
        let ids: Vec<_> = batch.iter().map(|e| e.execution_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        sort_newest_first(&mut batch);
        let ids: Vec<_> = batch.iter().map(|e| e.execution_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
