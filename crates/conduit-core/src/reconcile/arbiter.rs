//! Race-window arbitration between webhook and poll delivery.
//!
//! When a trigger pins a pipeline, a vendor notification rule is assumed to
//! exist for it, so a very recent completion seen by the poller is probably
//! also in flight as a webhook. The poller defers such items and revisits
//! them on a later cycle.

use std::time::Duration;

use conduit_types::trigger::TriggerSpec;

/// Outcome of arbitrating one poll-sourced emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    Proceed,
    /// Stop the batch here; the item is revisited next cycle.
    Defer,
}

#[derive(Debug, Clone)]
pub struct RaceWindowArbiter {
    window_ms: i64,
}

impl RaceWindowArbiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Decide whether a terminal execution that ended at `ended_at_ms` may be
    /// emitted by the poller at `now_ms`.
    ///
    /// Timestampless executions and triggers without a pinned pipeline always
    /// proceed. Completions stamped in the future (clock skew) are deferred.
    pub fn arbitrate(&self, spec: &TriggerSpec, ended_at_ms: i64, now_ms: i64) -> Arbitration {
        if !spec.prefers_webhook() || ended_at_ms <= 0 || self.window_ms == 0 {
            return Arbitration::Proceed;
        }
        if now_ms.saturating_sub(ended_at_ms) < self.window_ms {
            Arbitration::Defer
        } else {
            Arbitration::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn spec(pipeline: Option<&str>) -> TriggerSpec {
        TriggerSpec {
            id: "t1".to_string(),
            organization: "acme".to_string(),
            project: "platform".to_string(),
            pipeline_identifier: pipeline.map(str::to_string),
            status_filter: Vec::new(),
            listing_url: "https://ci.example.com/executions".to_string(),
            secret_key: None,
        }
    }

    #[test]
    fn test_recent_completion_deferred_when_webhook_preferred() {
        let arbiter = RaceWindowArbiter::new(Duration::from_secs(120));
        assert_eq!(
            arbiter.arbitrate(&spec(Some("deploy")), NOW - 30_000, NOW),
            Arbitration::Defer
        );
    }

    #[test]
    fn test_old_completion_proceeds() {
        let arbiter = RaceWindowArbiter::new(Duration::from_secs(120));
        assert_eq!(
            arbiter.arbitrate(&spec(Some("deploy")), NOW - 120_000, NOW),
            Arbitration::Proceed
        );
    }

    #[test]
    fn test_no_pinned_pipeline_never_defers() {
        let arbiter = RaceWindowArbiter::new(Duration::from_secs(120));
        assert_eq!(
            arbiter.arbitrate(&spec(None), NOW - 1_000, NOW),
            Arbitration::Proceed
        );
    }

    #[test]
    fn test_timestampless_proceeds() {
        let arbiter = RaceWindowArbiter::new(Duration::from_secs(120));
        assert_eq!(
            arbiter.arbitrate(&spec(Some("deploy")), 0, NOW),
            Arbitration::Proceed
        );
    }

    #[test]
    fn test_future_completion_deferred() {
        let arbiter = RaceWindowArbiter::new(Duration::from_secs(120));
        assert_eq!(
            arbiter.arbitrate(&spec(Some("deploy")), NOW + 5_000, NOW),
            Arbitration::Defer
        );
    }

    #[test]
    fn test_zero_window_disables_arbitration() {
        let arbiter = RaceWindowArbiter::new(Duration::ZERO);
        assert_eq!(
            arbiter.arbitrate(&spec(Some("deploy")), NOW, NOW),
            Arbitration::Proceed
        );
    }
}
