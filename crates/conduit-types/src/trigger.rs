//! Trigger instance specification.

use serde::{Deserialize, Serialize};

/// Secret-provider key used when a trigger does not name its own.
pub const DEFAULT_SECRET_KEY: &str = "CONDUIT_WEBHOOK_SECRET";

/// One configured pipeline-completion trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Stable trigger instance ID (also the webhook path segment).
    pub id: String,
    pub organization: String,
    pub project: String,
    /// When set, only this pipeline's executions are delivered and a
    /// vendor notification rule is assumed to be provisioned for it.
    #[serde(default)]
    pub pipeline_identifier: Option<String>,
    /// Allowed statuses (vendor or canonical spelling). Empty allows all.
    #[serde(default)]
    pub status_filter: Vec<String>,
    /// Remote execution-listing endpoint.
    pub listing_url: String,
    /// Secret-provider key holding the webhook shared secret.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl TriggerSpec {
    /// Webhook delivery is expected to win races when a pipeline is pinned.
    pub fn prefers_webhook(&self) -> bool {
        self.pipeline_identifier
            .as_deref()
            .is_some_and(|p| !p.is_empty())
    }

    pub fn secret_key(&self) -> &str {
        self.secret_key.as_deref().unwrap_or(DEFAULT_SECRET_KEY)
    }

    /// Logical key serializing checkpoint mutation:
    /// `org/project/pipeline/sorted-status-filter`.
    pub fn lock_key(&self) -> String {
        let mut filter: Vec<String> = self
            .status_filter
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect();
        filter.sort();
        format!(
            "{}/{}/{}/{}",
            self.organization,
            self.project,
            self.pipeline_identifier.as_deref().unwrap_or(""),
            filter.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TriggerSpec {
        TriggerSpec {
            id: "t1".to_string(),
            organization: "acme".to_string(),
            project: "platform".to_string(),
            pipeline_identifier: Some("deploy".to_string()),
            status_filter: vec!["failed".to_string(), "Succeeded".to_string()],
            listing_url: "https://ci.example.com/executions".to_string(),
            secret_key: None,
        }
    }

    #[test]
    fn test_lock_key_sorts_status_filter() {
        let a = spec();
        let mut b = spec();
        b.status_filter.reverse();
        assert_eq!(a.lock_key(), "acme/platform/deploy/failed,succeeded");
        assert_eq!(a.lock_key(), b.lock_key());
    }

    #[test]
    fn test_prefers_webhook_requires_pipeline() {
        let mut s = spec();
        assert!(s.prefers_webhook());
        s.pipeline_identifier = Some(String::new());
        assert!(!s.prefers_webhook());
        s.pipeline_identifier = None;
        assert!(!s.prefers_webhook());
    }

    #[test]
    fn test_secret_key_default() {
        let mut s = spec();
        assert_eq!(s.secret_key(), DEFAULT_SECRET_KEY);
        s.secret_key = Some("DEPLOY_HOOK_TOKEN".to_string());
        assert_eq!(s.secret_key(), "DEPLOY_HOOK_TOKEN");
    }
}
