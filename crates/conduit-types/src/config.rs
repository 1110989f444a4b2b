//! Engine configuration types for Conduit.
//!
//! `EngineConfig` represents the top-level `config.toml` that controls poll
//! cadence, the race window, paging limits, webhook header names and the list
//! of configured triggers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checkpoint::DEFAULT_DEDUP_CAPACITY;
use crate::trigger::TriggerSpec;

/// Top-level configuration for the reconciliation engine.
///
/// Loaded from `~/.conduit/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed delay between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How long after completion polling defers to in-flight webhooks.
    #[serde(default = "default_race_window_secs")]
    pub race_window_secs: u64,

    /// Items requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard cap on pages fetched per poll cycle.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Consecutive poll failures after which logging escalates to error.
    #[serde(default = "default_error_log_threshold")]
    pub error_log_threshold: u32,

    /// Capacity of the timestampless dedup set.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Number of mutex shards serializing checkpoint mutation.
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,

    /// Timeout for remote listing calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Vendor-specific header that may carry the webhook secret.
    #[serde(default = "default_vendor_secret_header")]
    pub vendor_secret_header: String,

    /// API-key header that may carry the webhook secret.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Configured trigger instances.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_race_window_secs() -> u64 {
    120
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    5
}

fn default_error_log_threshold() -> u32 {
    5
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

fn default_lock_shards() -> usize {
    64
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_vendor_secret_header() -> String {
    "x-harness-webhook-token".to_string()
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn race_window(&self) -> Duration {
        Duration::from_secs(self.race_window_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            race_window_secs: default_race_window_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            error_log_threshold: default_error_log_threshold(),
            dedup_capacity: default_dedup_capacity(),
            lock_shards: default_lock_shards(),
            http_timeout_secs: default_http_timeout_secs(),
            vendor_secret_header: default_vendor_secret_header(),
            api_key_header: default_api_key_header(),
            triggers: Vec::new(),
        }
    }
}
