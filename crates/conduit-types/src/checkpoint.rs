//! Per-trigger checkpoint record.
//!
//! A `Checkpoint` is persisted opaquely (as JSON) by whichever checkpoint
//! store the host wires in. The engine owns its shape and merge rules; the
//! field names below are the persisted wire names.

use std::collections::VecDeque;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default capacity of the timestampless dedup set.
pub const DEFAULT_DEDUP_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// BoundedIdSet
// ---------------------------------------------------------------------------

/// Insertion-ordered set of execution IDs with FIFO eviction.
///
/// Persisted as a single comma-joined string, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedIdSet {
    ids: VecDeque<String>,
    capacity: usize,
}

impl BoundedIdSet {
    /// Create an empty set holding at most `capacity` IDs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Insert an ID, evicting the oldest entries on overflow.
    ///
    /// Returns `false` if the ID was already present (its position is kept).
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if id.is_empty() || self.contains(&id) {
            return false;
        }
        self.ids.push_back(id);
        self.evict_overflow();
        true
    }

    /// Change the capacity, evicting the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict_overflow();
    }

    /// Iterate IDs oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    fn evict_overflow(&mut self) {
        while self.ids.len() > self.capacity {
            self.ids.pop_front();
        }
    }

    fn to_joined(&self) -> String {
        self.ids.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    /// Decode without evicting; the owner applies its configured capacity
    /// afterwards with `set_capacity`.
    fn from_joined(joined: &str) -> Self {
        let mut ids: VecDeque<String> = VecDeque::new();
        for id in joined.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !ids.iter().any(|existing| existing == id) {
                ids.push_back(id.to_string());
            }
        }
        let capacity = ids.len().max(DEFAULT_DEDUP_CAPACITY);
        Self { ids, capacity }
    }
}

impl Default for BoundedIdSet {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl Serialize for BoundedIdSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_joined())
    }
}

impl<'de> Deserialize<'de> for BoundedIdSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        Ok(Self::from_joined(&joined))
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Delivery checkpoint for one trigger instance.
///
/// Created as the zero value on trigger setup, mutated on every accepted
/// webhook or poll cycle, deleted with the trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// ID of the most recently accepted, timestamped execution.
    #[serde(default)]
    pub last_execution_id: String,

    /// Watermark in epoch milliseconds. Never decreases once set.
    #[serde(default)]
    pub last_execution_ended_at: i64,

    /// Executions first observed without a usable timestamp.
    #[serde(default, skip_serializing_if = "BoundedIdSet::is_empty")]
    pub timestampless_execution_ids: BoundedIdSet,

    /// Consecutive poll failures; reset on success.
    #[serde(default)]
    pub poll_error_count: u32,

    /// Sticky: the remote API rejected the server-side identifier filter.
    #[serde(default)]
    pub server_filter_disabled: bool,
}

impl Checkpoint {
    /// Zero-value checkpoint with a custom dedup capacity.
    pub fn with_dedup_capacity(capacity: usize) -> Self {
        Self {
            timestampless_execution_ids: BoundedIdSet::new(capacity),
            ..Default::default()
        }
    }
}
