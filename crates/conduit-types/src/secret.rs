//! Secret scoping for webhook shared-secret lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scope a secret is resolved in.
///
/// Trigger-scoped lookups let each trigger instance carry its own webhook
/// token while still falling back to a process-wide value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "trigger_id", rename_all = "snake_case")]
pub enum SecretScope {
    Global,
    Trigger(String),
}

impl fmt::Display for SecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretScope::Global => write!(f, "global"),
            SecretScope::Trigger(id) => write!(f, "trigger:{id}"),
        }
    }
}
