//! Environment variable secret provider.
//!
//! Key resolution:
//! - Global scope: checks `key` directly (e.g., "CONDUIT_WEBHOOK_SECRET")
//! - Trigger scope: first checks `CONDUIT_{TRIGGER_ID}_{KEY}`, then falls back to `key`

use conduit_core::repository::secret::SecretProvider;
use conduit_types::error::SecretError;
use conduit_types::secret::SecretScope;

/// Read-only secret provider backed by the process environment.
#[derive(Debug, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Env var name for a trigger-scoped secret.
pub fn trigger_scoped_var(trigger_id: &str, key: &str) -> String {
    format!(
        "CONDUIT_{}_{}",
        trigger_id.replace(['-', '.'], "_").to_uppercase(),
        key
    )
}

impl SecretProvider for EnvSecretProvider {
    async fn get(&self, key: &str, scope: &SecretScope) -> Result<Option<String>, SecretError> {
        if let SecretScope::Trigger(trigger_id) = scope {
            if let Ok(val) = std::env::var(trigger_scoped_var(trigger_id, key)) {
                return Ok(Some(val));
            }
        }

        match std::env::var(key) {
            Ok(val) => Ok(Some(val)),
            // Non-unicode values cannot be compared as header strings.
            Err(std::env::VarError::NotPresent | std::env::VarError::NotUnicode(_)) => Ok(None),
        }
    }
}
