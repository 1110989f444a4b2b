//! Secret provider trait definition.

use conduit_types::error::SecretError;
use conduit_types::secret::SecretScope;

/// Read access to webhook shared secrets.
///
/// Returns `Ok(None)` when the secret is simply absent; the webhook handler
/// treats both absence and lookup failure as an authorization failure.
pub trait SecretProvider: Send + Sync {
    fn get(
        &self,
        key: &str,
        scope: &SecretScope,
    ) -> impl std::future::Future<Output = Result<Option<String>, SecretError>> + Send;
}
