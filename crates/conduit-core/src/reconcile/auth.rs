//! Shared-secret authentication for inbound webhooks.
//!
//! The secret may arrive in any of three places, checked in order:
//! `Authorization: Bearer <token>`, a vendor-specific header, or an API-key
//! header. Every candidate is compared in constant time; any match authorizes.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};

/// Case-insensitive view over request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    values: HashMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Header names that may carry the webhook secret.
#[derive(Debug, Clone)]
pub struct SecretHeaders {
    pub vendor_header: String,
    pub api_key_header: String,
}

/// Authentication failure. Carries no detail about which header was wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no webhook credential presented")]
    MissingCredential,

    #[error("webhook credential rejected")]
    InvalidCredential,
}

/// Verify that one of the accepted headers carries `expected`.
pub fn authorize(
    headers: &RequestHeaders,
    expected: &SecretString,
    names: &SecretHeaders,
) -> Result<(), AuthError> {
    let expected = expected.expose_secret().as_bytes();

    let candidates: Vec<&str> = [
        headers.get("authorization").and_then(bearer_token),
        headers.get(&names.vendor_header),
        headers.get(&names.api_key_header),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .collect();

    if candidates.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    // No short-circuit: every candidate is compared.
    let matched = candidates
        .iter()
        .fold(false, |acc, c| constant_time_eq(expected, c.as_bytes()) | acc);

    if matched && !expected.is_empty() {
        Ok(())
    } else {
        Err(AuthError::InvalidCredential)
    }
}

/// Strip a case-insensitive `Bearer ` scheme prefix.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Constant-time byte comparison (XOR-based).
///
/// Returns true if and only if `a == b`. Time taken is independent of how
/// many bytes match.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> SecretHeaders {
        SecretHeaders {
            vendor_header: "x-harness-webhook-token".to_string(),
            api_key_header: "x-api-key".to_string(),
        }
    }

    fn secret() -> SecretString {
        SecretString::from("s3cret-token".to_string())
    }

    #[test]
    fn test_bearer_header_authorizes() {
        let headers = RequestHeaders::from_pairs([("Authorization", "Bearer s3cret-token")]);
        assert!(authorize(&headers, &secret(), &names()).is_ok());

        let lower = RequestHeaders::from_pairs([("authorization", "bearer s3cret-token")]);
        assert!(authorize(&lower, &secret(), &names()).is_ok());
    }

    #[test]
    fn test_vendor_header_authorizes() {
        let headers = RequestHeaders::from_pairs([("X-Harness-Webhook-Token", "s3cret-token")]);
        assert!(authorize(&headers, &secret(), &names()).is_ok());
    }

    #[test]
    fn test_api_key_header_authorizes() {
        let headers = RequestHeaders::from_pairs([("x-api-key", "s3cret-token")]);
        assert!(authorize(&headers, &secret(), &names()).is_ok());
    }

    #[test]
    fn test_any_match_authorizes() {
        let headers = RequestHeaders::from_pairs([
            ("authorization", "Bearer wrong"),
            ("x-api-key", "s3cret-token"),
        ]);
        assert!(authorize(&headers, &secret(), &names()).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let headers = RequestHeaders::from_pairs([("authorization", "Bearer nope")]);
        assert_eq!(
            authorize(&headers, &secret(), &names()),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn test_basic_scheme_is_not_bearer() {
        let headers = RequestHeaders::from_pairs([("authorization", "Basic s3cret-token")]);
        assert_eq!(
            authorize(&headers, &secret(), &names()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(
            authorize(&RequestHeaders::new(), &secret(), &names()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_empty_expected_secret_never_matches() {
        let empty = SecretString::from(String::new());
        let headers = RequestHeaders::from_pairs([("x-api-key", "anything")]);
        assert!(authorize(&headers, &empty, &names()).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer string"));
        assert!(constant_time_eq(b"", b""));
    }
}
