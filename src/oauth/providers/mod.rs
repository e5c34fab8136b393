//! Per-provider adapters.
//!
//! ARCHITECTURE
//! ============
//! `ProviderAdapter` is the capability set every provider offers: build the
//! authorization URL, exchange a code, fetch a normalized identity, read a
//! follower metric, revoke a token, and derive a public profile URL. Default
//! methods cover the plain OAuth2 behavior; provider modules override only
//! what differs.

pub mod github;
pub mod instagram;
pub mod linkedin;
pub mod twitter;
pub mod youtube;

use serde_json::Value;

use super::{Identity, ProviderDescriptor, ProviderError, RevokeOutcome, TokenSet};

#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Build the provider authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint is malformed.
    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> Result<String, url::ParseError> {
        self.descriptor().authorization_url(state, code_challenge)
    }

    async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, ProviderError> {
        super::exchange_code(http, self.descriptor(), code, code_verifier).await
    }

    async fn refresh(&self, http: &reqwest::Client, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        super::refresh_tokens(http, self.descriptor(), refresh_token).await
    }

    /// Fetch the user-info document with bearer auth and normalize it.
    async fn fetch_identity(&self, http: &reqwest::Client, access_token: &str) -> Result<Identity, ProviderError> {
        let request = http
            .get(&self.descriptor().endpoints.user_info)
            .bearer_auth(access_token);
        let body = super::send_json(self.id(), request).await?;
        Ok(self.normalize_identity(&body))
    }

    /// Map a provider user-info document to `{username, account_id}`.
    fn normalize_identity(&self, _body: &Value) -> Identity {
        Identity::fallback()
    }

    /// Current follower-equivalent count. `Ok(None)` means the provider does
    /// not expose one.
    async fn fetch_metric(&self, _http: &reqwest::Client, _access_token: &str) -> Result<Option<u64>, ProviderError> {
        Ok(None)
    }

    async fn revoke(&self, _http: &reqwest::Client, _access_token: &str) -> RevokeOutcome {
        RevokeOutcome::NotSupported
    }

    /// Public profile URL for the derived social link. `None` skips link creation.
    fn profile_url(&self, _identity: &Identity) -> Option<String> {
        None
    }

    /// Whether a zero count should be left out of user-facing summaries.
    fn hides_zero_metric(&self) -> bool {
        false
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Non-empty string at a nested JSON path.
pub(crate) fn str_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().filter(|s| !s.trim().is_empty())
}

/// Value at a nested JSON path rendered as a string; numbers are accepted.
pub(crate) fn id_at(body: &Value, path: &[&str]) -> Option<String> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative integer at a nested path; numeric strings are accepted.
pub(crate) fn count_at(body: &Value, path: &[&str]) -> Option<u64> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Map a revoke response into a `RevokeOutcome`, logging the failure body.
pub(crate) async fn revoke_outcome(
    provider: &str,
    result: Result<reqwest::Response, reqwest::Error>,
) -> RevokeOutcome {
    match result {
        Ok(response) if response.status().is_success() => RevokeOutcome::Revoked,
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider, %status, body = %body, "token revocation rejected");
            RevokeOutcome::Failed(format!("provider returned {status}"))
        }
        Err(e) => {
            let err = ProviderError::transport(provider, e);
            tracing::warn!(provider, error = %err, "token revocation request failed");
            RevokeOutcome::Failed(err.to_string())
        }
    }
}

/// Strip a leading `@` from a handle.
pub(crate) fn bare_handle(username: &str) -> &str {
    username.trim_start_matches('@')
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
