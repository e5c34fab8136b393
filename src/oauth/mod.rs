//! OAuth provider plumbing: descriptors, token exchange, adapters.
//!
//! DESIGN
//! ======
//! Every supported provider is a `ProviderAdapter` that owns a static
//! `ProviderDescriptor`. Shared flow code (authorize, callback, stats,
//! disconnect) talks to the trait only, so per-provider quirks (Basic auth on
//! the token endpoint, token-in-query identity calls, secondary channel
//! lookups, revoke mechanics) stay inside the provider module.
//!
//! SECRETS
//! =======
//! Client secrets, access/refresh tokens and PKCE verifiers never appear in
//! `Debug` output or error messages. Transport errors are stripped of their
//! URL because some providers carry the token in the query string.

pub mod pkce;
pub mod providers;
pub mod registry;
pub mod state_store;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

pub use providers::ProviderAdapter;
pub use registry::ProviderRegistry;

pub const DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = "linkfolio";

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// How client credentials reach the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAuth {
    /// `client_id` / `client_secret` as form fields.
    Body,
    /// HTTP Basic header; credentials are left out of the form body.
    Basic,
}

/// Provider endpoints. Optional entries are absent for providers that do not
/// expose the capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize: String,
    pub token: String,
    pub user_info: String,
    pub metrics: Option<String>,
    pub channel: Option<String>,
    pub revoke: Option<String>,
}

/// Client credentials issued by the provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }

    /// Read `{PREFIX}_CLIENT_ID` and `{PREFIX}_CLIENT_SECRET`. Missing values
    /// become empty strings; the descriptor then reports itself unconfigured.
    #[must_use]
    pub fn from_env(prefix: &str) -> Self {
        Self {
            client_id: std::env::var(format!("{prefix}_CLIENT_ID")).unwrap_or_default(),
            client_secret: std::env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .finish()
    }
}

/// Static provider configuration, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub credentials: Credentials,
    pub redirect_uri: String,
    pub endpoints: ProviderEndpoints,
    pub scopes: Vec<String>,
    pub requires_pkce: bool,
    pub token_auth: TokenAuth,
    /// Extra authorization parameters; empty values are skipped.
    pub extra_auth_params: BTreeMap<String, String>,
}

impl ProviderDescriptor {
    /// A descriptor is usable only with both client id and secret present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.credentials.client_id.is_empty() && !self.credentials.client_secret.is_empty()
    }

    /// Build the authorization URL the browser is redirected to.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is not a URL.
    pub fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(&self.endpoints.authorize)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.credentials.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
            if let Some(challenge) = code_challenge {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
            }
            for (key, value) in &self.extra_auth_params {
                if !value.is_empty() {
                    query.append_pair(key, value);
                }
            }
        }
        Ok(url.into())
    }
}

/// Redirect URI registered with every provider: `{base}/api/auth/{id}/callback`.
#[must_use]
pub fn redirect_uri(base_url: &str, provider_id: &str) -> String {
    format!("{}/api/auth/{provider_id}/callback", base_url.trim_end_matches('/'))
}

// =============================================================================
// TOKENS AND IDENTITY
// =============================================================================

/// Tokens returned by a code exchange or refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds as reported by the provider.
    pub expires_in: Option<i64>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redacted))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Normalized provider identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub account_id: String,
}

impl Identity {
    /// Values used when no extraction rule exists for a provider.
    #[must_use]
    pub fn fallback() -> Self {
        Self { username: "Unknown".into(), account_id: "unknown".into() }
    }
}

/// Result of a best-effort token revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RevokeOutcome {
    Revoked,
    NotSupported,
    Failed(String),
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure talking to a provider. Never carries tokens or secrets.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },
    #[error("{provider} returned {status}: {body}")]
    Status { provider: String, status: u16, body: String },
    #[error("{provider} response could not be parsed: {detail}")]
    Parse { provider: String, detail: String },
    #[error("{provider} token response carried no access token")]
    MissingAccessToken { provider: String },
}

impl ProviderError {
    pub(crate) fn transport(provider: &str, err: reqwest::Error) -> Self {
        Self::Transport { provider: provider.to_owned(), detail: err.without_url().to_string() }
    }

    pub(crate) fn parse(provider: &str, detail: impl fmt::Display) -> Self {
        Self::Parse { provider: provider.to_owned(), detail: detail.to_string() }
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Timeouts applied to every outbound provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Build the shared HTTP client used for all provider calls.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(timeouts: ProviderTimeouts) -> Result<reqwest::Client, reqwest::Error> {
    build_http_client_with(Duration::from_secs(timeouts.request_secs), Duration::from_secs(timeouts.connect_secs))
}

pub(crate) fn build_http_client_with(request: Duration, connect: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(request)
        .connect_timeout(connect)
        .user_agent(USER_AGENT)
        .build()
}

/// Send a request and decode a JSON body, mapping failures per provider.
pub(crate) async fn send_json(provider: &str, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    if !status.is_success() {
        return Err(ProviderError::Status { provider: provider.to_owned(), status: status.as_u16(), body: text });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::parse(provider, e))
}

/// Exchange an authorization code for tokens.
///
/// # Errors
///
/// Returns `ProviderError` on transport failure, non-success status, an
/// unparseable body, or a body without `access_token`.
pub async fn exchange_code(
    http: &reqwest::Client,
    descriptor: &ProviderDescriptor,
    code: &str,
    code_verifier: Option<&str>,
) -> Result<TokenSet, ProviderError> {
    let mut form = vec![
        ("code", code.to_owned()),
        ("redirect_uri", descriptor.redirect_uri.clone()),
        ("grant_type", "authorization_code".to_owned()),
    ];
    if let Some(verifier) = code_verifier {
        form.push(("code_verifier", verifier.to_owned()));
    }
    request_tokens(http, descriptor, form).await
}

/// Trade a refresh token for a fresh access token.
///
/// # Errors
///
/// Same failure surface as [`exchange_code`].
pub async fn refresh_tokens(
    http: &reqwest::Client,
    descriptor: &ProviderDescriptor,
    refresh_token: &str,
) -> Result<TokenSet, ProviderError> {
    let form = vec![
        ("refresh_token", refresh_token.to_owned()),
        ("grant_type", "refresh_token".to_owned()),
    ];
    request_tokens(http, descriptor, form).await
}

async fn request_tokens(
    http: &reqwest::Client,
    descriptor: &ProviderDescriptor,
    mut form: Vec<(&'static str, String)>,
) -> Result<TokenSet, ProviderError> {
    let mut request = http
        .post(&descriptor.endpoints.token)
        .header(reqwest::header::ACCEPT, "application/json");

    match descriptor.token_auth {
        TokenAuth::Body => {
            form.push(("client_id", descriptor.credentials.client_id.clone()));
            form.push(("client_secret", descriptor.credentials.client_secret.clone()));
        }
        TokenAuth::Basic => {
            request = request.basic_auth(&descriptor.credentials.client_id, Some(&descriptor.credentials.client_secret));
        }
    }

    let body = send_json(&descriptor.id, request.form(&form)).await?;
    parse_token_response(&descriptor.id, &body)
}

/// Extract a `TokenSet` from a token endpoint JSON body.
pub(crate) fn parse_token_response(provider: &str, body: &Value) -> Result<TokenSet, ProviderError> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::MissingAccessToken { provider: provider.to_owned() })?;
    let refresh_token = body
        .get("refresh_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    // Some providers send `expires_in` as a string.
    let expires_in = body.get("expires_in").and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });

    Ok(TokenSet { access_token: access_token.to_owned(), refresh_token, expires_in })
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
