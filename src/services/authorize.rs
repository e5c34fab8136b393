//! Authorization initiation: state token, optional PKCE pair, provider URL.

use time::OffsetDateTime;

use crate::oauth::pkce::{PkcePair, generate_state_token};
use crate::oauth::state_store::PendingAuthorization;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),
    #[error("invalid authorization endpoint for {provider}: {source}")]
    InvalidAuthorizeUrl {
        provider: String,
        #[source]
        source: url::ParseError,
    },
}

/// Start an authorization attempt and return the URL to redirect the browser to.
///
/// The pending state is stored only after the URL has been built, so a
/// malformed endpoint leaves nothing behind.
///
/// # Errors
///
/// Unknown provider id, missing client credentials, or an unparseable
/// authorization endpoint.
pub async fn begin_authorization(state: &AppState, provider_id: &str, profile_id: &str) -> Result<String, AuthorizeError> {
    let provider = state
        .providers
        .lookup(provider_id)
        .ok_or_else(|| AuthorizeError::UnknownProvider(provider_id.to_owned()))?;
    let descriptor = provider.descriptor();
    if !descriptor.is_configured() {
        return Err(AuthorizeError::ProviderNotConfigured(provider_id.to_owned()));
    }

    let state_token = generate_state_token();
    let pkce = descriptor.requires_pkce.then(PkcePair::generate);
    let url = provider
        .authorization_url(&state_token, pkce.as_ref().map(|p| p.challenge.as_str()))
        .map_err(|source| AuthorizeError::InvalidAuthorizeUrl { provider: provider_id.to_owned(), source })?;

    state
        .pending
        .insert(
            state_token,
            PendingAuthorization {
                profile_id: profile_id.to_owned(),
                provider: provider_id.to_owned(),
                created_at: OffsetDateTime::now_utc(),
                code_verifier: pkce.map(|p| p.verifier),
            },
        )
        .await;

    tracing::info!(provider = provider_id, profile_id, pkce = descriptor.requires_pkce, "authorization started");
    Ok(url)
}

#[cfg(test)]
#[path = "authorize_test.rs"]
mod tests;
