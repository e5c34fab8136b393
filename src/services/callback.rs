//! OAuth callback handling.
//!
//! DESIGN
//! ======
//! One callback drives one authorization attempt from `Pending` to a terminal
//! outcome. The pending state is consumed before any provider call, so a
//! replayed callback always fails with `InvalidState` no matter how the first
//! attempt ended.
//!
//! ERROR HANDLING
//! ==============
//! Every failure maps to a `CallbackFailure` with a stable `code()` and a
//! browser-safe `description()`. Provider response bodies and other
//! diagnostics are logged server-side only.

use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::oauth::{Identity, ProviderAdapter, ProviderError};
use crate::repo::{AccountUpsert, NewSocialLink, RepoError, SocialLink};
use crate::state::AppState;

/// Query parameters a provider appends to the redirect URI.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A successful connection.
#[derive(Debug, Clone)]
pub struct Connected {
    pub provider: String,
    pub profile_id: String,
    pub account_id: Uuid,
    pub username: String,
    /// `false` when an existing connection was refreshed in place.
    pub created: bool,
    /// The derived link, when one was created by this callback.
    pub link: Option<SocialLink>,
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackFailure {
    #[error("provider reported {error}")]
    ProviderDenied { error: String, description: Option<String> },
    #[error("authorization code or state missing")]
    MissingParameters,
    #[error("state unknown, expired, or issued for another provider")]
    InvalidState,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("token exchange failed: {0}")]
    TokenExchange(ProviderError),
    #[error("{0}")]
    NoAccessToken(ProviderError),
    #[error("user info fetch failed: {0}")]
    UserInfo(ProviderError),
    #[error("{provider} user info carried no account id")]
    InvalidUserData { provider: String },
    #[error("storage failure: {0}")]
    Storage(#[from] RepoError),
}

impl CallbackFailure {
    /// Stable snake_case code carried back to the frontend.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ProviderDenied { error, .. } => error.as_str(),
            Self::MissingParameters => "missing_code_or_state",
            Self::InvalidState => "invalid_state",
            Self::UnknownProvider(_) => "invalid_platform",
            Self::NotConfigured(_) => "provider_not_configured",
            Self::TokenExchange(_) => "token_exchange_failed",
            Self::NoAccessToken(_) => "no_access_token",
            Self::UserInfo(_) => "user_info_failed",
            Self::InvalidUserData { .. } => "invalid_user_data",
            Self::Storage(_) => "callback_error",
        }
    }

    /// Human-readable reason that is safe to show in the browser.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::ProviderDenied { description, .. } => description.clone().unwrap_or_default(),
            Self::MissingParameters => "Authorization code or state was missing".into(),
            Self::InvalidState => "Authorization request expired or was not recognised".into(),
            Self::UnknownProvider(_) => "Unsupported platform".into(),
            Self::NotConfigured(_) => "Platform is not configured".into(),
            Self::TokenExchange(_) => "Could not exchange the authorization code".into(),
            Self::NoAccessToken(_) => "Platform did not return an access token".into(),
            Self::UserInfo(_) => "Could not load the account profile".into(),
            Self::InvalidUserData { .. } => "Account profile had no identifier".into(),
            Self::Storage(_) => "Connection could not be saved".into(),
        }
    }
}

/// Complete an authorization attempt for `provider_id`.
///
/// # Errors
///
/// See [`CallbackFailure`]; each variant is one terminal failure.
pub async fn handle_callback(
    state: &AppState,
    provider_id: &str,
    params: CallbackParams,
) -> Result<Connected, CallbackFailure> {
    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        tracing::warn!(
            provider = provider_id,
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "provider reported authorization error"
        );
        return Err(CallbackFailure::ProviderDenied { error, description: params.error_description });
    }

    let (Some(code), Some(state_token)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        return Err(CallbackFailure::MissingParameters);
    };

    let Some(pending) = state.pending.consume(&state_token, provider_id).await else {
        tracing::warn!(provider = provider_id, "callback with unknown or mismatched state");
        return Err(CallbackFailure::InvalidState);
    };

    let provider = state
        .providers
        .lookup(provider_id)
        .ok_or_else(|| CallbackFailure::UnknownProvider(provider_id.to_owned()))?;
    if !provider.descriptor().is_configured() {
        return Err(CallbackFailure::NotConfigured(provider_id.to_owned()));
    }

    let verifier = pending.code_verifier.as_deref().filter(|_| provider.descriptor().requires_pkce);
    let tokens = provider
        .exchange_code(&state.http, &code, verifier)
        .await
        .map_err(|e| {
            tracing::error!(provider = provider_id, error = %e, "token exchange failed");
            match e {
                ProviderError::MissingAccessToken { .. } => CallbackFailure::NoAccessToken(e),
                other => CallbackFailure::TokenExchange(other),
            }
        })?;

    let identity = provider
        .fetch_identity(&state.http, &tokens.access_token)
        .await
        .map_err(|e| {
            tracing::error!(provider = provider_id, error = %e, "user info fetch failed");
            CallbackFailure::UserInfo(e)
        })?;
    if identity.account_id.is_empty() {
        tracing::error!(provider = provider_id, "user info carried no account id");
        return Err(CallbackFailure::InvalidUserData { provider: provider_id.to_owned() });
    }

    let token_expires_at = tokens
        .expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs));
    let upserted = state
        .repo
        .upsert_connected_account(AccountUpsert {
            profile_id: pending.profile_id.clone(),
            provider: provider_id.to_owned(),
            provider_account_id: identity.account_id.clone(),
            username: identity.username.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at,
        })
        .await
        .inspect_err(|e| tracing::error!(provider = provider_id, error = %e, "connected account upsert failed"))?;

    let link = ensure_social_link(state, provider.as_ref(), &pending.profile_id, &identity)
        .await
        .inspect_err(|e| tracing::error!(provider = provider_id, error = %e, "derived link creation failed"))?;

    tracing::info!(
        provider = provider_id,
        profile_id = %pending.profile_id,
        created = upserted.created,
        "account connected"
    );
    Ok(Connected {
        provider: provider_id.to_owned(),
        profile_id: pending.profile_id,
        account_id: upserted.account.id,
        username: upserted.account.username,
        created: upserted.created,
        link,
    })
}

/// `@username` unless it already carries the `@`.
pub(crate) fn display_text(username: &str) -> String {
    if username.starts_with('@') { username.to_owned() } else { format!("@{username}") }
}

/// Create the derived link unless the profile already has one for this
/// platform or the provider yields no URL.
async fn ensure_social_link(
    state: &AppState,
    provider: &dyn ProviderAdapter,
    profile_id: &str,
    identity: &Identity,
) -> Result<Option<SocialLink>, RepoError> {
    let Some(url) = provider.profile_url(identity).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    state
        .repo
        .create_derived_link(NewSocialLink {
            profile_id: profile_id.to_owned(),
            platform: provider.id().to_owned(),
            url,
            display_text: display_text(&identity.username),
        })
        .await
}

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;
