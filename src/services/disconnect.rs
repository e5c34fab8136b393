//! Disconnect: best-effort revocation, then local account and link removal.

use serde::Serialize;

use crate::oauth::RevokeOutcome;
use crate::repo::RepoError;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum DisconnectError {
    #[error("{provider} is not connected")]
    NotConnected { provider: String },
    #[error("storage failure: {0}")]
    Storage(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DisconnectReport {
    pub provider: String,
    pub revocation: RevokeOutcome,
    pub links_removed: u64,
}

/// Disconnect `provider_id` from `profile_id`.
///
/// Revocation never blocks removal; its outcome is reported back.
///
/// # Errors
///
/// `NotConnected` when no account exists for the pair, or a storage failure.
pub async fn disconnect(state: &AppState, profile_id: &str, provider_id: &str) -> Result<DisconnectReport, DisconnectError> {
    let account = state
        .repo
        .get_connected_account(profile_id, provider_id)
        .await?
        .ok_or_else(|| DisconnectError::NotConnected { provider: provider_id.to_owned() })?;

    let revocation = match state.providers.lookup(provider_id) {
        Some(provider) => provider.revoke(&state.http, &account.access_token).await,
        None => RevokeOutcome::NotSupported,
    };
    match &revocation {
        RevokeOutcome::Revoked => tracing::info!(provider = provider_id, profile_id, "token revoked"),
        RevokeOutcome::NotSupported => tracing::debug!(provider = provider_id, "provider has no revocation endpoint"),
        RevokeOutcome::Failed(reason) => {
            tracing::warn!(provider = provider_id, profile_id, reason = %reason, "revocation failed; disconnecting anyway");
        }
    }

    state.repo.delete_connected_account(profile_id, provider_id).await?;
    let links_removed = state
        .repo
        .delete_social_links_by_platform(profile_id, provider_id)
        .await?;

    tracing::info!(provider = provider_id, profile_id, links_removed, "account disconnected");
    Ok(DisconnectReport { provider: provider_id.to_owned(), revocation, links_removed })
}

#[cfg(test)]
#[path = "disconnect_test.rs"]
mod tests;
