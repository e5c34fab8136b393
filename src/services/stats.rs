//! Follower stats: per-provider metric fetch, history append, growth signal.
//!
//! DESIGN
//! ======
//! Every connected account of a profile is handled by its own future and the
//! futures are joined, so one slow provider costs at most the HTTP client
//! timeout and never blocks the others. A failed fetch records a reading of 0
//! for that provider only.
//!
//! GROWTH
//! ======
//! Measured growth compares against the previous stored reading. Without a
//! usable previous reading the value is a size-tiered estimate, flagged with
//! `GrowthBasis::Estimated` so clients can tell it apart.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use time::OffsetDateTime;

use crate::oauth::ProviderRegistry;
use crate::repo::{ConnectedAccount, FollowerHistoryEntry, RepoError, TokenUpdate};
use crate::state::AppState;

const FRESH_ACCOUNT_GROWTH: f64 = 2.5;
const MAX_ESTIMATED_GROWTH: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthBasis {
    /// Compared against a previous non-zero reading.
    Measured,
    /// Heuristic placeholder; no usable history yet.
    Estimated,
    /// No followers and no history.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProviderStats {
    pub count: u64,
    /// Percent, one decimal place.
    pub growth: f64,
    pub basis: GrowthBasis,
}

impl ProviderStats {
    const EMPTY: Self = Self { count: 0, growth: 0.0, basis: GrowthBasis::None };
}

/// Fetch current counts for every connected account of `profile_id`.
///
/// # Errors
///
/// Only listing the profile's accounts is fatal; per-provider failures are
/// logged and reported as zero counts.
pub async fn refresh_stats(state: &AppState, profile_id: &str) -> Result<BTreeMap<String, ProviderStats>, RepoError> {
    let accounts = state.repo.list_connected_accounts(profile_id).await?;
    let now = OffsetDateTime::now_utc();

    let results = join_all(accounts.iter().map(|account| provider_stats(state, account, now))).await;
    Ok(accounts
        .iter()
        .map(|a| a.provider.clone())
        .zip(results)
        .collect())
}

/// Drop zero counts for providers that never expose a metric.
#[must_use]
pub fn visible_stats(
    providers: &ProviderRegistry,
    stats: BTreeMap<String, ProviderStats>,
) -> BTreeMap<String, ProviderStats> {
    stats
        .into_iter()
        .filter(|(id, s)| {
            s.count > 0
                || !providers
                    .lookup(id)
                    .is_some_and(|p| p.hides_zero_metric())
        })
        .collect()
}

async fn provider_stats(state: &AppState, account: &ConnectedAccount, now: OffsetDateTime) -> ProviderStats {
    let provider_id = account.provider.as_str();
    let Some(provider) = state.providers.lookup(provider_id) else {
        tracing::warn!(provider = provider_id, "connected account for unregistered provider");
        return ProviderStats::EMPTY;
    };

    let access_token = current_access_token(state, account, now).await;
    let fetched = match provider.fetch_metric(&state.http, &access_token).await {
        Ok(count) => Some(count.unwrap_or(0)),
        Err(e) => {
            tracing::warn!(provider = provider_id, profile_id = %account.profile_id, error = %e, "metric fetch failed");
            None
        }
    };
    let count = fetched.unwrap_or(0);

    let appended = state
        .repo
        .append_follower_count(FollowerHistoryEntry {
            profile_id: account.profile_id.clone(),
            provider: provider_id.to_owned(),
            follower_count: i64::try_from(count).unwrap_or(i64::MAX),
            recorded_at: now,
        })
        .await
        .inspect_err(|e| tracing::error!(provider = provider_id, error = %e, "follower history append failed"))
        .is_ok();

    // A failed fetch is recorded as zero but never measured against history.
    if fetched.is_none() {
        return ProviderStats::EMPTY;
    }

    let previous = match state.repo.recent_follower_counts(&account.profile_id, provider_id, 2).await {
        // The newest entry is the one just written.
        Ok(history) => history
            .get(usize::from(appended))
            .map(|e| u64::try_from(e.follower_count).unwrap_or(0)),
        Err(e) => {
            tracing::error!(provider = provider_id, error = %e, "follower history read failed");
            None
        }
    };

    let (growth, basis) = compute_growth(count, previous, now - account.connected_at);
    ProviderStats { count, growth, basis }
}

/// Refresh an expired token when a refresh token is stored. Any failure
/// falls back to the stored access token.
async fn current_access_token(state: &AppState, account: &ConnectedAccount, now: OffsetDateTime) -> String {
    let (true, Some(refresh_token)) = (account.token_expired_at(now), account.refresh_token.as_deref()) else {
        return account.access_token.clone();
    };
    let Some(provider) = state.providers.lookup(&account.provider) else {
        return account.access_token.clone();
    };

    let tokens = match provider.refresh(&state.http, refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(provider = %account.provider, error = %e, "token refresh failed");
            return account.access_token.clone();
        }
    };

    let update = TokenUpdate {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token,
        token_expires_at: tokens
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now + time::Duration::seconds(secs)),
    };
    if let Err(e) = state.repo.update_tokens(&account.profile_id, &account.provider, update).await {
        tracing::error!(provider = %account.provider, error = %e, "refreshed token could not be stored");
    } else {
        tracing::info!(provider = %account.provider, profile_id = %account.profile_id, "access token refreshed");
    }
    tokens.access_token
}

/// Growth percentage and how it was derived.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_growth(current: u64, previous: Option<u64>, connected_for: time::Duration) -> (f64, GrowthBasis) {
    if let Some(previous) = previous.filter(|p| *p > 0) {
        let delta = current as f64 - previous as f64;
        return (round_one_decimal(delta / previous as f64 * 100.0), GrowthBasis::Measured);
    }
    if current == 0 {
        return (0.0, GrowthBasis::None);
    }
    if connected_for >= time::Duration::DAY {
        (estimated_daily_growth(current).min(MAX_ESTIMATED_GROWTH), GrowthBasis::Estimated)
    } else {
        (FRESH_ACCOUNT_GROWTH, GrowthBasis::Estimated)
    }
}

/// Smaller accounts get a higher ceiling.
fn estimated_daily_growth(current: u64) -> f64 {
    match current {
        0..100 => 5.0,
        100..1_000 => 3.0,
        1_000..10_000 => 2.0,
        _ => 1.0,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
