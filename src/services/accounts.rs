//! Browser-facing account listing. Tokens never leave the repository layer.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::repo::{ConnectedAccount, RepoError};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub profile_id: String,
    pub provider: String,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub connected_at: OffsetDateTime,
}

impl From<ConnectedAccount> for AccountSummary {
    fn from(account: ConnectedAccount) -> Self {
        Self {
            id: account.id,
            profile_id: account.profile_id,
            provider: account.provider,
            username: account.username,
            connected_at: account.connected_at,
        }
    }
}

/// Connected accounts for a profile, newest first.
///
/// # Errors
///
/// Propagates repository failures.
pub async fn list_accounts(state: &AppState, profile_id: &str) -> Result<Vec<AccountSummary>, RepoError> {
    let accounts = state.repo.list_connected_accounts(profile_id).await?;
    Ok(accounts.into_iter().map(AccountSummary::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_helpers::{seed_account, test_app_state};

    #[tokio::test]
    async fn summaries_never_carry_tokens() {
        let state = test_app_state("http://127.0.0.1:9");
        seed_account(&state, "p1", "github", "gho_very_secret").await;

        let summaries = list_accounts(&state, "p1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        let json = serde_json::to_string(&summaries).unwrap();
        assert!(!json.contains("gho_very_secret"));
        assert!(json.contains("\"profileId\":\"p1\""));
        assert!(json.contains("connectedAt"));
    }

    #[tokio::test]
    async fn other_profiles_are_excluded() {
        let state = test_app_state("http://127.0.0.1:9");
        seed_account(&state, "p1", "github", "a").await;
        seed_account(&state, "p2", "twitter", "b").await;

        let summaries = list_accounts(&state, "p2").await.unwrap();
        assert_eq!(summaries.iter().map(|s| s.provider.as_str()).collect::<Vec<_>>(), vec!["twitter"]);
    }
}
