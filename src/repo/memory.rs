//! In-process repository. One `RwLock` guards every table so each trait
//! call is atomic with respect to the others.

use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountUpsert, ConnectedAccount, FollowerHistoryEntry, NewSocialLink, RepoError, Repository, SocialLink,
    TokenUpdate, Upserted,
};

#[derive(Default)]
struct Tables {
    accounts: Vec<ConnectedAccount>,
    links: Vec<SocialLink>,
    history: Vec<FollowerHistoryEntry>,
}

impl Tables {
    /// Append at `max(display_order, 0) + 1` within the profile.
    fn push_link(&mut self, link: NewSocialLink) -> SocialLink {
        let max_order = self
            .links
            .iter()
            .filter(|l| l.profile_id == link.profile_id)
            .map(|l| l.display_order)
            .max()
            .unwrap_or(0);
        let created = SocialLink {
            id: Uuid::new_v4(),
            profile_id: link.profile_id,
            platform: link.platform,
            url: link.url,
            display_text: link.display_text,
            display_order: max_order.max(0) + 1,
            created_at: OffsetDateTime::now_utc(),
        };
        self.links.push(created.clone());
        created
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(account: &ConnectedAccount, profile_id: &str, provider: &str) -> bool {
    account.profile_id == profile_id && account.provider == provider
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn get_connected_account(&self, profile_id: &str, provider: &str) -> Result<Option<ConnectedAccount>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .iter()
            .find(|a| matches(a, profile_id, provider))
            .cloned())
    }

    async fn list_connected_accounts(&self, profile_id: &str) -> Result<Vec<ConnectedAccount>, RepoError> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<ConnectedAccount> = tables
            .accounts
            .iter()
            .filter(|a| a.profile_id == profile_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));
        Ok(accounts)
    }

    async fn upsert_connected_account(&self, upsert: AccountUpsert) -> Result<Upserted, RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .accounts
            .iter_mut()
            .find(|a| matches(a, &upsert.profile_id, &upsert.provider))
        {
            existing.provider_account_id = upsert.provider_account_id;
            existing.username = upsert.username;
            existing.access_token = upsert.access_token;
            if upsert.refresh_token.is_some() {
                existing.refresh_token = upsert.refresh_token;
            }
            if upsert.token_expires_at.is_some() {
                existing.token_expires_at = upsert.token_expires_at;
            }
            return Ok(Upserted { account: existing.clone(), created: false });
        }

        let account = ConnectedAccount {
            id: Uuid::new_v4(),
            profile_id: upsert.profile_id,
            provider: upsert.provider,
            provider_account_id: upsert.provider_account_id,
            username: upsert.username,
            access_token: upsert.access_token,
            refresh_token: upsert.refresh_token,
            token_expires_at: upsert.token_expires_at,
            connected_at: OffsetDateTime::now_utc(),
        };
        tables.accounts.push(account.clone());
        Ok(Upserted { account, created: true })
    }

    async fn update_tokens(&self, profile_id: &str, provider: &str, update: TokenUpdate) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| matches(a, profile_id, provider))
            .ok_or(RepoError::NotFound)?;
        account.access_token = update.access_token;
        if update.refresh_token.is_some() {
            account.refresh_token = update.refresh_token;
        }
        account.token_expires_at = update.token_expires_at;
        Ok(())
    }

    async fn delete_connected_account(&self, profile_id: &str, provider: &str) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.accounts.len();
        tables.accounts.retain(|a| !matches(a, profile_id, provider));
        Ok(tables.accounts.len() < before)
    }

    async fn list_social_links(&self, profile_id: &str) -> Result<Vec<SocialLink>, RepoError> {
        let tables = self.tables.read().await;
        let mut links: Vec<SocialLink> = tables
            .links
            .iter()
            .filter(|l| l.profile_id == profile_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.display_order);
        Ok(links)
    }

    async fn create_social_link(&self, link: NewSocialLink) -> Result<SocialLink, RepoError> {
        let mut tables = self.tables.write().await;
        Ok(tables.push_link(link))
    }

    async fn create_derived_link(&self, link: NewSocialLink) -> Result<Option<SocialLink>, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.links.iter().any(|l| l.profile_id == link.profile_id && l.platform == link.platform) {
            return Ok(None);
        }
        Ok(Some(tables.push_link(link)))
    }

    async fn delete_social_links_by_platform(&self, profile_id: &str, platform: &str) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.links.len();
        tables
            .links
            .retain(|l| !(l.profile_id == profile_id && l.platform == platform));
        Ok((before - tables.links.len()) as u64)
    }

    async fn append_follower_count(&self, entry: FollowerHistoryEntry) -> Result<(), RepoError> {
        self.tables.write().await.history.push(entry);
        Ok(())
    }

    async fn recent_follower_counts(
        &self,
        profile_id: &str,
        provider: &str,
        limit: i64,
    ) -> Result<Vec<FollowerHistoryEntry>, RepoError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<FollowerHistoryEntry> = tables
            .history
            .iter()
            .filter(|e| e.profile_id == profile_id && e.provider == provider)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reversing
        // then puts the latest append first.
        entries.sort_by_key(|e| e.recorded_at);
        entries.reverse();
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
