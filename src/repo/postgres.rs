//! `sqlx` Postgres backend.
//!
//! The `(profile_id, provider)` unique index makes the account upsert a single
//! `INSERT ... ON CONFLICT` statement; `xmax = 0` on the returned row tells a
//! fresh insert from an update.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{
    AccountUpsert, ConnectedAccount, FollowerHistoryEntry, NewSocialLink, RepoError, Repository, SocialLink,
    TokenUpdate, Upserted,
};

const ACCOUNT_COLUMNS: &str = "id, profile_id, provider, provider_account_id, username, access_token, \
                               refresh_token, token_expires_at, connected_at";

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> Result<ConnectedAccount, sqlx::Error> {
    Ok(ConnectedAccount {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        provider: row.try_get("provider")?,
        provider_account_id: row.try_get("provider_account_id")?,
        username: row.try_get("username")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        token_expires_at: row.try_get("token_expires_at")?,
        connected_at: row.try_get("connected_at")?,
    })
}

fn link_from_row(row: &PgRow) -> Result<SocialLink, sqlx::Error> {
    Ok(SocialLink {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        platform: row.try_get("platform")?,
        url: row.try_get("url")?,
        display_text: row.try_get("display_text")?,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<FollowerHistoryEntry, sqlx::Error> {
    Ok(FollowerHistoryEntry {
        profile_id: row.try_get("profile_id")?,
        provider: row.try_get("provider")?,
        follower_count: row.try_get("follower_count")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

#[async_trait::async_trait]
impl Repository for PgRepository {
    async fn get_connected_account(&self, profile_id: &str, provider: &str) -> Result<Option<ConnectedAccount>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE profile_id = $1 AND provider = $2"
        ))
        .bind(profile_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn list_connected_accounts(&self, profile_id: &str) -> Result<Vec<ConnectedAccount>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE profile_id = $1 ORDER BY connected_at DESC"
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(account_from_row).collect::<Result<_, _>>()?)
    }

    async fn upsert_connected_account(&self, upsert: AccountUpsert) -> Result<Upserted, RepoError> {
        let row = sqlx::query(&format!(
            r"INSERT INTO connected_accounts
                  (id, profile_id, provider, provider_account_id, username, access_token, refresh_token, token_expires_at)
              VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (profile_id, provider) DO UPDATE SET
                  provider_account_id = EXCLUDED.provider_account_id,
                  username = EXCLUDED.username,
                  access_token = EXCLUDED.access_token,
                  refresh_token = COALESCE(EXCLUDED.refresh_token, connected_accounts.refresh_token),
                  token_expires_at = COALESCE(EXCLUDED.token_expires_at, connected_accounts.token_expires_at)
              RETURNING {ACCOUNT_COLUMNS}, (xmax = 0) AS inserted"
        ))
        .bind(&upsert.profile_id)
        .bind(&upsert.provider)
        .bind(&upsert.provider_account_id)
        .bind(&upsert.username)
        .bind(&upsert.access_token)
        .bind(&upsert.refresh_token)
        .bind(upsert.token_expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(Upserted { account: account_from_row(&row)?, created: row.try_get("inserted")? })
    }

    async fn update_tokens(&self, profile_id: &str, provider: &str, update: TokenUpdate) -> Result<(), RepoError> {
        let result = sqlx::query(
            r"UPDATE connected_accounts
              SET access_token = $3,
                  refresh_token = COALESCE($4, refresh_token),
                  token_expires_at = $5
              WHERE profile_id = $1 AND provider = $2",
        )
        .bind(profile_id)
        .bind(provider)
        .bind(&update.access_token)
        .bind(&update.refresh_token)
        .bind(update.token_expires_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_connected_account(&self, profile_id: &str, provider: &str) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM connected_accounts WHERE profile_id = $1 AND provider = $2")
            .bind(profile_id)
            .bind(provider)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_social_links(&self, profile_id: &str) -> Result<Vec<SocialLink>, RepoError> {
        let rows = sqlx::query(
            r"SELECT id, profile_id, platform, url, display_text, display_order, created_at
              FROM social_links WHERE profile_id = $1
              ORDER BY display_order, created_at",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(link_from_row).collect::<Result<_, _>>()?)
    }

    async fn create_social_link(&self, link: NewSocialLink) -> Result<SocialLink, RepoError> {
        let row = sqlx::query(
            r"INSERT INTO social_links (id, profile_id, platform, url, display_text, display_order)
              SELECT gen_random_uuid(), $1, $2, $3, $4,
                     GREATEST(COALESCE(MAX(display_order), 0), 0) + 1
              FROM social_links WHERE profile_id = $1
              RETURNING id, profile_id, platform, url, display_text, display_order, created_at",
        )
        .bind(&link.profile_id)
        .bind(&link.platform)
        .bind(&link.url)
        .bind(&link.display_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(link_from_row(&row)?)
    }

    async fn create_derived_link(&self, link: NewSocialLink) -> Result<Option<SocialLink>, RepoError> {
        // Concurrent callbacks that both pass the HAVING check collide on the
        // partial unique index; the loser inserts nothing.
        let row = sqlx::query(
            r"INSERT INTO social_links (id, profile_id, platform, url, display_text, display_order, derived)
              SELECT gen_random_uuid(), $1, $2, $3, $4,
                     GREATEST(COALESCE(MAX(display_order), 0), 0) + 1, TRUE
              FROM social_links WHERE profile_id = $1
              HAVING COUNT(*) FILTER (WHERE platform = $2) = 0
              ON CONFLICT (profile_id, platform) WHERE derived DO NOTHING
              RETURNING id, profile_id, platform, url, display_text, display_order, created_at",
        )
        .bind(&link.profile_id)
        .bind(&link.platform)
        .bind(&link.url)
        .bind(&link.display_text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(link_from_row).transpose()?)
    }

    async fn delete_social_links_by_platform(&self, profile_id: &str, platform: &str) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM social_links WHERE profile_id = $1 AND platform = $2")
            .bind(profile_id)
            .bind(platform)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_follower_count(&self, entry: FollowerHistoryEntry) -> Result<(), RepoError> {
        sqlx::query(
            r"INSERT INTO follower_history (profile_id, provider, follower_count, recorded_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(&entry.profile_id)
        .bind(&entry.provider)
        .bind(entry.follower_count)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_follower_counts(
        &self,
        profile_id: &str,
        provider: &str,
        limit: i64,
    ) -> Result<Vec<FollowerHistoryEntry>, RepoError> {
        let rows = sqlx::query(
            r"SELECT profile_id, provider, follower_count, recorded_at
              FROM follower_history
              WHERE profile_id = $1 AND provider = $2
              ORDER BY recorded_at DESC, id DESC
              LIMIT $3",
        )
        .bind(profile_id)
        .bind(provider)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(history_from_row).collect::<Result<_, _>>()?)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
