//! Persistence seam for connected accounts, derived links, and follower history.
//!
//! DESIGN
//! ======
//! Services talk to `Repository` only. `PgRepository` is the production
//! backend; `MemoryRepository` backs tests and database-less runs. Both
//! enforce one connected account per (profile, provider) and keep
//! `connected_at` fixed across reconnects.

pub mod memory;
pub mod postgres;

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

// =============================================================================
// RECORDS
// =============================================================================

/// A linked provider identity and its tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectedAccount {
    pub id: Uuid,
    pub profile_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<OffsetDateTime>,
    pub connected_at: OffsetDateTime,
}

impl ConnectedAccount {
    /// Whether the stored access token is past its expiry at `now`.
    #[must_use]
    pub fn token_expired_at(&self, now: OffsetDateTime) -> bool {
        self.token_expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for ConnectedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedAccount")
            .field("id", &self.id)
            .field("profile_id", &self.profile_id)
            .field("provider", &self.provider)
            .field("provider_account_id", &self.provider_account_id)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_expires_at", &self.token_expires_at)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Fields written by a successful callback.
#[derive(Clone)]
pub struct AccountUpsert {
    pub profile_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<OffsetDateTime>,
}

/// Result of an upsert: the stored row and whether it was newly created.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub account: ConnectedAccount,
    pub created: bool,
}

/// Tokens written back after a refresh. A `None` refresh token keeps the
/// stored one.
#[derive(Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLink {
    pub id: Uuid,
    pub profile_id: String,
    pub platform: String,
    pub url: String,
    pub display_text: String,
    pub display_order: i32,
    pub created_at: OffsetDateTime,
}

/// A link to append after the profile's current last link.
#[derive(Debug, Clone)]
pub struct NewSocialLink {
    pub profile_id: String,
    pub platform: String,
    pub url: String,
    pub display_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerHistoryEntry {
    pub profile_id: String,
    pub provider: String,
    pub follower_count: i64,
    pub recorded_at: OffsetDateTime,
}

// =============================================================================
// TRAIT
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record not found")]
    NotFound,
}

#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    async fn get_connected_account(&self, profile_id: &str, provider: &str) -> Result<Option<ConnectedAccount>, RepoError>;

    /// Accounts for a profile, newest connection first.
    async fn list_connected_accounts(&self, profile_id: &str) -> Result<Vec<ConnectedAccount>, RepoError>;

    /// Insert or update the single account for `(profile_id, provider)`.
    async fn upsert_connected_account(&self, upsert: AccountUpsert) -> Result<Upserted, RepoError>;

    /// Replace tokens on an existing account.
    ///
    /// # Errors
    ///
    /// `RepoError::NotFound` when no account exists for the pair.
    async fn update_tokens(&self, profile_id: &str, provider: &str, update: TokenUpdate) -> Result<(), RepoError>;

    /// Returns whether a row was deleted.
    async fn delete_connected_account(&self, profile_id: &str, provider: &str) -> Result<bool, RepoError>;

    /// Links for a profile in display order.
    async fn list_social_links(&self, profile_id: &str) -> Result<Vec<SocialLink>, RepoError>;

    /// Append a link at `max(display_order, 0) + 1`.
    async fn create_social_link(&self, link: NewSocialLink) -> Result<SocialLink, RepoError>;

    /// Append a link derived from a connected account, atomically skipped
    /// when the profile already links this platform. `None` when skipped.
    async fn create_derived_link(&self, link: NewSocialLink) -> Result<Option<SocialLink>, RepoError>;

    /// Returns the number of links removed.
    async fn delete_social_links_by_platform(&self, profile_id: &str, platform: &str) -> Result<u64, RepoError>;

    async fn append_follower_count(&self, entry: FollowerHistoryEntry) -> Result<(), RepoError>;

    /// Most recent readings for the pair, newest first.
    async fn recent_follower_counts(
        &self,
        profile_id: &str,
        provider: &str,
        limit: i64,
    ) -> Result<Vec<FollowerHistoryEntry>, RepoError>;
}
