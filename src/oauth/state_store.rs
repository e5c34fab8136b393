//! Pending authorization state: CSRF state tokens awaiting their callback.
//!
//! DESIGN
//! ======
//! `PendingStateStore` is the seam; `MemoryStateStore` is the single-process
//! implementation backed by `Mutex<HashMap>`. A distributed deployment swaps
//! in a shared store behind the same trait.
//!
//! CONCURRENCY
//! ===========
//! Every operation takes the same lock, so `consume` and the sweep cannot
//! both observe one entry: a state yields at most one successful callback.
//! `consume` removes only when the recorded provider matches, so a
//! cross-provider replay neither succeeds nor burns the legitimate state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_STATE_TTL_SECS: u64 = 600;
pub const DEFAULT_STATE_SWEEP_SECS: u64 = 300;

/// Data recorded when an authorization flow starts.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub profile_id: String,
    pub provider: String,
    pub created_at: OffsetDateTime,
    pub code_verifier: Option<String>,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("profile_id", &self.profile_id)
            .field("provider", &self.provider)
            .field("created_at", &self.created_at)
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait::async_trait]
pub trait PendingStateStore: Send + Sync {
    /// Record a new pending authorization under `state`.
    async fn insert(&self, state: String, pending: PendingAuthorization);

    /// Atomically remove and return the entry for `state` if it exists, was
    /// issued for `provider`, and has not outlived the TTL.
    async fn consume(&self, state: &str, provider: &str) -> Option<PendingAuthorization>;

    /// Drop every entry older than the TTL. Returns the number removed.
    async fn purge_expired(&self) -> usize;

    /// Number of live entries.
    async fn len(&self) -> usize;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

#[derive(Clone)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    ttl: Duration,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), ttl }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAuthorization>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, pending: &PendingAuthorization, now: OffsetDateTime) -> bool {
        now - pending.created_at > self.ttl
    }

    fn consume_at(&self, state: &str, provider: &str, now: OffsetDateTime) -> Option<PendingAuthorization> {
        let mut states = self.lock();
        if states.get(state)?.provider != provider {
            return None;
        }
        let pending = states.remove(state)?;
        if self.is_expired(&pending, now) {
            return None;
        }
        Some(pending)
    }

    fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
        let mut states = self.lock();
        let before = states.len();
        states.retain(|_, pending| !self.is_expired(pending, now));
        before - states.len()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(Duration::seconds(i64::try_from(DEFAULT_STATE_TTL_SECS).unwrap_or(i64::MAX)))
    }
}

#[async_trait::async_trait]
impl PendingStateStore for MemoryStateStore {
    async fn insert(&self, state: String, pending: PendingAuthorization) {
        self.lock().insert(state, pending);
    }

    async fn consume(&self, state: &str, provider: &str) -> Option<PendingAuthorization> {
        self.consume_at(state, provider, OffsetDateTime::now_utc())
    }

    async fn purge_expired(&self) -> usize {
        self.purge_expired_at(OffsetDateTime::now_utc())
    }

    async fn len(&self) -> usize {
        self.lock().len()
    }
}

// =============================================================================
// SWEEPER
// =============================================================================

/// Spawn the periodic TTL sweep. Returns a handle for shutdown.
pub fn spawn_state_sweeper(store: Arc<dyn PendingStateStore>, every: std::time::Duration) -> JoinHandle<()> {
    tracing::info!(sweep_secs = every.as_secs(), "oauth state sweep configured");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                let remaining = store.len().await;
                tracing::debug!(purged, remaining, "expired oauth states purged");
            }
        }
    })
}

#[cfg(test)]
#[path = "state_store_test.rs"]
mod tests;
