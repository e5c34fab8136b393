//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! handed to the service functions directly. Every collaborator sits behind
//! an `Arc` (trait objects for the repository and the pending-state store) so
//! cloning per request is cheap and tests can swap in memory backends.

use std::sync::Arc;

use crate::oauth::ProviderRegistry;
use crate::oauth::state_store::PendingStateStore;
use crate::repo::Repository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub providers: Arc<ProviderRegistry>,
    pub pending: Arc<dyn PendingStateStore>,
    /// Shared outbound client; carries the provider timeouts.
    pub http: reqwest::Client,
    pub frontend_url: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        providers: ProviderRegistry,
        pending: Arc<dyn PendingStateStore>,
        http: reqwest::Client,
        frontend_url: &str,
    ) -> Self {
        Self {
            repo,
            providers: Arc::new(providers),
            pending,
            http,
            frontend_url: Arc::from(frontend_url.trim_end_matches('/')),
        }
    }
}

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
