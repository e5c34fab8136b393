//! Provider lookup by id.

use std::collections::HashMap;
use std::sync::Arc;

use super::providers::{ProviderAdapter, github, instagram, linkedin, twitter, youtube};
use super::Credentials;

/// Read-only map of provider id to adapter, built once at start-up.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in providers with credentials read from the environment.
    /// Providers without credentials are still registered; flows check
    /// `is_configured` before using them.
    #[must_use]
    pub fn from_env(base_url: &str) -> Self {
        let registry = Self::new()
            .with_provider(instagram::Instagram::new(instagram::descriptor(Credentials::from_env("INSTAGRAM"), base_url)))
            .with_provider(twitter::Twitter::new(twitter::descriptor(Credentials::from_env("TWITTER"), base_url)))
            .with_provider(linkedin::LinkedIn::new(linkedin::descriptor(Credentials::from_env("LINKEDIN"), base_url)))
            .with_provider(github::GitHub::new(github::descriptor(Credentials::from_env("GITHUB"), base_url)))
            .with_provider(youtube::YouTube::new(youtube::descriptor(Credentials::from_env("YOUTUBE"), base_url)));

        for id in registry.ids() {
            let configured = registry.lookup(id).is_some_and(|p| p.descriptor().is_configured());
            if configured {
                tracing::info!(provider = id, "oauth provider configured");
            } else {
                tracing::warn!(provider = id, "oauth provider missing client credentials");
            }
        }
        registry
    }

    #[must_use]
    pub fn with_provider(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    /// Add or replace the adapter registered under its own id.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.insert(adapter.id().to_owned(), adapter);
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).cloned()
    }

    /// Registered ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
