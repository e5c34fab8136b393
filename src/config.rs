//! Process configuration, read once at start-up from environment variables.
//!
//! Numeric values that are missing or unparseable fall back to their
//! defaults. Provider credentials are not part of `AppConfig`; each provider
//! descriptor reads its own `{ID}_CLIENT_ID` / `{ID}_CLIENT_SECRET`.

use std::time::Duration;

use crate::oauth::ProviderTimeouts;
use crate::oauth::state_store::{DEFAULT_STATE_SWEEP_SECS, DEFAULT_STATE_TTL_SECS};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5000";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Public origin of this service; provider redirect URIs hang off it.
    pub base_url: String,
    /// Where the browser lands after a callback.
    pub frontend_url: String,
    /// `None` runs on the in-memory repository.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub provider_timeouts: ProviderTimeouts,
    pub state_ttl: Duration,
    pub state_sweep_interval: Duration,
}

impl AppConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ProviderTimeouts::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: parse_or(lookup("PORT"), DEFAULT_PORT),
            base_url: non_empty("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            frontend_url: non_empty("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_owned()),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), DEFAULT_DB_MAX_CONNECTIONS),
            provider_timeouts: ProviderTimeouts {
                request_secs: parse_or(lookup("PROVIDER_REQUEST_TIMEOUT_SECS"), defaults.request_secs),
                connect_secs: parse_or(lookup("PROVIDER_CONNECT_TIMEOUT_SECS"), defaults.connect_secs),
            },
            state_ttl: Duration::from_secs(parse_or(lookup("OAUTH_STATE_TTL_SECS"), DEFAULT_STATE_TTL_SECS)),
            state_sweep_interval: Duration::from_secs(parse_or(
                lookup("OAUTH_STATE_SWEEP_SECS"),
                DEFAULT_STATE_SWEEP_SECS,
            )),
        }
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
