mod config;
mod db;
mod oauth;
mod repo;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::oauth::ProviderRegistry;
use crate::oauth::state_store::{MemoryStateStore, PendingStateStore, spawn_state_sweeper};
use crate::repo::{MemoryRepository, PgRepository, Repository};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();

    let repo: Arc<dyn Repository> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; connections are kept in memory and lost on restart");
            Arc::new(MemoryRepository::new())
        }
    };

    let providers = ProviderRegistry::from_env(&config.base_url);
    let http = oauth::build_http_client(config.provider_timeouts).expect("failed to build provider http client");

    let ttl = time::Duration::try_from(config.state_ttl).expect("invalid OAUTH_STATE_TTL_SECS");
    let pending: Arc<dyn PendingStateStore> = Arc::new(MemoryStateStore::new(ttl));
    let _sweeper = spawn_state_sweeper(pending.clone(), config.state_sweep_interval);

    let state = state::AppState::new(repo, providers, pending, http, &config.frontend_url);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, base_url = %config.base_url, "linkfolio listening");
    axum::serve(listener, app).await.expect("server failed");
}
