//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! A thin HTTP surface over the connection lifecycle services: OAuth
//! connect/callback redirects, the sanitized account list, follower stats,
//! and disconnect. Everything else about the profile page lives elsewhere.

pub mod oauth;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/{provider}/connect", get(oauth::connect))
        .route("/api/auth/{provider}/callback", get(oauth::callback))
        .route("/api/connected-accounts/{profile_id}", get(oauth::connected_accounts))
        .route("/api/social-stats/{profile_id}", get(oauth::social_stats))
        .route("/api/disconnect/{provider}", post(oauth::disconnect))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
