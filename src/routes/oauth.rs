//! OAuth routes: connect/callback redirects, account listing, stats, disconnect.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::json;

use crate::services::authorize::{AuthorizeError, begin_authorization};
use crate::services::callback::{CallbackFailure, CallbackParams, Connected, handle_callback};
use crate::services::disconnect::DisconnectError;
use crate::services::{accounts, disconnect as disconnect_svc, stats};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectBody {
    profile_id: Option<String>,
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

/// `GET /api/auth/{provider}/connect?profileId=`: redirect to the provider.
pub async fn connect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Response {
    let Some(profile_id) = query.profile_id.filter(|p| !p.is_empty()) else {
        return message(StatusCode::BAD_REQUEST, "Profile ID is required");
    };

    match begin_authorization(&state, &provider, &profile_id).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(AuthorizeError::UnknownProvider(_)) => message(StatusCode::BAD_REQUEST, "Invalid platform"),
        Err(AuthorizeError::ProviderNotConfigured(_)) => message(
            StatusCode::BAD_REQUEST,
            format!("{provider} OAuth is not configured. Please set the required environment variables."),
        ),
        Err(e) => {
            tracing::error!(error = %e, "authorization initiation failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Could not start authorization")
        }
    }
}

/// `GET /api/auth/{provider}/callback`: finish the flow and bounce back to the frontend.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let result = handle_callback(&state, &provider, params).await;
    Redirect::temporary(&callback_redirect(&state.frontend_url, &provider, &result)).into_response()
}

/// Frontend URL for a callback outcome.
pub(crate) fn callback_redirect(frontend_url: &str, provider: &str, result: &Result<Connected, CallbackFailure>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    match result {
        Ok(connected) => {
            query.append_pair("connected", &connected.provider);
        }
        Err(failure) => {
            query
                .append_pair("error", failure.code())
                .append_pair("desc", &failure.description())
                .append_pair("platform", provider);
        }
    }
    format!("{}/?{}", frontend_url.trim_end_matches('/'), query.finish())
}

/// `GET /api/connected-accounts/{profile_id}`: accounts without tokens.
pub async fn connected_accounts(State(state): State<AppState>, Path(profile_id): Path<String>) -> Response {
    match accounts::list_accounts(&state, &profile_id).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            tracing::error!(error = %e, profile_id = %profile_id, "account listing failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch connected accounts")
        }
    }
}

/// `GET /api/social-stats/{profile_id}`: follower counts keyed by provider.
pub async fn social_stats(State(state): State<AppState>, Path(profile_id): Path<String>) -> Response {
    match stats::refresh_stats(&state, &profile_id).await {
        Ok(all) => Json(stats::visible_stats(&state.providers, all)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, profile_id = %profile_id, "stats refresh failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch social stats")
        }
    }
}

/// `POST /api/disconnect/{provider}` with `{ "profileId": ... }`.
pub async fn disconnect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<DisconnectBody>,
) -> Response {
    let Some(profile_id) = body.profile_id.filter(|p| !p.is_empty()) else {
        return message(StatusCode::BAD_REQUEST, "Missing profileId");
    };

    match disconnect_svc::disconnect(&state, &profile_id, &provider).await {
        Ok(report) => Json(json!({
            "message": "Account disconnected successfully",
            "platform": report.provider,
            "revocation": report.revocation,
            "linksRemoved": report.links_removed,
        }))
        .into_response(),
        Err(DisconnectError::NotConnected { .. }) => message(StatusCode::NOT_FOUND, "Account not connected"),
        Err(e) => {
            tracing::error!(error = %e, provider = %provider, "disconnect failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to disconnect account")
        }
    }
}

#[cfg(test)]
#[path = "oauth_test.rs"]
mod tests;
