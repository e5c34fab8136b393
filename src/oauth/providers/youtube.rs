//! YouTube: Google userinfo followed by a channel lookup; subscribers from
//! channel statistics; revoke through Google's token endpoint.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ProviderAdapter, count_at, id_at, revoke_outcome, str_at};
use crate::oauth::{
    Credentials, Identity, ProviderDescriptor, ProviderEndpoints, ProviderError, RevokeOutcome, TokenAuth,
    redirect_uri, send_json,
};

pub const ID: &str = "youtube";
const CHANNEL_ID_PREFIX: &str = "UC";

#[must_use]
pub fn descriptor(credentials: Credentials, base_url: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        id: ID.into(),
        credentials,
        redirect_uri: redirect_uri(base_url, ID),
        endpoints: ProviderEndpoints {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token: "https://oauth2.googleapis.com/token".into(),
            user_info: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
            metrics: Some("https://www.googleapis.com/youtube/v3/channels?part=statistics&mine=true".into()),
            channel: Some("https://www.googleapis.com/youtube/v3/channels?part=snippet&mine=true".into()),
            revoke: Some("https://oauth2.googleapis.com/revoke".into()),
        },
        scopes: vec![
            "https://www.googleapis.com/auth/youtube.readonly".into(),
            "https://www.googleapis.com/auth/userinfo.profile".into(),
        ],
        requires_pkce: false,
        token_auth: TokenAuth::Body,
        extra_auth_params: BTreeMap::new(),
    }
}

pub struct YouTube {
    descriptor: ProviderDescriptor,
}

impl YouTube {
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    /// Resolve the caller's own channel. `Ok(None)` when the account has none.
    async fn fetch_channel(&self, http: &reqwest::Client, access_token: &str) -> Result<Option<Identity>, ProviderError> {
        let Some(url) = &self.descriptor.endpoints.channel else {
            return Ok(None);
        };
        let body = send_json(ID, http.get(url).bearer_auth(access_token)).await?;
        Ok(channel_identity(&body))
    }
}

/// First channel of a `channels.list` response as `{title, id}`.
pub(crate) fn channel_identity(body: &Value) -> Option<Identity> {
    let channel = body.get("items")?.as_array()?.first()?;
    let account_id = id_at(channel, &["id"])?;
    let username = str_at(channel, &["snippet", "title"]).unwrap_or_default();
    Some(Identity { username: username.to_owned(), account_id })
}

#[async_trait::async_trait]
impl ProviderAdapter for YouTube {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_identity(&self, http: &reqwest::Client, access_token: &str) -> Result<Identity, ProviderError> {
        let request = http
            .get(&self.descriptor.endpoints.user_info)
            .bearer_auth(access_token);
        let body = send_json(ID, request).await?;
        let mut identity = self.normalize_identity(&body);

        // The channel supersedes the Google account when present; a failed
        // lookup keeps the account identity.
        match self.fetch_channel(http, access_token).await {
            Ok(Some(channel)) => {
                tracing::debug!(provider = ID, channel_id = %channel.account_id, "youtube channel resolved");
                identity.account_id = channel.account_id;
                if !channel.username.is_empty() {
                    identity.username = channel.username;
                }
            }
            Ok(None) => tracing::info!(provider = ID, "no youtube channel for this account"),
            Err(e) => tracing::warn!(provider = ID, error = %e, "youtube channel lookup failed"),
        }
        Ok(identity)
    }

    fn normalize_identity(&self, body: &Value) -> Identity {
        let username = str_at(body, &["name"]).unwrap_or("YouTube User");
        Identity { username: username.to_owned(), account_id: id_at(body, &["id"]).unwrap_or_default() }
    }

    async fn fetch_metric(&self, http: &reqwest::Client, access_token: &str) -> Result<Option<u64>, ProviderError> {
        let Some(url) = &self.descriptor.endpoints.metrics else {
            return Ok(None);
        };
        let body = send_json(ID, http.get(url).bearer_auth(access_token)).await?;
        let subscribers = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|channel| count_at(channel, &["statistics", "subscriberCount"]))
            .unwrap_or(0);
        Ok(Some(subscribers))
    }

    async fn revoke(&self, http: &reqwest::Client, access_token: &str) -> RevokeOutcome {
        let Some(url) = &self.descriptor.endpoints.revoke else {
            return RevokeOutcome::NotSupported;
        };
        let result = http
            .post(url)
            .query(&[("token", access_token)])
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await;
        revoke_outcome(ID, result).await
    }

    fn profile_url(&self, identity: &Identity) -> Option<String> {
        if identity.account_id.starts_with(CHANNEL_ID_PREFIX) {
            Some(format!("https://youtube.com/channel/{}", identity.account_id))
        } else {
            Some("https://youtube.com".to_owned())
        }
    }
}
