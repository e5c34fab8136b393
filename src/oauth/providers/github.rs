//! GitHub: Basic-auth token exchange, followers from `/user`, DELETE revoke.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ProviderAdapter, count_at, id_at, revoke_outcome, str_at};
use crate::oauth::{
    Credentials, Identity, ProviderDescriptor, ProviderEndpoints, ProviderError, RevokeOutcome, TokenAuth,
    redirect_uri, send_json,
};

pub const ID: &str = "github";

#[must_use]
pub fn descriptor(credentials: Credentials, base_url: &str) -> ProviderDescriptor {
    let revoke = format!("https://api.github.com/applications/{}/token", credentials.client_id);
    ProviderDescriptor {
        id: ID.into(),
        credentials,
        redirect_uri: redirect_uri(base_url, ID),
        endpoints: ProviderEndpoints {
            authorize: "https://github.com/login/oauth/authorize".into(),
            token: "https://github.com/login/oauth/access_token".into(),
            user_info: "https://api.github.com/user".into(),
            metrics: Some("https://api.github.com/user".into()),
            channel: None,
            revoke: Some(revoke),
        },
        scopes: vec!["read:user".into()],
        requires_pkce: false,
        token_auth: TokenAuth::Basic,
        extra_auth_params: BTreeMap::new(),
    }
}

pub struct GitHub {
    descriptor: ProviderDescriptor,
}

impl GitHub {
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GitHub {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn normalize_identity(&self, body: &Value) -> Identity {
        let username = str_at(body, &["login"])
            .or_else(|| str_at(body, &["name"]))
            .unwrap_or("GitHub User");
        Identity { username: username.to_owned(), account_id: id_at(body, &["id"]).unwrap_or_default() }
    }

    async fn fetch_metric(&self, http: &reqwest::Client, access_token: &str) -> Result<Option<u64>, ProviderError> {
        let Some(url) = &self.descriptor.endpoints.metrics else {
            return Ok(None);
        };
        let body = send_json(ID, http.get(url).bearer_auth(access_token)).await?;
        Ok(Some(count_at(&body, &["followers"]).unwrap_or(0)))
    }

    async fn revoke(&self, http: &reqwest::Client, access_token: &str) -> RevokeOutcome {
        let Some(url) = &self.descriptor.endpoints.revoke else {
            return RevokeOutcome::NotSupported;
        };
        let creds = &self.descriptor.credentials;
        let result = http
            .delete(url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&serde_json::json!({ "access_token": access_token }))
            .send()
            .await;
        revoke_outcome(ID, result).await
    }

    fn profile_url(&self, identity: &Identity) -> Option<String> {
        Some(format!("https://github.com/{}", identity.username))
    }
}
