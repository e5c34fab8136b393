//! X (Twitter): PKCE, Basic-auth token endpoint, `public_metrics` followers.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ProviderAdapter, bare_handle, count_at, id_at, revoke_outcome, str_at};
use crate::oauth::{
    Credentials, Identity, ProviderDescriptor, ProviderEndpoints, ProviderError, RevokeOutcome, TokenAuth,
    redirect_uri, send_json,
};

pub const ID: &str = "twitter";

#[must_use]
pub fn descriptor(credentials: Credentials, base_url: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        id: ID.into(),
        credentials,
        redirect_uri: redirect_uri(base_url, ID),
        endpoints: ProviderEndpoints {
            authorize: "https://twitter.com/i/oauth2/authorize".into(),
            token: "https://api.twitter.com/2/oauth2/token".into(),
            user_info: "https://api.twitter.com/2/users/me".into(),
            metrics: Some("https://api.twitter.com/2/users/me?user.fields=public_metrics".into()),
            channel: None,
            revoke: Some("https://api.twitter.com/2/oauth2/revoke".into()),
        },
        scopes: vec!["tweet.read".into(), "users.read".into(), "offline.access".into()],
        requires_pkce: true,
        token_auth: TokenAuth::Basic,
        extra_auth_params: BTreeMap::new(),
    }
}

pub struct Twitter {
    descriptor: ProviderDescriptor,
}

impl Twitter {
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Twitter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn normalize_identity(&self, body: &Value) -> Identity {
        let username = str_at(body, &["data", "username"])
            .or_else(|| str_at(body, &["username"]))
            .unwrap_or("Twitter User");
        let account_id = id_at(body, &["data", "id"])
            .or_else(|| id_at(body, &["id"]))
            .unwrap_or_default();
        Identity { username: username.to_owned(), account_id }
    }

    async fn fetch_metric(&self, http: &reqwest::Client, access_token: &str) -> Result<Option<u64>, ProviderError> {
        let Some(url) = &self.descriptor.endpoints.metrics else {
            return Ok(None);
        };
        let body = send_json(ID, http.get(url).bearer_auth(access_token)).await?;
        Ok(Some(count_at(&body, &["data", "public_metrics", "followers_count"]).unwrap_or(0)))
    }

    async fn revoke(&self, http: &reqwest::Client, access_token: &str) -> RevokeOutcome {
        let Some(url) = &self.descriptor.endpoints.revoke else {
            return RevokeOutcome::NotSupported;
        };
        let creds = &self.descriptor.credentials;
        let result = http
            .post(url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("token", access_token), ("token_type_hint", "access_token")])
            .send()
            .await;
        revoke_outcome(ID, result).await
    }

    fn profile_url(&self, identity: &Identity) -> Option<String> {
        Some(format!("https://twitter.com/{}", bare_handle(&identity.username)))
    }
}
