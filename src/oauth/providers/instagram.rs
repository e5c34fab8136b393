//! Instagram via the Facebook Graph API. The identity call takes the token as
//! an `access_token` query parameter instead of a bearer header.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ProviderAdapter, bare_handle, id_at, str_at};
use crate::oauth::{
    Credentials, Identity, ProviderDescriptor, ProviderEndpoints, ProviderError, TokenAuth, redirect_uri, send_json,
};

pub const ID: &str = "instagram";

#[must_use]
pub fn descriptor(credentials: Credentials, base_url: &str) -> ProviderDescriptor {
    let mut extra_auth_params = BTreeMap::new();
    extra_auth_params.insert(
        "config_id".to_owned(),
        std::env::var("INSTAGRAM_CONFIG_ID").unwrap_or_default(),
    );
    ProviderDescriptor {
        id: ID.into(),
        credentials,
        redirect_uri: redirect_uri(base_url, ID),
        endpoints: ProviderEndpoints {
            authorize: "https://www.facebook.com/v18.0/dialog/oauth".into(),
            token: "https://graph.facebook.com/v18.0/oauth/access_token".into(),
            user_info: "https://graph.facebook.com/me".into(),
            metrics: None,
            channel: None,
            revoke: None,
        },
        scopes: vec!["instagram_basic".into(), "instagram_manage_insights".into()],
        requires_pkce: false,
        token_auth: TokenAuth::Body,
        extra_auth_params,
    }
}

pub struct Instagram {
    descriptor: ProviderDescriptor,
}

impl Instagram {
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Instagram {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_identity(&self, http: &reqwest::Client, access_token: &str) -> Result<Identity, ProviderError> {
        let request = http
            .get(&self.descriptor.endpoints.user_info)
            .query(&[("fields", "id,username"), ("access_token", access_token)]);
        let body = send_json(ID, request).await?;
        Ok(self.normalize_identity(&body))
    }

    fn normalize_identity(&self, body: &Value) -> Identity {
        let account_id = id_at(body, &["id"]).unwrap_or_default();
        let username = str_at(body, &["username"])
            .map(str::to_owned)
            .or_else(|| (!account_id.is_empty()).then(|| account_id.clone()))
            .unwrap_or_else(|| "Instagram User".to_owned());
        Identity { username, account_id }
    }

    fn profile_url(&self, identity: &Identity) -> Option<String> {
        Some(format!("https://instagram.com/{}", bare_handle(&identity.username)))
    }
}
