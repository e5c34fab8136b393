//! LinkedIn: OpenID Connect userinfo. No connection-count metric and no
//! revocation endpoint.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{ProviderAdapter, id_at, str_at};
use crate::oauth::{Credentials, Identity, ProviderDescriptor, ProviderEndpoints, TokenAuth, redirect_uri};

pub const ID: &str = "linkedin";

#[must_use]
pub fn descriptor(credentials: Credentials, base_url: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        id: ID.into(),
        credentials,
        redirect_uri: redirect_uri(base_url, ID),
        endpoints: ProviderEndpoints {
            authorize: "https://www.linkedin.com/oauth/v2/authorization".into(),
            token: "https://www.linkedin.com/oauth/v2/accessToken".into(),
            user_info: "https://api.linkedin.com/v2/userinfo".into(),
            metrics: None,
            channel: None,
            revoke: None,
        },
        scopes: vec!["openid".into(), "profile".into(), "email".into()],
        requires_pkce: false,
        token_auth: TokenAuth::Body,
        extra_auth_params: BTreeMap::new(),
    }
}

pub struct LinkedIn {
    descriptor: ProviderDescriptor,
}

impl LinkedIn {
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }
}

fn joined_name(body: &Value, first: &str, last: &str) -> Option<String> {
    let name = format!(
        "{} {}",
        str_at(body, &[first]).unwrap_or_default(),
        str_at(body, &[last]).unwrap_or_default()
    );
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

#[async_trait::async_trait]
impl ProviderAdapter for LinkedIn {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    // OIDC userinfo carries name/given_name/family_name/sub; the legacy v2
    // profile carries localizedFirstName/localizedLastName/id.
    fn normalize_identity(&self, body: &Value) -> Identity {
        let username = str_at(body, &["name"])
            .map(str::to_owned)
            .or_else(|| joined_name(body, "given_name", "family_name"))
            .or_else(|| joined_name(body, "localizedFirstName", "localizedLastName"))
            .unwrap_or_else(|| "LinkedIn User".to_owned());
        let account_id = id_at(body, &["sub"])
            .or_else(|| id_at(body, &["id"]))
            .unwrap_or_default();
        Identity { username, account_id }
    }

    fn profile_url(&self, identity: &Identity) -> Option<String> {
        let slug = identity
            .username
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        Some(format!("https://linkedin.com/in/{slug}"))
    }

    fn hides_zero_metric(&self) -> bool {
        true
    }
}
