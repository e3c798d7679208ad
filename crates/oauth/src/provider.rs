use std::{fmt, sync::Arc};

use {
    futures::future::BoxFuture,
    serde_json::Value,
    url::Url,
    warden_common::{ProviderType, TokenSet},
};

use crate::{
    checks::CheckKind,
    token::RawTokenResponse,
    types::{ClientCredentials, Profile},
};

/// Maps the raw profile (ID token claims or userinfo JSON) to a [`Profile`].
pub type ProfileMapper = Arc<dyn Fn(&Value, &TokenSet) -> anyhow::Result<Profile> + Send + Sync>;

/// Rewrites a non-compliant token response. Returning `None` keeps the
/// original response.
pub type ConformHook = Arc<dyn Fn(&RawTokenResponse) -> Option<RawTokenResponse> + Send + Sync>;

/// Replaces the default bearer userinfo request.
pub type UserinfoRequest =
    Arc<dyn Fn(UserinfoContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Input to a [`UserinfoRequest`] hook.
#[derive(Debug, Clone)]
pub struct UserinfoContext {
    pub provider_id: String,
    pub tokens: TokenSet,
    pub userinfo_url: Option<Url>,
    pub client: reqwest::Client,
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationEndpoint {
    pub url: Option<Url>,
    pub scope: Option<String>,
    pub params: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct TokenEndpoint {
    pub url: Option<Url>,
    pub conform: Option<ConformHook>,
}

impl fmt::Debug for TokenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpoint")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("conform", &self.conform.is_some())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct UserinfoEndpoint {
    pub url: Option<Url>,
    pub request: Option<UserinfoRequest>,
}

impl fmt::Debug for UserinfoEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserinfoEndpoint")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("request", &self.request.is_some())
            .finish()
    }
}

/// A fully resolved identity provider.
#[derive(Clone)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub kind: ProviderType,
    pub issuer: Option<Url>,
    pub client: ClientCredentials,
    pub authorization: AuthorizationEndpoint,
    pub token: TokenEndpoint,
    pub userinfo: UserinfoEndpoint,
    pub checks: Vec<CheckKind>,
    pub callback_url: Url,
    pub profile: ProfileMapper,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("issuer", &self.issuer.as_ref().map(Url::as_str))
            .field("client", &self.client)
            .field("authorization", &self.authorization)
            .field("token", &self.token)
            .field("userinfo", &self.userinfo)
            .field("checks", &self.checks)
            .field("callback_url", &self.callback_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Provider with PKCE enabled and the default profile mapper.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: ProviderType,
        client: ClientCredentials,
        callback_url: Url,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            issuer: None,
            client,
            authorization: AuthorizationEndpoint::default(),
            token: TokenEndpoint::default(),
            userinfo: UserinfoEndpoint::default(),
            checks: vec![CheckKind::Pkce],
            callback_url,
            profile: Arc::new(default_profile),
        }
    }

    #[must_use]
    pub fn has_check(&self, kind: CheckKind) -> bool {
        self.checks.contains(&kind)
    }
}

/// Reads `sub`/`id`, `name`, `email` and `picture`/`image`.
pub fn default_profile(raw: &Value, _tokens: &TokenSet) -> anyhow::Result<Profile> {
    Ok(Profile {
        id: claim_string(raw, "sub")
            .or_else(|| claim_string(raw, "id"))
            .unwrap_or_default(),
        name: claim_string(raw, "name"),
        email: claim_string(raw, "email"),
        image: claim_string(raw, "picture").or_else(|| claim_string(raw, "image")),
        extra: serde_json::Map::new(),
    })
}

/// String or number member of a JSON object, as a string.
#[must_use]
pub fn claim_string(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn tokens() -> TokenSet {
        serde_json::from_value(json!({"access_token": "at", "token_type": "Bearer"})).unwrap()
    }

    #[test]
    fn default_profile_prefers_sub_and_picture() {
        let profile = default_profile(
            &json!({"sub": "u-1", "id": 7, "name": "Ada", "picture": "https://img/a.png"}),
            &tokens(),
        )
        .unwrap();
        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.image.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn default_profile_accepts_numeric_id() {
        let profile = default_profile(&json!({"id": 42, "image": "i"}), &tokens()).unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.image.as_deref(), Some("i"));
        assert!(profile.email.is_none());
    }

    #[test]
    fn debug_hides_hooks() {
        let mut provider = Provider::new(
            "okta",
            ProviderType::Oidc,
            ClientCredentials::new("cid", Some(secrecy::SecretString::new("shh".into()))),
            "https://app.example/callback/okta".parse().unwrap(),
        );
        provider.token.conform = Some(Arc::new(
            |_: &RawTokenResponse| -> Option<RawTokenResponse> { None },
        ));
        let debug = format!("{provider:?}");
        assert!(debug.contains("conform: true"));
        assert!(!debug.contains("shh"));
        assert!(provider.has_check(CheckKind::Pkce));
        assert!(!provider.has_check(CheckKind::Nonce));
    }
}
