use std::collections::BTreeMap;

use {secrecy::SecretString, serde::Deserialize, url::Url};

/// Top-level `warden.toml` contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Public base URL of the auth routes, e.g. `https://app.example.com/auth`.
    /// Provider callback URLs default to `<base_url>/callback/<provider id>`.
    pub base_url: Url,
    #[serde(default)]
    pub cookies: CookieConfig,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CookieConfig {
    pub prefix: String,
    /// Mark cookies `Secure` and use the `__Secure-` name prefix.
    pub secure: bool,
    /// Lifetime of check cookies (state, PKCE verifier, nonce) in seconds.
    pub check_max_age_secs: i64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            prefix: "warden".into(),
            secure: false,
            check_max_age_secs: 15 * 60,
        }
    }
}

/// One configured provider. Either names a built-in `preset` or describes a
/// custom provider through `kind` and endpoint URLs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderEntry {
    /// Built-in provider to start from; defaults to the table key.
    pub preset: Option<String>,
    pub name: Option<String>,
    /// `"oidc"` or `"oauth"`; required for custom providers.
    pub kind: Option<String>,
    pub issuer: Option<Url>,
    pub authorization_url: Option<Url>,
    pub token_url: Option<Url>,
    pub userinfo_url: Option<Url>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// `"client_secret_basic"`, `"client_secret_post"` or `"none"`.
    pub token_endpoint_auth_method: Option<String>,
    pub scope: Option<String>,
    /// Any of `"state"`, `"pkce"`, `"nonce"`, `"none"`.
    pub checks: Option<Vec<String>>,
    pub callback_url: Option<Url>,
}
