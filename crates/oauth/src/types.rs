use {
    secrecy::SecretString,
    serde::{Deserialize, Serialize},
    url::Url,
    warden_common::Account,
};

use crate::cookie::Cookie;

/// How the client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientAuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

impl ClientAuthMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for ClientAuthMethod {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "client_secret_basic" => Ok(Self::ClientSecretBasic),
            "client_secret_post" => Ok(Self::ClientSecretPost),
            "none" => Ok(Self::None),
            _ => Err("invalid token endpoint auth method"),
        }
    }
}

/// OAuth client registration used for the token request.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub auth_method: ClientAuthMethod,
    /// Extra parameters forwarded in the token request body.
    pub extra_params: Vec<(String, String)>,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: Option<SecretString>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_method: ClientAuthMethod::default(),
            extra_params: Vec::new(),
        }
    }
}

/// Where a request's metadata came from. Never a mix of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    Discovered,
    Configured,
}

/// Authorization server endpoints resolved for one callback.
#[derive(Debug, Clone)]
pub struct AuthorizationServerMetadata {
    pub issuer: Url,
    pub authorization_endpoint: Option<Url>,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Option<Url>,
    pub jwks_uri: Option<Url>,
    pub iss_parameter_supported: bool,
    pub source: MetadataSource,
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

/// Normalized user profile produced by a provider's profile mapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A successfully normalized sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResult {
    pub profile: Profile,
    pub account: Account,
    /// ID token claims or the userinfo document, as received.
    pub raw_profile: serde_json::Value,
}

/// Result of [`handle_oauth`](crate::handle_oauth).
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// `None` when the profile could not be normalized; the caller should
    /// treat the sign-in as failed.
    pub profile: Option<ProfileResult>,
    /// Cookie instructions to send back, expiring every consumed check.
    pub cookies: Vec<Cookie<'static>>,
}
