//! Single-use check values (state, PKCE verifier, nonce) kept in cookies
//! between the authorization request and the callback.

use tracing::debug;

use crate::{
    cookie::{Cookie, CookieJar, CookieSettings},
    error::CallbackError,
    pkce,
    provider::Provider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    State,
    Pkce,
    Nonce,
}

impl CheckKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Pkce => "pkce",
            Self::Nonce => "nonce",
        }
    }

    fn cookie_suffix(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Pkce => "pkce.code_verifier",
            Self::Nonce => "nonce",
        }
    }

    #[must_use]
    pub fn cookie_name(self, settings: &CookieSettings) -> String {
        settings.cookie_name(self.cookie_suffix())
    }
}

impl std::str::FromStr for CheckKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "state" => Ok(Self::State),
            "pkce" => Ok(Self::Pkce),
            "nonce" => Ok(Self::Nonce),
            _ => Err("invalid check"),
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a fresh check value and the cookie that stores it.
#[must_use]
pub fn create(kind: CheckKind, settings: &CookieSettings) -> (String, Cookie<'static>) {
    let value = pkce::random_token();
    let cookie = settings.cookie(
        kind.cookie_name(settings),
        value.clone(),
        settings.check_max_age,
    );
    (value, cookie)
}

/// Consume a check value from the request cookies.
///
/// Returns `Ok(None)` when `provider` does not enable `kind`. Otherwise the
/// cookie must be present; its value is returned and an expiring cookie is
/// appended to `out` so the value cannot be replayed.
pub fn use_check(
    kind: CheckKind,
    provider: &Provider,
    jar: &CookieJar,
    out: &mut Vec<Cookie<'static>>,
    settings: &CookieSettings,
) -> Result<Option<String>, CallbackError> {
    if !provider.has_check(kind) {
        return Ok(None);
    }

    let name = kind.cookie_name(settings);
    let value = match jar.get(&name) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => {
            return Err(CallbackError::InvalidCheck {
                check: kind.as_str(),
                reason: "cookie was missing",
            });
        },
    };

    debug!(provider = %provider.id, check = kind.as_str(), "consumed check cookie");
    out.push(settings.removal(name));
    Ok(Some(value))
}
