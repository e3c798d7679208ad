//! Authorization request construction, the step before the callback.

use {tracing::debug, url::Url, warden_common::ProviderType};

use crate::{
    checks::{self, CheckKind},
    cookie::{Cookie, CookieSettings},
    error::CallbackError,
    pkce,
    provider::Provider,
    types::AuthorizationServerMetadata,
};

const DEFAULT_OIDC_SCOPE: &str = "openid profile email";

/// Where to redirect the user agent, plus the check cookies to set.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub cookies: Vec<Cookie<'static>>,
}

/// Build the authorization URL for `provider`, creating a check cookie for
/// every enabled check.
pub fn authorization_url(
    provider: &Provider,
    metadata: &AuthorizationServerMetadata,
    settings: &CookieSettings,
) -> Result<AuthorizationRequest, CallbackError> {
    let mut url = provider
        .authorization
        .url
        .clone()
        .or_else(|| metadata.authorization_endpoint.clone())
        .ok_or_else(|| CallbackError::MissingEndpoint {
            provider: provider.id.clone(),
            endpoint: "authorization endpoint",
        })?;

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    set_param(&mut params, "response_type", "code");
    set_param(&mut params, "client_id", &provider.client.client_id);
    set_param(&mut params, "redirect_uri", provider.callback_url.as_str());

    let scope = provider.authorization.scope.as_deref().or(match provider.kind {
        ProviderType::Oidc => Some(DEFAULT_OIDC_SCOPE),
        ProviderType::OAuth => None,
    });
    if let Some(scope) = scope {
        set_param(&mut params, "scope", scope);
    }
    for (key, value) in &provider.authorization.params {
        set_param(&mut params, key, value);
    }

    let mut cookies = Vec::new();
    for kind in &provider.checks {
        let (value, cookie) = checks::create(*kind, settings);
        match kind {
            CheckKind::State => set_param(&mut params, "state", &value),
            CheckKind::Pkce => {
                set_param(&mut params, "code_challenge", &pkce::challenge_for(&value));
                set_param(&mut params, "code_challenge_method", pkce::CHALLENGE_METHOD);
            },
            CheckKind::Nonce => set_param(&mut params, "nonce", &value),
        }
        cookies.push(cookie);
    }

    url.query_pairs_mut().clear().extend_pairs(&params);
    debug!(provider = %provider.id, checks = cookies.len(), "built authorization url");
    Ok(AuthorizationRequest { url, cookies })
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{ClientCredentials, MetadataSource},
        std::collections::HashMap,
    };

    fn metadata() -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: "https://idp.example".parse().unwrap(),
            authorization_endpoint: Some("https://idp.example/authorize".parse().unwrap()),
            token_endpoint: "https://idp.example/token".parse().unwrap(),
            userinfo_endpoint: None,
            jwks_uri: None,
            iss_parameter_supported: false,
            source: MetadataSource::Discovered,
        }
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn oidc_request_carries_every_check() {
        let mut provider = Provider::new(
            "idp",
            ProviderType::Oidc,
            ClientCredentials::new("client-1", None),
            "https://app.example/callback/idp".parse().unwrap(),
        );
        provider.checks = vec![CheckKind::State, CheckKind::Pkce, CheckKind::Nonce];

        let request = authorization_url(&provider, &metadata(), &CookieSettings::default()).unwrap();
        let q = query(&request.url);
        assert_eq!(request.url.path(), "/authorize");
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["client_id"], "client-1");
        assert_eq!(q["redirect_uri"], "https://app.example/callback/idp");
        assert_eq!(q["scope"], DEFAULT_OIDC_SCOPE);
        assert_eq!(q["code_challenge_method"], "S256");
        assert_eq!(request.cookies.len(), 3);

        let cookie = |suffix: &str| {
            request
                .cookies
                .iter()
                .find(|c| c.name() == format!("warden.{suffix}"))
                .unwrap()
                .value()
                .to_string()
        };
        assert_eq!(q["state"], cookie("state"));
        assert_eq!(q["nonce"], cookie("nonce"));
        assert_eq!(
            q["code_challenge"],
            pkce::challenge_for(&cookie("pkce.code_verifier"))
        );
    }

    #[test]
    fn configured_url_keeps_existing_query() {
        let mut provider = Provider::new(
            "reddit",
            ProviderType::OAuth,
            ClientCredentials::new("client-1", None),
            "https://app.example/callback/reddit".parse().unwrap(),
        );
        provider.authorization.url =
            Some("https://www.reddit.com/api/v1/authorize?scope=identity".parse().unwrap());
        provider.authorization.params = vec![("duration".into(), "permanent".into())];
        provider.checks = vec![CheckKind::State];

        let request = authorization_url(&provider, &metadata(), &CookieSettings::default()).unwrap();
        let q = query(&request.url);
        assert_eq!(request.url.host_str(), Some("www.reddit.com"));
        assert_eq!(q["scope"], "identity");
        assert_eq!(q["duration"], "permanent");
        assert!(q.contains_key("state"));
        assert!(!q.contains_key("code_challenge"));
    }

    #[test]
    fn missing_authorization_endpoint() {
        let provider = Provider::new(
            "idp",
            ProviderType::OAuth,
            ClientCredentials::new("client-1", None),
            "https://app.example/callback/idp".parse().unwrap(),
        );
        let mut metadata = metadata();
        metadata.authorization_endpoint = None;
        let err = authorization_url(&provider, &metadata, &CookieSettings::default()).unwrap_err();
        assert!(matches!(err, CallbackError::MissingEndpoint { .. }));
    }
}
