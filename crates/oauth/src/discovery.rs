//! Authorization server metadata: configured endpoints or OpenID discovery.

use {
    reqwest::header::ACCEPT,
    serde::Deserialize,
    tracing::{debug, info, instrument},
    url::Url,
};

use crate::{
    error::CallbackError,
    provider::Provider,
    types::{AuthorizationServerMetadata, MetadataSource},
};

/// Host of placeholder URLs meaning "not configured".
pub const UNSET_HOST: &str = "warden.invalid";

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    #[serde(default)]
    authorization_endpoint: Option<Url>,
    #[serde(default)]
    token_endpoint: Option<Url>,
    #[serde(default)]
    userinfo_endpoint: Option<Url>,
    #[serde(default)]
    jwks_uri: Option<Url>,
    #[serde(default)]
    authorization_response_iss_parameter_supported: bool,
}

/// `url` unless it is absent or a placeholder.
pub(crate) fn configured(url: Option<&Url>) -> Option<&Url> {
    url.filter(|u| u.host_str() != Some(UNSET_HOST))
}

/// Issuer identifiers compare equal regardless of a trailing slash.
pub(crate) fn same_issuer(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn placeholder_issuer() -> Result<Url, CallbackError> {
    Url::parse(&format!("https://{UNSET_HOST}"))
        .map_err(|e| CallbackError::Discovery(e.to_string()))
}

/// Resolve endpoints for `provider`.
///
/// Configured token or userinfo URLs win outright and no request is made.
/// Only when neither is configured is the issuer's discovery document fetched.
#[instrument(skip_all, fields(provider = %provider.id))]
pub async fn resolve_metadata(
    provider: &Provider,
    client: &reqwest::Client,
) -> Result<AuthorizationServerMetadata, CallbackError> {
    let token_url = configured(provider.token.url.as_ref());
    let userinfo_url = configured(provider.userinfo.url.as_ref());

    if token_url.is_some() || userinfo_url.is_some() {
        let token_endpoint = token_url
            .cloned()
            .ok_or_else(|| CallbackError::MissingEndpoint {
                provider: provider.id.clone(),
                endpoint: "token endpoint",
            })?;
        let issuer = match &provider.issuer {
            Some(issuer) => issuer.clone(),
            None => placeholder_issuer()?,
        };
        debug!("using configured endpoints");
        return Ok(AuthorizationServerMetadata {
            issuer,
            authorization_endpoint: configured(provider.authorization.url.as_ref()).cloned(),
            token_endpoint,
            userinfo_endpoint: userinfo_url.cloned(),
            jwks_uri: None,
            iss_parameter_supported: false,
            source: MetadataSource::Configured,
        });
    }

    let issuer =
        configured(provider.issuer.as_ref()).ok_or_else(|| CallbackError::MissingEndpoint {
            provider: provider.id.clone(),
            endpoint: "issuer",
        })?;
    discover(provider, issuer, client).await
}

async fn discover(
    provider: &Provider,
    issuer: &Url,
    client: &reqwest::Client,
) -> Result<AuthorizationServerMetadata, CallbackError> {
    let url = Url::parse(&format!(
        "{}/{WELL_KNOWN_PATH}",
        issuer.as_str().trim_end_matches('/')
    ))
    .map_err(|e| CallbackError::Discovery(format!("invalid discovery url: {e}")))?;

    #[cfg(feature = "metrics")]
    warden_metrics::counter!(
        warden_metrics::oauth::DISCOVERY_REQUESTS_TOTAL,
        warden_metrics::labels::PROVIDER => provider.id.clone()
    )
    .increment(1);

    let response = client
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CallbackError::Discovery(format!(
            "{url} returned {status}"
        )));
    }
    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| CallbackError::Discovery(format!("invalid discovery document: {e}")))?;

    if !same_issuer(&document.issuer, issuer.as_str()) {
        return Err(CallbackError::Discovery(format!(
            "issuer mismatch: expected {issuer}, got {}",
            document.issuer
        )));
    }

    let missing = |endpoint: &'static str| CallbackError::MissingEndpoint {
        provider: provider.id.clone(),
        endpoint,
    };
    let token_endpoint = document.token_endpoint.ok_or_else(|| missing("token_endpoint"))?;
    let userinfo_endpoint = document
        .userinfo_endpoint
        .ok_or_else(|| missing("userinfo_endpoint"))?;
    let issuer = Url::parse(&document.issuer)
        .map_err(|e| CallbackError::Discovery(format!("invalid issuer: {e}")))?;

    info!(issuer = %issuer, "discovered authorization server metadata");
    Ok(AuthorizationServerMetadata {
        issuer,
        authorization_endpoint: document.authorization_endpoint,
        token_endpoint,
        userinfo_endpoint: Some(userinfo_endpoint),
        jwks_uri: document.jwks_uri,
        iss_parameter_supported: document.authorization_response_iss_parameter_supported,
        source: MetadataSource::Discovered,
    })
}
