//! OpenID Connect ID token validation.

use {
    jsonwebtoken::{
        Algorithm, DecodingKey, Validation, decode, decode_header,
        jwk::{Jwk, JwkSet},
    },
    reqwest::header::ACCEPT,
    secrecy::ExposeSecret,
    serde_json::{Map, Value},
    tracing::{debug, instrument, warn},
    url::Url,
};

use crate::{
    discovery::same_issuer, error::CallbackError, provider::Provider,
    types::AuthorizationServerMetadata,
};

/// Validate `id_token` and return its claims.
///
/// `expected_nonce` is the consumed nonce; when `None` the token must not
/// carry a `nonce` claim. HMAC tokens are verified with the client secret,
/// asymmetric ones with the issuer's JWKS. Without a JWKS the signature is
/// not checked and the token is trusted because it came straight from the
/// token endpoint over TLS.
#[instrument(skip_all, fields(provider = %provider.id))]
pub async fn validate_id_token(
    id_token: &str,
    metadata: &AuthorizationServerMetadata,
    provider: &Provider,
    expected_nonce: Option<&str>,
    client: &reqwest::Client,
) -> Result<Map<String, Value>, CallbackError> {
    let header = decode_header(id_token)
        .map_err(|e| CallbackError::IdToken(format!("malformed header: {e}")))?;

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[provider.client.client_id.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let key = match header.alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            let secret = provider.client.client_secret.as_ref().ok_or_else(|| {
                CallbackError::IdToken("HMAC-signed token but no client secret".into())
            })?;
            DecodingKey::from_secret(secret.expose_secret().as_bytes())
        },
        _ => match &metadata.jwks_uri {
            Some(jwks_uri) => {
                let jwks = fetch_jwks(client, jwks_uri).await?;
                let jwk = select_key(&jwks, header.kid.as_deref())?;
                DecodingKey::from_jwk(jwk)
                    .map_err(|e| CallbackError::IdToken(format!("unusable JWK: {e}")))?
            },
            None => {
                warn!(alg = ?header.alg, "no jwks_uri, accepting id token without signature check");
                validation.insecure_disable_signature_validation();
                DecodingKey::from_secret(&[])
            },
        },
    };

    let claims = decode::<Map<String, Value>>(id_token, &key, &validation)
        .map_err(|e| CallbackError::IdToken(e.to_string()))?
        .claims;

    check_claims(&claims, metadata, provider, expected_nonce)?;
    debug!("id token validated");
    Ok(claims)
}

fn check_claims(
    claims: &Map<String, Value>,
    metadata: &AuthorizationServerMetadata,
    provider: &Provider,
    expected_nonce: Option<&str>,
) -> Result<(), CallbackError> {
    let issuer = claims.get("iss").and_then(Value::as_str).unwrap_or_default();
    if !same_issuer(issuer, metadata.issuer.as_str()) {
        return Err(CallbackError::IdToken(format!(
            "unexpected issuer {issuer}"
        )));
    }

    if !claims.get("iat").is_some_and(Value::is_number) {
        return Err(CallbackError::IdToken("missing iat claim".into()));
    }

    let client_id = provider.client.client_id.as_str();
    let multiple_audiences = claims
        .get("aud")
        .and_then(Value::as_array)
        .is_some_and(|aud| aud.len() > 1);
    match claims.get("azp").and_then(Value::as_str) {
        Some(azp) if azp != client_id => {
            return Err(CallbackError::IdToken(format!(
                "unexpected authorized party {azp}"
            )));
        },
        None if multiple_audiences => {
            return Err(CallbackError::IdToken(
                "azp claim required with multiple audiences".into(),
            ));
        },
        _ => {},
    }

    let nonce = claims.get("nonce").and_then(Value::as_str);
    match (expected_nonce, nonce) {
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        (Some(_), Some(_)) => Err(CallbackError::IdToken("nonce mismatch".into())),
        (Some(_), None) => Err(CallbackError::IdToken("nonce claim missing".into())),
        (None, Some(_)) => Err(CallbackError::IdToken("unexpected nonce claim".into())),
        (None, None) => Ok(()),
    }
}

async fn fetch_jwks(client: &reqwest::Client, jwks_uri: &Url) -> Result<JwkSet, CallbackError> {
    let response = client
        .get(jwks_uri.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(CallbackError::IdToken(format!(
            "jwks endpoint returned {}",
            response.status()
        )));
    }
    response
        .json()
        .await
        .map_err(|e| CallbackError::IdToken(format!("invalid JWKS: {e}")))
}

fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, CallbackError> {
    match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
    .ok_or_else(|| CallbackError::IdToken("no matching key in JWKS".into()))
}
