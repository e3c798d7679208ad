//! Authorization code grant and token response processing.

use {
    reqwest::header::{ACCEPT, HeaderMap},
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::Value,
    tracing::{debug, instrument, warn},
    warden_common::{ProviderType, TokenSet},
};

use crate::{
    error::CallbackError,
    provider::Provider,
    types::{AuthorizationServerMetadata, ClientAuthMethod},
};

/// Token endpoint response before any validation.
#[derive(Debug, Clone)]
pub struct RawTokenResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawTokenResponse {
    pub fn json(&self) -> Result<Value, CallbackError> {
        serde_json::from_str(&self.body).map_err(|e| {
            CallbackError::InvalidResponse(format!("token response is not JSON: {e}"))
        })
    }

    /// Same status and headers with `body` replaced, for conform hooks.
    #[must_use]
    pub fn with_json(&self, body: &Value) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// POST `grant_type=authorization_code` to the token endpoint.
#[instrument(skip_all, fields(provider = %provider.id))]
pub async fn authorization_code_grant(
    client: &reqwest::Client,
    metadata: &AuthorizationServerMetadata,
    provider: &Provider,
    code: &str,
    code_verifier: Option<&str>,
) -> Result<RawTokenResponse, CallbackError> {
    let credentials = &provider.client;
    let mut form: Vec<(String, String)> = vec![
        ("grant_type".into(), "authorization_code".into()),
        ("code".into(), code.into()),
        ("redirect_uri".into(), provider.callback_url.to_string()),
    ];
    if let Some(verifier) = code_verifier {
        form.push(("code_verifier".into(), verifier.into()));
    }
    form.extend(credentials.extra_params.iter().cloned());

    let mut request = client
        .post(metadata.token_endpoint.clone())
        .header(ACCEPT, "application/json");

    match (credentials.auth_method, &credentials.client_secret) {
        (ClientAuthMethod::ClientSecretBasic, Some(secret)) => {
            request = request.basic_auth(
                form_encode(&credentials.client_id),
                Some(form_encode(secret.expose_secret())),
            );
        },
        (ClientAuthMethod::ClientSecretPost, Some(secret)) => {
            form.push(("client_id".into(), credentials.client_id.clone()));
            form.push(("client_secret".into(), secret.expose_secret().clone()));
        },
        (method, secret) => {
            if method != ClientAuthMethod::None && secret.is_none() {
                warn!(
                    method = method.as_str(),
                    "no client secret configured, sending client_id only"
                );
            }
            form.push(("client_id".into(), credentials.client_id.clone()));
        },
    }

    let response = request.form(&form).send().await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().await?;
    debug!(status, "token endpoint responded");

    Ok(RawTokenResponse {
        status,
        headers,
        body,
    })
}

/// Credentials in HTTP Basic auth are form-urlencoded first (RFC 6749 2.3.1).
fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Validate a token response and parse it into a [`TokenSet`].
///
/// Only status 200 is accepted. OIDC responses must carry an `id_token`.
/// Typed members present as `null` or with the wrong JSON type are rejected,
/// so the parsed set serializes back to the body it came from.
pub fn process_token_response(
    raw: &RawTokenResponse,
    kind: ProviderType,
) -> Result<TokenSet, CallbackError> {
    if raw.status != 200 {
        if let Ok(body) = serde_json::from_str::<OAuthErrorBody>(&raw.body) {
            return Err(CallbackError::TokenEndpoint {
                code: body.error,
                description: body.error_description,
            });
        }
        return Err(CallbackError::InvalidResponse(format!(
            "unexpected token endpoint status {}",
            raw.status
        )));
    }

    let json = raw.json()?;
    if !json.is_object() {
        return Err(CallbackError::InvalidResponse(
            "token response is not a JSON object".into(),
        ));
    }
    if let Some(error) = json.get("error").and_then(Value::as_str) {
        return Err(CallbackError::TokenEndpoint {
            code: error.to_string(),
            description: json
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    for member in ["access_token", "token_type"] {
        match json.get(member) {
            Some(Value::String(s)) if !s.is_empty() => {},
            _ => {
                return Err(CallbackError::InvalidResponse(format!(
                    "token response is missing {member}"
                )));
            },
        }
    }
    for member in ["refresh_token", "id_token", "scope"] {
        if json.get(member).is_some_and(|v| !v.is_string()) {
            return Err(CallbackError::InvalidResponse(format!(
                "token response member {member} must be a string"
            )));
        }
    }
    if json.get("expires_in").is_some_and(|v| !v.is_u64()) {
        return Err(CallbackError::InvalidResponse(
            "token response member expires_in must be a non-negative integer".into(),
        ));
    }
    if kind == ProviderType::Oidc && !json.get("id_token").is_some_and(Value::is_string) {
        return Err(CallbackError::InvalidResponse(
            "token response is missing id_token".into(),
        ));
    }

    serde_json::from_value(json)
        .map_err(|e| CallbackError::InvalidResponse(format!("malformed token response: {e}")))
}
