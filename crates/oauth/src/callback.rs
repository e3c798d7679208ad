//! The authorization-code callback.

use {
    serde::Deserialize,
    serde_json::{Map, Value},
    tracing::{debug, info, instrument, warn},
    warden_common::{Account, ProviderType, TokenSet},
};

use crate::{
    challenge,
    checks::{self, CheckKind},
    cookie::{Cookie, CookieJar, CookieSettings},
    discovery::{resolve_metadata, same_issuer},
    error::{CallbackError, ProfileParseError},
    id_token::validate_id_token,
    logger::AuthLogger,
    provider::{Provider, UserinfoContext},
    token::{authorization_code_grant, process_token_response},
    types::{AuthorizationServerMetadata, CallbackOutcome, Profile, ProfileResult},
    userinfo::fetch_userinfo,
};

/// Query parameters of the redirect back from the authorization server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub iss: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Each recognized parameter may appear at most once. Unknown parameters
    /// are ignored.
    pub fn from_query(query: &str) -> Result<Self, CallbackError> {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "iss" => &mut params.iss,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "error_uri" => &mut params.error_uri,
                _ => continue,
            };
            if slot.is_some() {
                return Err(CallbackError::InvalidResponse(format!(
                    "{key} parameter must be provided only once"
                )));
            }
            *slot = Some(value.into_owned());
        }
        Ok(params)
    }
}

/// Everything [`handle_oauth`] needs besides the request itself.
#[derive(Clone, Copy)]
pub struct CallbackOptions<'a> {
    pub provider: &'a Provider,
    pub settings: &'a CookieSettings,
    pub logger: &'a dyn AuthLogger,
    pub client: &'a reqwest::Client,
}

/// Complete the authorization-code flow for one callback request.
///
/// Protocol failures are returned as errors. A profile the provider's mapper
/// cannot normalize is logged and yields `profile: None`.
#[instrument(skip_all, fields(provider = %options.provider.id))]
pub async fn handle_oauth(
    params: &CallbackParams,
    jar: &CookieJar,
    options: &CallbackOptions<'_>,
) -> Result<CallbackOutcome, CallbackError> {
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();
    #[cfg(feature = "metrics")]
    {
        use warden_metrics::{counter, labels, oauth};
        counter!(oauth::CALLBACKS_TOTAL, labels::PROVIDER => options.provider.id.clone())
            .increment(1);
    }

    let result = exchange(params, jar, options).await;

    #[cfg(feature = "metrics")]
    {
        use warden_metrics::{counter, histogram, labels, oauth};
        let provider = options.provider.id.clone();
        histogram!(oauth::CALLBACK_DURATION_SECONDS, labels::PROVIDER => provider.clone())
            .record(start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => counter!(oauth::CALLBACK_SUCCESS_TOTAL, labels::PROVIDER => provider)
                .increment(1),
            Err(e) => counter!(
                oauth::CALLBACK_FAILURES_TOTAL,
                labels::PROVIDER => provider,
                labels::ERROR_TYPE => e.kind()
            )
            .increment(1),
        }
    }

    if let Err(e) = &result {
        warn!(error = %e, "oauth callback failed");
    }
    result
}

async fn exchange(
    params: &CallbackParams,
    jar: &CookieJar,
    options: &CallbackOptions<'_>,
) -> Result<CallbackOutcome, CallbackError> {
    let provider = options.provider;
    let metadata = resolve_metadata(provider, options.client).await?;
    let mut cookies: Vec<Cookie<'static>> = Vec::new();

    let state = checks::use_check(CheckKind::State, provider, jar, &mut cookies, options.settings)?;
    let code = validate_authorization_response(params, &metadata, state.as_deref())?;

    let code_verifier =
        checks::use_check(CheckKind::Pkce, provider, jar, &mut cookies, options.settings)?;
    let mut raw = authorization_code_grant(
        options.client,
        &metadata,
        provider,
        code,
        code_verifier.as_deref(),
    )
    .await?;
    if let Some(conformed) = provider.token.conform.as_ref().and_then(|conform| conform(&raw)) {
        debug!("token response rewritten by conform hook");
        raw = conformed;
    }

    let challenges = challenge::from_headers(&raw.headers);
    if !challenges.is_empty() {
        return Err(CallbackError::Challenge(challenges));
    }

    let (tokens, raw_profile) = match provider.kind {
        ProviderType::Oidc => {
            let nonce =
                checks::use_check(CheckKind::Nonce, provider, jar, &mut cookies, options.settings)?;
            let tokens = process_token_response(&raw, ProviderType::Oidc)?;
            let id_token = tokens.id_token.as_deref().unwrap_or_default();
            let claims = validate_id_token(
                id_token,
                &metadata,
                provider,
                nonce.as_deref(),
                options.client,
            )
            .await?;
            (tokens, Value::Object(claims))
        },
        ProviderType::OAuth => {
            let tokens = process_token_response(&raw, ProviderType::OAuth)?;
            let raw_profile = if let Some(request) = &provider.userinfo.request {
                let context = UserinfoContext {
                    provider_id: provider.id.clone(),
                    tokens: tokens.clone(),
                    userinfo_url: metadata.userinfo_endpoint.clone(),
                    client: options.client.clone(),
                };
                request(context)
                    .await
                    .map_err(|e| CallbackError::Userinfo(format!("{e:#}")))?
            } else if let Some(url) = &metadata.userinfo_endpoint {
                fetch_userinfo(options.client, url, &tokens).await?
            } else {
                debug!("no userinfo endpoint, mapping profile from the token response");
                Value::Object(Map::new())
            };
            (tokens, raw_profile)
        },
    };

    let profile = get_profile(raw_profile, tokens, provider, options.logger);
    if let Some(result) = &profile {
        info!(account = %result.account.provider_account_id, "oauth callback completed");
    }
    Ok(CallbackOutcome { profile, cookies })
}

/// Validate the redirect parameters and return the authorization code.
fn validate_authorization_response<'p>(
    params: &'p CallbackParams,
    metadata: &AuthorizationServerMetadata,
    expected_state: Option<&str>,
) -> Result<&'p str, CallbackError> {
    if let Some(code) = &params.error {
        return Err(CallbackError::Callback {
            code: code.clone(),
            description: params.error_description.clone(),
        });
    }

    match params.iss.as_deref() {
        Some(iss) if !same_issuer(iss, metadata.issuer.as_str()) => {
            return Err(CallbackError::InvalidResponse(format!(
                "unexpected iss parameter {iss}"
            )));
        },
        None if metadata.iss_parameter_supported => {
            return Err(CallbackError::InvalidResponse(
                "missing iss parameter".into(),
            ));
        },
        _ => {},
    }

    if let Some(expected) = expected_state {
        match params.state.as_deref() {
            Some(state) if state == expected => {},
            Some(_) => {
                return Err(CallbackError::InvalidCheck {
                    check: CheckKind::State.as_str(),
                    reason: "state mismatch",
                });
            },
            None => {
                return Err(CallbackError::InvalidCheck {
                    check: CheckKind::State.as_str(),
                    reason: "state parameter missing",
                });
            },
        }
    }

    match params.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(CallbackError::InvalidResponse(
            "missing code parameter".into(),
        )),
    }
}

/// Run the provider's profile mapper. Failures are reported through `logger`
/// and turn into `None`.
fn get_profile(
    raw_profile: Value,
    tokens: TokenSet,
    provider: &Provider,
    logger: &dyn AuthLogger,
) -> Option<ProfileResult> {
    match normalize(&raw_profile, &tokens, provider) {
        Ok(profile) => {
            let account = Account {
                provider: provider.id.clone(),
                provider_type: provider.kind,
                provider_account_id: profile.id.clone(),
                user_id: None,
                expires_at: tokens
                    .expires_in
                    .and_then(|secs| i64::try_from(secs).ok())
                    .map(|secs| chrono::Utc::now().timestamp().saturating_add(secs)),
                tokens,
            };
            Some(ProfileResult {
                profile,
                account,
                raw_profile,
            })
        },
        Err(reason) => {
            #[cfg(feature = "metrics")]
            warden_metrics::counter!(
                warden_metrics::oauth::PROFILE_PARSE_FAILURES_TOTAL,
                warden_metrics::labels::PROVIDER => provider.id.clone()
            )
            .increment(1);

            logger.debug("profile_parse_error_details", &raw_profile);
            logger.error(&ProfileParseError {
                provider: provider.id.clone(),
                reason,
            });
            None
        },
    }
}

fn normalize(raw: &Value, tokens: &TokenSet, provider: &Provider) -> Result<Profile, String> {
    let mut profile = (provider.profile)(raw, tokens).map_err(|e| format!("{e:#}"))?;
    if profile.id.is_empty() {
        return Err("profile id is missing".into());
    }
    if let Some(email) = profile.email.as_mut() {
        *email = email.to_lowercase();
    }
    Ok(profile)
}
