//! Built-in provider presets and construction from configuration.

use std::sync::Arc;

use {
    serde_json::Value,
    tracing::debug,
    url::Url,
    warden_common::{ProviderType, TokenSet},
    warden_config::{ProviderEntry, WardenConfig},
};

use crate::{
    checks::CheckKind,
    provider::{Provider, claim_string},
    types::{ClientAuthMethod, ClientCredentials, Profile},
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderConfigError {
    #[error("provider {provider}: {field} is required")]
    MissingField {
        provider: String,
        field: &'static str,
    },

    #[error("provider {provider}: invalid {field} {value:?}")]
    InvalidValue {
        provider: String,
        field: &'static str,
        value: String,
    },
}

/// Okta OIDC. `issuer` is the Okta authorization server URL.
#[must_use]
pub fn okta(client: ClientCredentials, issuer: Url, callback_url: Url) -> Provider {
    let mut provider = Provider::new("okta", ProviderType::Oidc, client, callback_url);
    provider.name = "Okta".into();
    provider.issuer = Some(issuer);
    provider.profile = Arc::new(|raw: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        Ok(Profile {
            id: claim_string(raw, "sub").unwrap_or_default(),
            name: claim_string(raw, "name").or_else(|| claim_string(raw, "preferred_username")),
            email: claim_string(raw, "email"),
            image: claim_string(raw, "picture"),
            extra: serde_json::Map::new(),
        })
    });
    provider
}

#[must_use]
pub fn beyond_identity(client: ClientCredentials, issuer: Url, callback_url: Url) -> Provider {
    let mut provider = Provider::new("beyondidentity", ProviderType::Oidc, client, callback_url);
    provider.name = "Beyond Identity".into();
    provider.issuer = Some(issuer);
    provider.profile = Arc::new(|raw: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        let mut extra = serde_json::Map::new();
        if let Some(username) = raw.get("preferred_username") {
            extra.insert("preferred_username".into(), username.clone());
        }
        Ok(Profile {
            id: claim_string(raw, "sub").unwrap_or_default(),
            name: claim_string(raw, "name"),
            email: claim_string(raw, "email"),
            image: None,
            extra,
        })
    });
    provider
}

#[must_use]
pub fn reddit(client: ClientCredentials, callback_url: Url) -> Provider {
    let mut provider = Provider::new("reddit", ProviderType::OAuth, client, callback_url);
    provider.name = "Reddit".into();
    provider.authorization.url =
        parse_static("https://www.reddit.com/api/v1/authorize?scope=identity");
    provider.token.url = parse_static("https://www.reddit.com/api/v1/access_token");
    provider.userinfo.url = parse_static("https://oauth.reddit.com/api/v1/me");
    provider.checks = vec![CheckKind::State];
    provider.profile = Arc::new(|raw: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        Ok(Profile {
            id: claim_string(raw, "id").unwrap_or_default(),
            name: claim_string(raw, "name"),
            ..Profile::default()
        })
    });
    provider
}

#[must_use]
pub fn spotify(client: ClientCredentials, callback_url: Url) -> Provider {
    let mut provider = Provider::new("spotify", ProviderType::OAuth, client, callback_url);
    provider.name = "Spotify".into();
    provider.authorization.url =
        parse_static("https://accounts.spotify.com/authorize?scope=user-read-email");
    provider.token.url = parse_static("https://accounts.spotify.com/api/token");
    provider.userinfo.url = parse_static("https://api.spotify.com/v1/me");
    provider.profile = Arc::new(|raw: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        Ok(Profile {
            id: claim_string(raw, "id").unwrap_or_default(),
            name: claim_string(raw, "display_name"),
            email: claim_string(raw, "email"),
            image: raw
                .pointer("/images/0/url")
                .and_then(Value::as_str)
                .map(str::to_string),
            extra: serde_json::Map::new(),
        })
    });
    provider
}

fn parse_static(url: &str) -> Option<Url> {
    Url::parse(url).ok()
}

/// Build every configured provider.
pub fn load_providers(config: &WardenConfig) -> Result<Vec<Provider>, ProviderConfigError> {
    config
        .providers
        .iter()
        .map(|(id, entry)| provider_from_entry(id, entry, &config.base_url))
        .collect()
}

/// Build one provider from its config entry, starting from the preset named by
/// `preset` (or the entry id) when one exists.
pub fn provider_from_entry(
    id: &str,
    entry: &ProviderEntry,
    base_url: &Url,
) -> Result<Provider, ProviderConfigError> {
    let missing = |field| ProviderConfigError::MissingField {
        provider: id.to_string(),
        field,
    };
    let invalid = |field, value: &str| ProviderConfigError::InvalidValue {
        provider: id.to_string(),
        field,
        value: value.to_string(),
    };

    let client_id = entry.client_id.clone().ok_or_else(|| missing("client_id"))?;
    let mut client = ClientCredentials::new(client_id, entry.client_secret.clone());
    if let Some(method) = &entry.token_endpoint_auth_method {
        client.auth_method = method
            .parse::<ClientAuthMethod>()
            .map_err(|_| invalid("token_endpoint_auth_method", method))?;
    }

    let callback_url = match &entry.callback_url {
        Some(url) => url.clone(),
        None => Url::parse(&format!(
            "{}/callback/{id}",
            base_url.as_str().trim_end_matches('/')
        ))
        .map_err(|_| invalid("callback_url", id))?,
    };

    let preset = entry.preset.as_deref().unwrap_or(id);
    let mut provider = match preset {
        "okta" => okta(
            client,
            entry.issuer.clone().ok_or_else(|| missing("issuer"))?,
            callback_url,
        ),
        "beyondidentity" | "beyond_identity" => beyond_identity(
            client,
            entry.issuer.clone().ok_or_else(|| missing("issuer"))?,
            callback_url,
        ),
        "reddit" => reddit(client, callback_url),
        "spotify" => spotify(client, callback_url),
        _ if entry.preset.is_some() => return Err(invalid("preset", preset)),
        _ => {
            let kind = entry.kind.as_deref().ok_or_else(|| missing("kind"))?;
            let kind = kind.parse::<ProviderType>().map_err(|_| invalid("kind", kind))?;
            Provider::new(id, kind, client, callback_url)
        },
    };

    provider.id = id.to_string();
    if let Some(name) = &entry.name {
        provider.name = name.clone();
    }
    if let Some(issuer) = &entry.issuer {
        provider.issuer = Some(issuer.clone());
    }
    if let Some(url) = &entry.authorization_url {
        provider.authorization.url = Some(url.clone());
    }
    if let Some(url) = &entry.token_url {
        provider.token.url = Some(url.clone());
    }
    if let Some(url) = &entry.userinfo_url {
        provider.userinfo.url = Some(url.clone());
    }
    if let Some(scope) = &entry.scope {
        provider.authorization.scope = Some(scope.clone());
    }
    if let Some(checks) = &entry.checks {
        // "none" disables every check and cannot be combined with others.
        provider.checks = if checks.iter().any(|c| c == "none") {
            if checks.len() > 1 {
                return Err(invalid("checks", &checks.join(",")));
            }
            Vec::new()
        } else {
            checks
                .iter()
                .map(|c| c.parse::<CheckKind>().map_err(|_| invalid("checks", c)))
                .collect::<Result<_, _>>()?
        };
    }

    debug!(provider = %provider.id, kind = %provider.kind, preset, "provider configured");
    Ok(provider)
}
