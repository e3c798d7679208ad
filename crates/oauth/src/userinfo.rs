use {
    reqwest::header::ACCEPT,
    serde_json::Value,
    tracing::{debug, instrument},
    url::Url,
    warden_common::TokenSet,
};

use crate::error::CallbackError;

/// Bearer-authenticated GET of the userinfo endpoint.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_userinfo(
    client: &reqwest::Client,
    url: &Url,
    tokens: &TokenSet,
) -> Result<Value, CallbackError> {
    let response = client
        .get(url.clone())
        .bearer_auth(&tokens.access_token)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CallbackError::Userinfo(format!("{status}: {body}")));
    }

    let profile: Value = response
        .json()
        .await
        .map_err(|e| CallbackError::Userinfo(format!("invalid JSON: {e}")))?;
    if !profile.is_object() {
        return Err(CallbackError::Userinfo("response is not a JSON object".into()));
    }
    debug!("fetched userinfo");
    Ok(profile)
}
