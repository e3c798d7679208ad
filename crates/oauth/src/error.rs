use crate::challenge::WwwAuthenticateChallenge;

/// Fatal failures of a callback exchange.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("provider {provider} has no {endpoint} configured or discovered")]
    MissingEndpoint {
        provider: String,
        endpoint: &'static str,
    },

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("authorization server returned error {code}{}", fmt_description(.description))]
    Callback {
        code: String,
        description: Option<String>,
    },

    #[error("{check} check failed: {reason}")]
    InvalidCheck {
        check: &'static str,
        reason: &'static str,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("token endpoint returned error {code}{}", fmt_description(.description))]
    TokenEndpoint {
        code: String,
        description: Option<String>,
    },

    #[error("token endpoint responded with WWW-Authenticate challenge(s): {}", fmt_challenges(.0))]
    Challenge(Vec<WwwAuthenticateChallenge>),

    #[error("id token rejected: {0}")]
    IdToken(String),

    #[error("userinfo request failed: {0}")]
    Userinfo(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl CallbackError {
    /// Short stable name, used as a metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingEndpoint { .. } => "missing_endpoint",
            Self::Discovery(_) => "discovery",
            Self::Callback { .. } => "callback",
            Self::InvalidCheck { .. } => "invalid_check",
            Self::InvalidResponse(_) => "invalid_response",
            Self::TokenEndpoint { .. } => "token_endpoint",
            Self::Challenge(_) => "challenge",
            Self::IdToken(_) => "id_token",
            Self::Userinfo(_) => "userinfo",
            Self::Http(_) => "http",
        }
    }
}

fn fmt_description(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

fn fmt_challenges(challenges: &[WwwAuthenticateChallenge]) -> String {
    challenges
        .iter()
        .map(|c| c.scheme.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The provider's profile mapper failed or produced no id. Reported through
/// the logger; the callback itself still completes.
#[derive(Debug, thiserror::Error)]
#[error("failed to parse {provider} profile: {reason}")]
pub struct ProfileParseError {
    pub provider: String,
    pub reason: String,
}
