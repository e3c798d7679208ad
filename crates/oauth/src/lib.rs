//! OAuth 2.0 / OpenID Connect authorization-code callback handling.
//!
//! [`handle_oauth`] runs one callback exchange: it resolves authorization
//! server metadata, consumes the single-use check cookies, exchanges the code
//! for tokens, retrieves the profile (ID token claims or userinfo) and
//! normalizes it into a [`ProfileResult`].

pub mod callback;
pub mod challenge;
pub mod checks;
pub mod cookie;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod id_token;
pub mod logger;
pub mod pkce;
pub mod provider;
pub mod providers;
pub mod token;
pub mod types;
pub mod userinfo;

pub use {
    callback::{CallbackOptions, CallbackParams, handle_oauth},
    challenge::WwwAuthenticateChallenge,
    checks::CheckKind,
    cookie::{Cookie, CookieJar, CookieSettings, SameSite, is_removal},
    discovery::resolve_metadata,
    error::{CallbackError, ProfileParseError},
    flow::{AuthorizationRequest, authorization_url},
    logger::{AuthLogger, TracingLogger},
    provider::{
        AuthorizationEndpoint, ConformHook, ProfileMapper, Provider, TokenEndpoint,
        UserinfoContext, UserinfoEndpoint, UserinfoRequest,
    },
    providers::{ProviderConfigError, load_providers, provider_from_entry},
    token::RawTokenResponse,
    types::{
        AuthorizationServerMetadata, CallbackOutcome, ClientAuthMethod, ClientCredentials,
        MetadataSource, PkceChallenge, Profile, ProfileResult,
    },
};
