//! End-to-end callback tests against an in-process authorization server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    axum::{
        Form, Json, Router,
        extract::State,
        http::{HeaderValue, StatusCode, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    futures::future::BoxFuture,
    jsonwebtoken::{Algorithm, EncodingKey, Header, encode},
    secrecy::SecretString,
    serde_json::{Value, json},
    warden_common::{ProviderType, TokenSet},
    warden_oauth::{
        AuthLogger, CallbackError, CallbackOptions, CallbackOutcome, CallbackParams, CheckKind,
        ClientCredentials, CookieJar, CookieSettings, Profile, Provider, RawTokenResponse,
        UserinfoContext, authorization_url, checks, handle_oauth, is_removal, pkce,
        resolve_metadata,
    },
};

const CLIENT_ID: &str = "client-1";
const CLIENT_SECRET: &str = "client-secret";

/// Behavior of the mock authorization server.
struct MockIdp {
    discovery: Option<Value>,
    token_status: StatusCode,
    token_body: Value,
    www_authenticate: Option<String>,
    userinfo: Value,
    discovery_hits: AtomicUsize,
    token_hits: AtomicUsize,
    userinfo_hits: AtomicUsize,
    last_token_form: Mutex<Option<HashMap<String, String>>>,
    last_authorization: Mutex<Option<String>>,
}

impl MockIdp {
    fn new(token_body: Value) -> Self {
        Self {
            discovery: None,
            token_status: StatusCode::OK,
            token_body,
            www_authenticate: None,
            userinfo: json!({"id": "user-1", "name": "Ada", "email": "Ada@Example.COM"}),
            discovery_hits: AtomicUsize::new(0),
            token_hits: AtomicUsize::new(0),
            userinfo_hits: AtomicUsize::new(0),
            last_token_form: Mutex::new(None),
            last_authorization: Mutex::new(None),
        }
    }

    fn hits(&self) -> (usize, usize, usize) {
        (
            self.discovery_hits.load(Ordering::SeqCst),
            self.token_hits.load(Ordering::SeqCst),
            self.userinfo_hits.load(Ordering::SeqCst),
        )
    }

    fn token_form(&self) -> HashMap<String, String> {
        self.last_token_form.lock().unwrap().clone().unwrap_or_default()
    }
}

async fn discovery(State(idp): State<Arc<MockIdp>>) -> Response {
    idp.discovery_hits.fetch_add(1, Ordering::SeqCst);
    match &idp.discovery {
        Some(doc) => Json(doc.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn token(
    State(idp): State<Arc<MockIdp>>,
    headers: axum::http::HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    idp.token_hits.fetch_add(1, Ordering::SeqCst);
    *idp.last_token_form.lock().unwrap() = Some(form);
    *idp.last_authorization.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = (idp.token_status, Json(idp.token_body.clone())).into_response();
    if let Some(challenge) = &idp.www_authenticate {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_str(challenge).unwrap(),
        );
    }
    response
}

async fn userinfo(State(idp): State<Arc<MockIdp>>, headers: axum::http::HeaderMap) -> Response {
    idp.userinfo_hits.fetch_add(1, Ordering::SeqCst);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(idp.userinfo.clone()).into_response()
}

/// Start the mock server. `build` receives the base URL so documents and
/// ID tokens can reference it.
async fn start_idp(build: impl FnOnce(&str) -> MockIdp) -> (String, Arc<MockIdp>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let idp = Arc::new(build(&base));
    let app = Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .with_state(Arc::clone(&idp));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, idp)
}

fn oauth_token_body() -> Value {
    json!({
        "access_token": "at-1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "rt-1",
        "scope": "identity",
        "x_provider_extra": {"tier": "gold"}
    })
}

fn discovery_doc(base: &str) -> Value {
    json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "userinfo_endpoint": format!("{base}/userinfo"),
    })
}

fn id_token(issuer: &str, nonce: Option<&str>) -> String {
    let now = chrono::Utc::now().timestamp();
    let mut claims = json!({
        "iss": issuer,
        "aud": CLIENT_ID,
        "sub": "oidc-user",
        "email": "Grace@Example.com",
        "name": "Grace",
        "iat": now,
        "exp": now + 600,
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(CLIENT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn credentials() -> ClientCredentials {
    ClientCredentials::new(CLIENT_ID, Some(SecretString::new(CLIENT_SECRET.into())))
}

fn oauth_provider(base: &str) -> Provider {
    let mut provider = Provider::new(
        "mock",
        ProviderType::OAuth,
        credentials(),
        "https://app.example/auth/callback/mock".parse().unwrap(),
    );
    provider.token.url = Some(format!("{base}/token").parse().unwrap());
    provider.userinfo.url = Some(format!("{base}/userinfo").parse().unwrap());
    provider
}

fn oidc_provider(base: &str) -> Provider {
    let mut provider = Provider::new(
        "mock-oidc",
        ProviderType::Oidc,
        credentials(),
        "https://app.example/auth/callback/mock-oidc".parse().unwrap(),
    );
    provider.issuer = Some(base.parse().unwrap());
    provider
}

/// Jar holding a freshly created cookie for each enabled check.
fn jar_for(
    provider: &Provider,
    settings: &CookieSettings,
) -> (CookieJar, HashMap<CheckKind, String>) {
    let mut jar = CookieJar::new();
    let mut values = HashMap::new();
    for kind in &provider.checks {
        let (value, cookie) = checks::create(*kind, settings);
        jar.apply(&[cookie]);
        values.insert(*kind, value);
    }
    (jar, values)
}

#[derive(Default)]
struct RecordingLogger {
    debug: Mutex<Vec<(String, Value)>>,
    errors: Mutex<Vec<String>>,
}

impl AuthLogger for RecordingLogger {
    fn debug(&self, event: &str, data: &Value) {
        self.debug.lock().unwrap().push((event.to_string(), data.clone()));
    }

    fn error(&self, error: &(dyn std::error::Error + 'static)) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

async fn run(
    provider: &Provider,
    query: &str,
    jar: &CookieJar,
    logger: &RecordingLogger,
) -> Result<CallbackOutcome, CallbackError> {
    let settings = CookieSettings::default();
    let client = reqwest::Client::new();
    let options = CallbackOptions {
        provider,
        settings: &settings,
        logger,
        client: &client,
    };
    let params = CallbackParams::from_query(query)?;
    handle_oauth(&params, jar, &options).await
}

#[tokio::test]
async fn configured_endpoints_skip_discovery() {
    let (base, idp) = start_idp(|base| {
        let mut idp = MockIdp::new(oauth_token_body());
        idp.discovery = Some(discovery_doc(base));
        idp
    })
    .await;
    let provider = oauth_provider(&base);
    let (jar, values) = jar_for(&provider, &CookieSettings::default());
    let logger = RecordingLogger::default();

    let outcome = run(&provider, "code=c-1", &jar, &logger).await.unwrap();

    assert_eq!(idp.hits(), (0, 1, 1));
    let result = outcome.profile.unwrap();
    assert_eq!(result.profile.id, "user-1");
    assert_eq!(result.account.provider, "mock");
    assert_eq!(result.account.provider_type, ProviderType::OAuth);
    assert_eq!(result.account.provider_account_id, "user-1");
    assert!(result.account.expires_at.is_some());

    let form = idp.token_form();
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "c-1");
    assert_eq!(form["redirect_uri"], "https://app.example/auth/callback/mock");
    assert_eq!(form["code_verifier"], values[&CheckKind::Pkce]);
    assert!(!form.contains_key("client_secret"));
    assert!(
        idp.last_authorization
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|v| v.starts_with("Basic "))
    );

    // The PKCE cookie is expired on the way out.
    assert_eq!(outcome.cookies.len(), 1);
    assert_eq!(outcome.cookies[0].name(), "warden.pkce.code_verifier");
    assert!(is_removal(&outcome.cookies[0]));
}

#[tokio::test]
async fn tokens_round_trip_without_conform() {
    let (base, _idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    let tokens = outcome.profile.unwrap().account.tokens;
    assert_eq!(serde_json::to_value(&tokens).unwrap(), oauth_token_body());
}

#[tokio::test]
async fn email_is_lower_cased() {
    let (base, _idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    let result = outcome.profile.unwrap();
    assert_eq!(result.profile.email.as_deref(), Some("ada@example.com"));
    assert_eq!(result.raw_profile["email"], "Ada@Example.COM");
}

#[tokio::test]
async fn discovery_runs_without_configured_endpoints() {
    let (base, idp) = start_idp(|base| {
        let mut idp = MockIdp::new(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "id_token": id_token(base, None),
        }));
        idp.discovery = Some(discovery_doc(base));
        idp
    })
    .await;
    let provider = oidc_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    assert_eq!(idp.hits(), (1, 1, 0));
    let result = outcome.profile.unwrap();
    assert_eq!(result.profile.id, "oidc-user");
    assert_eq!(result.profile.email.as_deref(), Some("grace@example.com"));
    assert_eq!(result.account.provider_type, ProviderType::Oidc);
    assert_eq!(result.raw_profile["aud"], CLIENT_ID);
}

#[tokio::test]
async fn discovery_without_userinfo_endpoint_is_fatal() {
    let (base, idp) = start_idp(|base| {
        let mut idp = MockIdp::new(oauth_token_body());
        let mut doc = discovery_doc(base);
        doc.as_object_mut().unwrap().remove("userinfo_endpoint");
        idp.discovery = Some(doc);
        idp
    })
    .await;
    let provider = oidc_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CallbackError::MissingEndpoint {
            endpoint: "userinfo_endpoint",
            ..
        }
    ));
    assert_eq!(idp.hits(), (1, 0, 0));
}

#[tokio::test]
async fn discovery_without_token_endpoint_is_fatal() {
    let (base, idp) = start_idp(|base| {
        let mut idp = MockIdp::new(oauth_token_body());
        let mut doc = discovery_doc(base);
        doc.as_object_mut().unwrap().remove("token_endpoint");
        idp.discovery = Some(doc);
        idp
    })
    .await;
    let mut provider = oidc_provider(&base);
    provider.kind = ProviderType::OAuth;
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CallbackError::MissingEndpoint {
            endpoint: "token_endpoint",
            ..
        }
    ));
    assert_eq!(idp.hits(), (1, 0, 0));
}

#[tokio::test]
async fn disabled_state_check_ignores_state_parameter() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let provider = oauth_provider(&base);
    assert!(!provider.has_check(CheckKind::State));
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    for query in ["code=c", "code=c&state=forged"] {
        let outcome = run(&provider, query, &jar, &RecordingLogger::default())
            .await
            .unwrap();
        assert!(outcome.profile.is_some());
    }
    assert_eq!(idp.hits().1, 2);
}

#[tokio::test]
async fn enabled_state_check_rejects_mismatch_before_token_exchange() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.checks = vec![CheckKind::State];
    let (jar, values) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c&state=forged", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidCheck { check: "state", .. }));
    assert_eq!(idp.hits().1, 0);

    let query = format!("code=c&state={}", values[&CheckKind::State]);
    let outcome = run(&provider, &query, &jar, &RecordingLogger::default())
        .await
        .unwrap();
    assert_eq!(outcome.cookies[0].name(), "warden.state");
}

#[tokio::test]
async fn access_denied_skips_token_exchange() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(
        &provider,
        "error=access_denied&error_description=User+cancelled",
        &jar,
        &RecordingLogger::default(),
    )
    .await
    .unwrap_err();
    match err {
        CallbackError::Callback { code, description } => {
            assert_eq!(code, "access_denied");
            assert_eq!(description.as_deref(), Some("User cancelled"));
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(idp.hits(), (0, 0, 0));
}

#[tokio::test]
async fn missing_pkce_cookie_is_rejected() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let provider = oauth_provider(&base);

    let err = run(&provider, "code=c", &CookieJar::new(), &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidCheck { check: "pkce", .. }));
    assert_eq!(idp.hits().1, 0);
}

#[tokio::test]
async fn pkce_disabled_omits_code_verifier() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.checks.clear();

    let outcome = run(&provider, "code=c", &CookieJar::new(), &RecordingLogger::default())
        .await
        .unwrap();
    assert!(outcome.cookies.is_empty());
    assert!(!idp.token_form().contains_key("code_verifier"));
}

#[tokio::test]
async fn oidc_nonce_is_single_use() {
    let settings = CookieSettings::default();
    let nonce = checks::create(CheckKind::Nonce, &settings);
    let nonce_value = nonce.0.clone();
    let (base, _idp) = start_idp(move |base| {
        let mut idp = MockIdp::new(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "id_token": id_token(base, Some(&nonce_value)),
        }));
        idp.discovery = Some(discovery_doc(base));
        idp
    })
    .await;
    let mut provider = oidc_provider(&base);
    provider.checks = vec![CheckKind::Nonce];
    let mut jar = CookieJar::new();
    jar.apply(&[nonce.1]);

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    assert!(outcome.profile.is_some());
    let expiring: Vec<_> = outcome
        .cookies
        .iter()
        .filter(|c| c.name() == "warden.nonce")
        .collect();
    assert_eq!(expiring.len(), 1);
    assert!(is_removal(expiring[0]));

    jar.apply(&outcome.cookies);
    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidCheck { check: "nonce", .. }));
}

#[tokio::test]
async fn id_token_with_foreign_nonce_is_rejected() {
    let (base, _idp) = start_idp(|base| {
        let mut idp = MockIdp::new(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "id_token": id_token(base, Some("replayed")),
        }));
        idp.discovery = Some(discovery_doc(base));
        idp
    })
    .await;
    let mut provider = oidc_provider(&base);
    provider.checks = vec![CheckKind::Nonce];
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::IdToken(_)));
}

#[tokio::test]
async fn mapper_without_id_soft_fails_and_logs_once() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.profile = Arc::new(|raw: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        Ok(Profile {
            name: raw["name"].as_str().map(str::to_string),
            ..Profile::default()
        })
    });
    let (jar, _) = jar_for(&provider, &CookieSettings::default());
    let logger = RecordingLogger::default();

    let outcome = run(&provider, "code=c", &jar, &logger).await.unwrap();

    assert!(outcome.profile.is_none());
    assert_eq!(outcome.cookies.len(), 1);
    assert_eq!(idp.hits(), (0, 1, 1));
    let errors = logger.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("profile id is missing"));
    let debug = logger.debug.lock().unwrap();
    assert_eq!(debug.len(), 1);
    assert_eq!(debug[0].1["id"], "user-1");
}

#[tokio::test]
async fn mapper_error_soft_fails() {
    let (base, _idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.profile = Arc::new(|_: &Value, _: &TokenSet| -> anyhow::Result<Profile> {
        anyhow::bail!("unexpected profile shape")
    });
    let (jar, _) = jar_for(&provider, &CookieSettings::default());
    let logger = RecordingLogger::default();

    let outcome = run(&provider, "code=c", &jar, &logger).await.unwrap();
    assert!(outcome.profile.is_none());
    let errors = logger.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("unexpected profile shape"));
}

#[tokio::test]
async fn conform_hook_repairs_token_response() {
    let (base, _idp) = start_idp(|_| MockIdp::new(json!({"access_token": "at-1"}))).await;
    let mut provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidResponse(_)));

    provider.token.conform = Some(Arc::new(
        |raw: &RawTokenResponse| -> Option<RawTokenResponse> {
            let mut body = raw.json().ok()?;
            body["token_type"] = json!("bearer");
            Some(raw.with_json(&body))
        },
    ));
    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    let tokens = outcome.profile.unwrap().account.tokens;
    assert_eq!(tokens.token_type, "bearer");
    assert_eq!(tokens.access_token, "at-1");
}

#[tokio::test]
async fn conform_hook_returning_none_keeps_response() {
    let (base, _idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.token.conform = Some(Arc::new(
        |_: &RawTokenResponse| -> Option<RawTokenResponse> { None },
    ));
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(outcome.profile.unwrap().account.tokens).unwrap(),
        oauth_token_body()
    );
}

#[tokio::test]
async fn www_authenticate_challenge_is_fatal() {
    let (base, idp) = start_idp(|_| {
        let mut idp = MockIdp::new(json!({"error": "invalid_client"}));
        idp.token_status = StatusCode::UNAUTHORIZED;
        idp.www_authenticate = Some(r#"Bearer realm="mock", error="invalid_client""#.into());
        idp
    })
    .await;
    let provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    match err {
        CallbackError::Challenge(challenges) => {
            assert_eq!(challenges.len(), 1);
            assert_eq!(challenges[0].scheme, "bearer");
            assert_eq!(challenges[0].parameters["error"], "invalid_client");
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(idp.hits(), (0, 1, 0));
}

#[tokio::test]
async fn token_endpoint_error_body_is_surfaced() {
    let (base, idp) = start_idp(|_| {
        let mut idp = MockIdp::new(json!({
            "error": "invalid_grant",
            "error_description": "authorization code expired"
        }));
        idp.token_status = StatusCode::BAD_REQUEST;
        idp
    })
    .await;
    let provider = oauth_provider(&base);
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let err = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::TokenEndpoint { ref code, .. } if code == "invalid_grant"));
    assert_eq!(idp.hits().2, 0);
}

#[tokio::test]
async fn userinfo_request_hook_replaces_default_fetch() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.userinfo.request = Some(Arc::new(
        |ctx: UserinfoContext| -> BoxFuture<'static, anyhow::Result<Value>> {
            Box::pin(async move {
                Ok::<_, anyhow::Error>(json!({
                    "id": format!("{}:{}", ctx.provider_id, ctx.tokens.access_token),
                    "email": "Hook@Example.com"
                }))
            })
        },
    ));
    let (jar, _) = jar_for(&provider, &CookieSettings::default());

    let outcome = run(&provider, "code=c", &jar, &RecordingLogger::default())
        .await
        .unwrap();
    let result = outcome.profile.unwrap();
    assert_eq!(result.profile.id, "mock:at-1");
    assert_eq!(result.profile.email.as_deref(), Some("hook@example.com"));
    assert_eq!(idp.hits(), (0, 1, 0));
}

#[tokio::test]
async fn authorization_request_feeds_callback() {
    let (base, idp) = start_idp(|base| {
        let mut idp = MockIdp::new(oauth_token_body());
        idp.discovery = Some(discovery_doc(base));
        idp
    })
    .await;
    let mut provider = oauth_provider(&base);
    provider.authorization.url = Some(format!("{base}/authorize").parse().unwrap());
    provider.checks = vec![CheckKind::State, CheckKind::Pkce];
    let settings = CookieSettings::default();
    let client = reqwest::Client::new();

    let metadata = resolve_metadata(&provider, &client).await.unwrap();
    let request = authorization_url(&provider, &metadata, &settings).unwrap();
    let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();

    let mut jar = CookieJar::new();
    jar.apply(&request.cookies);
    let callback_query = format!("code=c-9&state={}", query["state"]);
    let outcome = run(&provider, &callback_query, &jar, &RecordingLogger::default())
        .await
        .unwrap();

    assert!(outcome.profile.is_some());
    assert_eq!(outcome.cookies.len(), 2);
    let verifier = request
        .cookies
        .iter()
        .find(|c| c.name() == "warden.pkce.code_verifier")
        .unwrap();
    assert_eq!(idp.token_form()["code_verifier"], verifier.value());
    assert_eq!(
        query["code_challenge"],
        pkce::challenge_for(verifier.value())
    );

    jar.apply(&outcome.cookies);
    assert!(jar.is_empty());
}

#[tokio::test]
async fn token_url_only_provider_maps_profile_from_tokens() {
    let (base, idp) = start_idp(|_| {
        MockIdp::new(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "user_id": "u-42",
        }))
    })
    .await;
    let mut provider = oauth_provider(&base);
    provider.userinfo.url = None;
    provider.profile = Arc::new(|raw: &Value, tokens: &TokenSet| -> anyhow::Result<Profile> {
        assert_eq!(raw, &json!({}));
        Ok(Profile {
            id: tokens.extra["user_id"].as_str().unwrap_or_default().to_string(),
            ..Profile::default()
        })
    });
    let (jar, _) = jar_for(&provider, &CookieSettings::default());
    let logger = RecordingLogger::default();

    let outcome = run(&provider, "code=c", &jar, &logger).await.unwrap();

    assert_eq!(idp.hits(), (0, 1, 0));
    let result = outcome.profile.unwrap();
    assert_eq!(result.profile.id, "u-42");
    assert_eq!(result.raw_profile, json!({}));
    assert!(logger.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_callback_parameters_are_rejected() {
    let (base, idp) = start_idp(|_| MockIdp::new(oauth_token_body())).await;
    let mut provider = oauth_provider(&base);
    provider.checks = vec![CheckKind::State, CheckKind::Pkce];
    let (jar, values) = jar_for(&provider, &CookieSettings::default());
    let state = &values[&CheckKind::State];

    for query in [
        format!("code=c&state={state}&state={state}"),
        format!("code=c&code=c&state={state}"),
    ] {
        let err = run(&provider, &query, &jar, &RecordingLogger::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::InvalidResponse(_)), "{query}");
    }
    assert_eq!(idp.hits(), (0, 0, 0));

    let outcome = run(
        &provider,
        &format!("code=c&state={state}"),
        &jar,
        &RecordingLogger::default(),
    )
    .await
    .unwrap();
    assert!(outcome.profile.is_some());
}
