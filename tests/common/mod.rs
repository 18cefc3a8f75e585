//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use keygate::auth::oauth::{IdentityProvider, ProviderError};
use keygate::auth::SESSION_COOKIE;
use keygate::domain::{Account, AccountId, AccountStatus, ApiToken, ExternalIdentity, Provider, Role};
use keygate::i18n::StaticCatalog;
use keygate::infra::{InMemoryAccountStore, InMemoryTokenStore};
use keygate::server::{build_router, AppState, Config};
use tower_sessions::MemoryStore;

/// Provider whose exchange answers from a fixed code table
pub struct StubProvider {
    provider: Provider,
    enabled: bool,
    identities: HashMap<String, ExternalIdentity>,
}

impl StubProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            enabled: true,
            identities: HashMap::new(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Code `code` exchanges for `provider_user_id`
    pub fn with_code(mut self, code: &str, provider_user_id: &str) -> Self {
        self.identities.insert(
            code.to_string(),
            ExternalIdentity::new(self.provider, provider_user_id),
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected("invalid code".to_string()))
    }
}

/// Router plus direct handles on its stores
pub struct TestApp {
    pub router: axum::Router,
    pub state: AppState,
    pub accounts: Arc<InMemoryAccountStore>,
    pub tokens: Arc<InMemoryTokenStore>,
}

pub fn test_config() -> Config {
    Config {
        session_ttl: Duration::from_secs(3600),
        ..Config::default()
    }
}

pub fn test_app(config: Config, providers: Vec<Arc<dyn IdentityProvider>>) -> TestApp {
    let accounts = Arc::new(InMemoryAccountStore::new());
    let tokens = Arc::new(InMemoryTokenStore::new());
    let catalog = Arc::new(StaticCatalog::embedded().unwrap());

    let state = AppState::new(
        config,
        accounts.clone(),
        tokens.clone(),
        catalog,
        providers,
    );

    TestApp {
        router: build_router(state.clone(), MemoryStore::default(), None),
        state,
        accounts,
        tokens,
    }
}

/// Both providers enabled, with codes `gh-<n>` and `wx-<n>` mapping to ids
pub fn default_providers() -> Vec<Arc<dyn IdentityProvider>> {
    vec![
        Arc::new(
            StubProvider::new(Provider::GitHub)
                .with_code("gh-alice", "alice123")
                .with_code("gh-bob", "bob456"),
        ),
        Arc::new(
            StubProvider::new(Provider::WeChat)
                .with_code("wx-1", "u42")
                .with_code("wx-2", "u42")
                .with_code("wx-other", "u77"),
        ),
    ]
}

pub fn account(id: i64, username: &str, role: Role, access_token: &str) -> Account {
    Account {
        id: AccountId(id),
        username: username.to_string(),
        display_name: username.to_string(),
        email: None,
        role,
        status: AccountStatus::Enabled,
        github_id: None,
        wechat_id: None,
        access_token: Some(access_token.to_string()),
    }
}

pub fn api_token(id: i64, secret: &str, owner: AccountId) -> ApiToken {
    ApiToken {
        id,
        name: format!("token-{id}"),
        secret: secret.to_string(),
        account_id: owner,
        enabled: true,
        expires_at: None,
        unlimited_quota: false,
        remaining_quota: 500,
        model_limits_enabled: false,
        model_limits: BTreeSet::new(),
    }
}

/// Response pieces tests look at
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    /// `name=value` pair from `Set-Cookie`, ready for a `Cookie` header.
    /// Removal cookies (empty value) are ignored.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| {
                pair.strip_prefix(&format!("{SESSION_COOKIE}="))
                    .is_some_and(|value| !value.is_empty())
            })
            .map(str::to_string)
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Request builder options
#[derive(Default)]
pub struct RequestOptions<'a> {
    pub cookie: Option<&'a str>,
    pub authorization: Option<&'a str>,
    pub headers: Vec<(&'a str, &'a str)>,
    pub body: Option<serde_json::Value>,
    pub raw_body: Option<&'a str>,
}

/// Send a request to the test router.
pub async fn send_request(
    app: &axum::Router,
    method: Method,
    uri: &str,
    options: RequestOptions<'_>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = options.cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(authorization) = options.authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    for (name, value) in options.headers {
        builder = builder.header(name, value);
    }

    let body = if let Some(raw) = options.raw_body {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(raw.to_string())
    } else if let Some(json) = options.body {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(serde_json::to_vec(&json).unwrap())
    } else {
        Body::empty()
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> TestResponse {
    send_request(
        app,
        Method::POST,
        uri,
        RequestOptions {
            cookie,
            body: Some(body),
            ..Default::default()
        },
    )
    .await
}

pub async fn get(app: &axum::Router, uri: &str, cookie: Option<&str>) -> TestResponse {
    send_request(
        app,
        Method::GET,
        uri,
        RequestOptions {
            cookie,
            ..Default::default()
        },
    )
    .await
}

/// Run state + callback in one cookie jar. Returns the callback response and
/// the cookie to use afterwards (a login rotates it).
pub async fn oauth_round(
    app: &axum::Router,
    provider: &str,
    code: &str,
    cookie: Option<String>,
) -> (TestResponse, String) {
    let state = get(app, "/api/oauth/state", cookie.as_deref()).await;
    assert_eq!(state.status, StatusCode::OK);
    let cookie = cookie
        .or_else(|| state.session_cookie())
        .expect("state issue sets a session cookie");
    let nonce = state.body["data"].as_str().unwrap().to_string();

    let response = get(
        app,
        &format!("/api/oauth/{provider}?code={code}&state={nonce}"),
        Some(cookie.as_str()),
    )
    .await;
    let cookie = response.session_cookie().unwrap_or(cookie);
    (response, cookie)
}
