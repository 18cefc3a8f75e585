//! HTTP server bootstrap for keygate.
//!
//! This module wires together:
//! - configuration
//! - stores (in-memory unless a persistence collaborator is plugged in)
//! - the auth services (resolver, API key authenticator, OAuth linker, manager)
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::time::Duration as CookieDuration;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tracing::{info, warn};

use crate::auth::oauth::{GitHubProvider, IdentityProvider, LinkerConfig, OAuthLinker, WeChatProvider};
use crate::auth::{
    AccountManager, ApiKeyAuthenticator, CredentialResolver, PasswordLogin, SESSION_COOKIE,
};
use crate::domain::{Account, AccountId, AccountStatus, Role};
use crate::i18n::{MessageCatalog, StaticCatalog};
use crate::infra::{
    AccountStatusCache, AccountStore, InMemoryAccountStore, InMemoryTokenStore, TokenStore,
};
use crate::metrics::MetricsRegistry;
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// GitHub OAuth settings
#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
}

/// WeChat companion server settings
#[derive(Debug, Clone, Default)]
pub struct WeChatConfig {
    pub enabled: bool,
    pub server_address: String,
    pub server_token: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Accept username/password logins.
    pub password_login_enabled: bool,
    /// Provision accounts on first external login.
    pub register_enabled: bool,
    /// Idle time after which a session expires.
    pub session_ttl: Duration,
    /// Mark the session cookie `Secure` (HTTPS only).
    pub session_cookie_secure: bool,
    /// How long an account status read may be served from cache.
    pub status_cache_ttl: Duration,
    pub status_cache_capacity: usize,
    /// Upper bound on one provider code exchange.
    pub provider_timeout: Duration,
    pub github: GitHubConfig,
    pub wechat: WeChatConfig,
    /// Access token for a root account created at startup.
    pub bootstrap_root_token: Option<String>,
    /// Login password for the same root account.
    pub bootstrap_root_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            password_login_enabled: true,
            register_enabled: true,
            session_ttl: Duration::from_secs(30 * 24 * 3600),
            session_cookie_secure: false,
            status_cache_ttl: Duration::from_secs(60),
            status_cache_capacity: 10_000,
            provider_timeout: Duration::from_secs(5),
            github: GitHubConfig::default(),
            wechat: WeChatConfig::default(),
            bootstrap_root_token: None,
            bootstrap_root_password: None,
        }
    }
}

/// Longest idle expiry handed to the cookie layer
const MAX_SESSION_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let port: u16 = env_parse("PORT").unwrap_or(defaults.listen_addr.port());
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let secs = |name: &str, default: Duration| {
            env_parse::<u64>(name)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Ok(Self {
            listen_addr,
            password_login_enabled: env_bool(
                "PASSWORD_LOGIN_ENABLED",
                defaults.password_login_enabled,
            ),
            register_enabled: env_bool("REGISTER_ENABLED", defaults.register_enabled),
            session_ttl: secs("SESSION_TTL_SECS", defaults.session_ttl),
            session_cookie_secure: env_bool(
                "SESSION_COOKIE_SECURE",
                defaults.session_cookie_secure,
            ),
            status_cache_ttl: secs("STATUS_CACHE_TTL_SECS", defaults.status_cache_ttl),
            status_cache_capacity: env_parse("STATUS_CACHE_CAPACITY")
                .unwrap_or(defaults.status_cache_capacity),
            provider_timeout: secs("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout),
            github: GitHubConfig {
                enabled: env_bool("GITHUB_OAUTH_ENABLED", false),
                client_id: std::env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
                client_secret: std::env::var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            },
            wechat: WeChatConfig {
                enabled: env_bool("WECHAT_AUTH_ENABLED", false),
                server_address: std::env::var("WECHAT_SERVER_ADDRESS").unwrap_or_default(),
                server_token: std::env::var("WECHAT_SERVER_TOKEN").unwrap_or_default(),
            },
            bootstrap_root_token: std::env::var("BOOTSTRAP_ROOT_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            bootstrap_root_password: std::env::var("BOOTSTRAP_ROOT_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
        })
    }

    /// Cookie-backed session layer over `store`
    pub fn session_layer<S: SessionStore + Clone>(&self, store: S) -> SessionManagerLayer<S> {
        let idle = self.session_ttl.min(MAX_SESSION_TTL).as_secs() as i64;
        SessionManagerLayer::new(store)
            .with_name(SESSION_COOKIE)
            .with_http_only(true)
            .with_same_site(SameSite::Lax)
            .with_secure(self.session_cookie_secure)
            .with_expiry(Expiry::OnInactivity(CookieDuration::seconds(idle)))
    }

    /// Subset read by the linking protocol
    pub fn linker_config(&self) -> LinkerConfig {
        LinkerConfig {
            register_enabled: self.register_enabled,
            exchange_timeout: self.provider_timeout,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<dyn AccountStore>,
    pub status_cache: Arc<AccountStatusCache>,
    pub resolver: Arc<CredentialResolver>,
    pub api_keys: Arc<ApiKeyAuthenticator>,
    pub linker: Arc<OAuthLinker>,
    pub password_login: Arc<PasswordLogin>,
    pub manager: Arc<AccountManager>,
    pub catalog: Arc<dyn MessageCatalog>,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<dyn TokenStore>,
        catalog: Arc<dyn MessageCatalog>,
        providers: Vec<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let status_cache = Arc::new(AccountStatusCache::new(
            accounts.clone(),
            config.status_cache_capacity,
            config.status_cache_ttl,
        ));

        let linker = providers.into_iter().fold(
            OAuthLinker::new(accounts.clone(), config.linker_config()),
            |linker, provider| linker.with_provider(provider),
        );

        Self {
            resolver: Arc::new(CredentialResolver::new(
                accounts.clone(),
                status_cache.clone(),
            )),
            api_keys: Arc::new(ApiKeyAuthenticator::new(tokens, status_cache.clone())),
            manager: Arc::new(AccountManager::new(accounts.clone(), status_cache.clone())),
            linker: Arc::new(linker),
            password_login: Arc::new(PasswordLogin::new(
                accounts.clone(),
                config.password_login_enabled,
            )),
            config: Arc::new(config),
            accounts,
            status_cache,
            catalog,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_telemetry(&telemetry).context("failed to install tracing subscriber")?;

    info!(
        "Starting {} v{}",
        telemetry.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Password login enabled: {}", config.password_login_enabled);
    info!("  Registration enabled: {}", config.register_enabled);
    info!("  GitHub OAuth enabled: {}", config.github.enabled);
    info!("  WeChat auth enabled: {}", config.wechat.enabled);

    let providers: Vec<Arc<dyn IdentityProvider>> = vec![
        Arc::new(
            GitHubProvider::new(
                config.github.client_id.clone(),
                config.github.client_secret.clone(),
                config.github.enabled,
                config.provider_timeout,
            )
            .context("failed to build GitHub client")?,
        ),
        Arc::new(
            WeChatProvider::new(
                config.wechat.server_address.clone(),
                config.wechat.server_token.clone(),
                config.wechat.enabled,
                config.provider_timeout,
            )
            .context("failed to build WeChat client")?,
        ),
    ];

    let accounts = Arc::new(InMemoryAccountStore::new());
    if config.bootstrap_root_token.is_some() || config.bootstrap_root_password.is_some() {
        let root = Account {
            id: AccountId(1),
            username: "root".to_string(),
            display_name: "Root User".to_string(),
            email: None,
            role: Role::Root,
            status: AccountStatus::Enabled,
            github_id: None,
            wechat_id: None,
            access_token: config.bootstrap_root_token.clone(),
        };
        accounts.put(root).await?;
        if let Some(password) = &config.bootstrap_root_password {
            accounts.set_password(AccountId(1), password).await?;
        }
        info!("Bootstrap root account is configured");
    } else {
        warn!("No BOOTSTRAP_ROOT_ACCESS_TOKEN or BOOTSTRAP_ROOT_PASSWORD set; no administrator can sign in");
    }

    let catalog = Arc::new(StaticCatalog::embedded().context("invalid message catalog")?);
    let listen_addr = config.listen_addr;

    let state = AppState::new(
        config,
        accounts,
        Arc::new(InMemoryTokenStore::new()),
        catalog,
        providers,
    );

    let app = build_router(state, MemoryStore::default(), cors_layer_from_env()?);

    info!("Starting HTTP server on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    info!("keygate is ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Router with sessions over `sessions`, tracing and optional CORS applied
pub fn build_router<S>(state: AppState, sessions: S, cors: Option<CorsLayer>) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = state.config.session_layer(sessions);
    let mut router = crate::api::router(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors {
        router = router.layer(cors_layer);
    }

    router
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT_LANGUAGE,
            ]),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 3000);
        assert!(config.register_enabled);
        assert!(config.password_login_enabled);
        assert!(!config.session_cookie_secure);
        assert_eq!(config.provider_timeout, Duration::from_secs(5));
        assert_eq!(config.session_ttl, Duration::from_secs(2_592_000));
        assert!(!config.github.enabled);
    }

    #[test]
    fn test_linker_config_subset() {
        let config = Config {
            register_enabled: false,
            provider_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let linker = config.linker_config();
        assert!(!linker.register_enabled);
        assert_eq!(linker.exchange_timeout, Duration::from_secs(2));
    }
}
