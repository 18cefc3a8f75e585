//! GitHub OAuth code exchange

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{IdentityProvider, ProviderError};
use crate::domain::{ExternalIdentity, Provider};

const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    #[serde(default)]
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Exchanges GitHub OAuth codes for the user's login
pub struct GitHubProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    enabled: bool,
}

impl GitHubProvider {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        enabled: bool,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            enabled,
        })
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let token: AccessTokenResponse = self
            .client
            .post(ACCESS_TOKEN_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await?
            .json()
            .await?;

        if token.access_token.is_empty() {
            return Err(ProviderError::Rejected(
                token
                    .error_description
                    .unwrap_or_else(|| "code invalid or expired".to_string()),
            ));
        }

        let response = self
            .client
            .get(USER_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Unreachable(format!(
                "GitHub user endpoint returned {}",
                response.status()
            )));
        }
        let user: GitHubUser = response.json().await?;

        if user.login.is_empty() {
            return Err(ProviderError::Malformed("user login is empty".to_string()));
        }

        let mut identity = ExternalIdentity::new(Provider::GitHub, user.login);
        if let Some(name) = user.name.filter(|n| !n.is_empty()) {
            identity = identity.with_display_name(name);
        }
        if let Some(email) = user.email.filter(|e| !e.is_empty()) {
            identity = identity.with_email(email);
        }
        Ok(identity)
    }
}
