//! WeChat login through a companion WeChat server
//!
//! The companion server answers `GET {address}/api/wechat/user?code=...`
//! with `{success, message, data}` where `data` is the user's open id.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{IdentityProvider, ProviderError};
use crate::domain::{ExternalIdentity, Provider};

#[derive(Debug, Deserialize)]
struct WeChatUserResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

impl WeChatUserResponse {
    fn into_open_id(self) -> Result<String, ProviderError> {
        if !self.success {
            return Err(ProviderError::Rejected(self.message));
        }
        if self.data.is_empty() {
            return Err(ProviderError::Rejected(
                "code invalid or expired".to_string(),
            ));
        }
        Ok(self.data)
    }
}

pub struct WeChatProvider {
    client: reqwest::Client,
    server_address: String,
    server_token: String,
    enabled: bool,
}

impl WeChatProvider {
    pub fn new(
        server_address: impl Into<String>,
        server_token: impl Into<String>,
        enabled: bool,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server_address: server_address.into().trim_end_matches('/').to_string(),
            server_token: server_token.into(),
            enabled,
        })
    }
}

#[async_trait]
impl IdentityProvider for WeChatProvider {
    fn provider(&self) -> Provider {
        Provider::WeChat
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let response: WeChatUserResponse = self
            .client
            .get(format!("{}/api/wechat/user", self.server_address))
            .query(&[("code", code)])
            .header(reqwest::header::AUTHORIZATION, &self.server_token)
            .send()
            .await?
            .json()
            .await?;

        let open_id = response.into_open_id()?;
        Ok(ExternalIdentity::new(Provider::WeChat, open_id))
    }
}
