//! API key authentication for machine clients
//!
//! Keys are formatted as `sk-<secret>` or `sk-<secret>-<channel>`. The
//! optional trailing segment is a channel-override hint passed through to
//! request routing; only tokens owned by an admin or root may carry one.
//!
//! Clients that cannot set `Authorization` (or send the legacy marker value
//! in it) present the key in the alternate header instead.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::{AuthError, CredentialKind, IdentityContext, TokenMetadata};
use crate::domain::Role;
use crate::infra::{AccountStatusCache, TokenStore};

/// Authorization scheme stripped from either header
pub const BEARER_PREFIX: &str = "Bearer ";

/// Credential scheme prefix
pub const API_KEY_PREFIX: &str = "sk-";

/// Fallback header for clients using the legacy marker
pub const ALTERNATE_KEY_HEADER: &str = "mj-api-secret";

/// `Authorization` value that redirects lookup to the alternate header
pub const LEGACY_MARKER: &str = "midjourney-proxy";

/// Secret and optional routing hint extracted from a raw key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedApiKey {
    pub secret: String,
    pub channel_override: Option<String>,
}

/// Parse the credential from the primary and alternate header values.
///
/// Never fails; an unusable credential yields an empty secret.
pub fn parse_api_key(primary: Option<&str>, alternate: Option<&str>) -> ParsedApiKey {
    let mut key = strip_bearer(primary.unwrap_or_default());
    if key.is_empty() || key == LEGACY_MARKER {
        key = strip_bearer(alternate.unwrap_or_default());
    }

    let key = key.strip_prefix(API_KEY_PREFIX).unwrap_or(key);

    let mut parts = key.split('-');
    let secret = parts.next().unwrap_or_default().to_string();
    let channel_override = parts
        .next()
        .filter(|hint| !hint.is_empty())
        .map(str::to_string);

    ParsedApiKey {
        secret,
        channel_override,
    }
}

fn strip_bearer(value: &str) -> &str {
    value.strip_prefix(BEARER_PREFIX).unwrap_or(value)
}

/// Validates API keys against token records and owner status
pub struct ApiKeyAuthenticator {
    tokens: Arc<dyn TokenStore>,
    status: Arc<AccountStatusCache>,
}

impl ApiKeyAuthenticator {
    pub fn new(tokens: Arc<dyn TokenStore>, status: Arc<AccountStatusCache>) -> Self {
        Self { tokens, status }
    }

    /// Authenticate a request from its raw header values
    pub async fn authenticate(
        &self,
        primary: Option<&str>,
        alternate: Option<&str>,
    ) -> Result<IdentityContext, AuthError> {
        let parsed = parse_api_key(primary, alternate);
        self.authenticate_parsed(parsed).await
    }

    pub async fn authenticate_parsed(
        &self,
        parsed: ParsedApiKey,
    ) -> Result<IdentityContext, AuthError> {
        if parsed.secret.is_empty() {
            return Err(AuthError::UnknownOrInvalidToken);
        }

        let token = self
            .tokens
            .get_by_secret(&parsed.secret)
            .await?
            .ok_or(AuthError::UnknownOrInvalidToken)?;

        let validity = token.validity_at(Utc::now());
        if !validity.is_valid() {
            debug!(token_id = token.id, ?validity, "Rejected API token");
            return Err(AuthError::UnknownOrInvalidToken);
        }

        let owner = self
            .status
            .snapshot(token.account_id)
            .await?
            .ok_or(AuthError::UnknownOrInvalidToken)?;

        if !owner.status.is_enabled() {
            debug!(account_id = %token.account_id, "API token owner is disabled");
            return Err(AuthError::AccountDisabled);
        }

        if parsed.channel_override.is_some() && !owner.role.satisfies(Role::Admin) {
            debug!(
                account_id = %token.account_id,
                role = %owner.role,
                "Channel override refused for non-admin token"
            );
            return Err(AuthError::InsufficientRoleForChannelOverride);
        }

        let metadata = TokenMetadata {
            token_id: token.id,
            token_name: token.name.clone(),
            unlimited_quota: token.unlimited_quota,
            remaining_quota: (!token.unlimited_quota).then_some(token.remaining_quota),
            model_limits: token.model_limit_set(),
            channel_override: parsed.channel_override,
        };

        Ok(IdentityContext {
            account_id: token.account_id,
            role: owner.role,
            status: owner.status,
            credential: CredentialKind::ApiKey,
            token: Some(metadata),
        })
    }
}
