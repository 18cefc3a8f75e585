//! Authentication and authorization for keygate
//!
//! Every inbound call is resolved to an [`IdentityContext`] by one of two
//! gates, both feeding the same role hierarchy guard:
//!
//! - **Credential resolver**: browser/admin traffic. Session claims first,
//!   then an opaque per-account access token.
//! - **API key authenticator**: machine traffic. `sk-<secret>[-<channel>]`
//!   keys mapped to API token records.
//!
//! Sessions are opened by a username/password login ([`PasswordLogin`]) or
//! by the external identity linking protocol ([`oauth`]); both end in the
//! same [`AuthSession::establish`].
//!
//! # Configuration
//!
//! - `PASSWORD_LOGIN_ENABLED`: allow username/password logins
//! - `REGISTER_ENABLED`: allow first-time external logins to provision accounts
//! - `GITHUB_OAUTH_ENABLED` / `WECHAT_AUTH_ENABLED`: per-provider switches

mod api_key;
mod manage;
mod middleware;
pub mod oauth;
mod password;
mod resolver;
pub mod role;
pub mod session;

pub use api_key::*;
pub use manage::*;
pub use middleware::*;
pub use resolver::*;
pub use role::{ManageAction, RoleDenied};
pub use password::*;
pub use session::{AuthSession, SessionClaims, SessionError};

use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::{AccountId, AccountStatus, Role};
use crate::infra::StoreError;

use oauth::ProviderError;

/// Which credential produced an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Session,
    AccessToken,
    ApiKey,
}

/// Token details attached to API-key identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub token_id: i64,

    pub token_name: String,

    pub unlimited_quota: bool,

    /// Present only for quota-limited tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<i64>,

    /// Present only when the token enables per-model limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_limits: Option<BTreeSet<String>>,

    /// Routing hint for the channel selector, validated only for privilege
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_override: Option<String>,
}

/// Resolved caller for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityContext {
    pub account_id: AccountId,

    pub role: Role,

    pub status: AccountStatus,

    pub credential: CredentialKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenMetadata>,
}

/// Authentication and authorization failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("no credential presented")]
    Unauthenticated,

    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("unknown or invalid API token")]
    UnknownOrInvalidToken,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("account is banned")]
    AccountBanned,

    #[error("password login is disabled")]
    PasswordLoginDisabled,

    #[error("username or password is wrong")]
    InvalidCredentials,

    #[error("role {actual} does not meet required {required}")]
    InsufficientRole { required: Role, actual: Role },

    #[error("channel override requires an admin-owned token")]
    InsufficientRoleForChannelOverride,

    #[error("oauth state mismatch")]
    StateMismatch,

    #[error("self-registration is disabled")]
    RegistrationClosed,

    #[error("external identity is already bound to an account")]
    AlreadyBound,

    #[error("identity provider {0} is not enabled")]
    ProviderDisabled(String),

    #[error("identity provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("malformed identity provider response: {0}")]
    MalformedProviderResponse(String),

    #[error("identity provider rejected the code: {0}")]
    ProviderRejected(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("failed to persist session: {0}")]
    SessionPersist(#[from] SessionError),

    #[error("account not found")]
    AccountNotFound,

    #[error("permission denied: {0}")]
    Denied(#[from] RoleDenied),

    #[error("generated access token collides with an existing one")]
    AccessTokenCollision,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(msg) => AuthError::ProviderUnreachable(msg),
            ProviderError::TimedOut => {
                AuthError::ProviderUnreachable("exchange timed out".to_string())
            }
            ProviderError::Malformed(msg) => AuthError::MalformedProviderResponse(msg),
            ProviderError::Rejected(msg) => AuthError::ProviderRejected(msg),
        }
    }
}

impl AuthError {
    /// Message catalog key for user-facing text
    pub fn message_key(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "not_logged_in",
            AuthError::InvalidAccessToken => "invalid_access_token",
            AuthError::UnknownOrInvalidToken => "invalid_token",
            AuthError::AccountDisabled => "user_disabled",
            AuthError::AccountBanned => "user_banned",
            AuthError::PasswordLoginDisabled => "password_login_disabled",
            AuthError::InvalidCredentials => "username_or_password_error",
            AuthError::InsufficientRole { .. } => "no_permission",
            AuthError::InsufficientRoleForChannelOverride => "channel_override_forbidden",
            AuthError::StateMismatch => "state_mismatch",
            AuthError::RegistrationClosed => "registration_disabled",
            AuthError::AlreadyBound => "account_already_bound",
            AuthError::ProviderDisabled(_) => "provider_not_enabled",
            AuthError::ProviderUnreachable(_) => "provider_unreachable",
            AuthError::MalformedProviderResponse(_) => "provider_malformed_response",
            AuthError::ProviderRejected(_) => "code_invalid_or_expired",
            AuthError::InvalidParams(_) => "invalid_param",
            AuthError::SessionPersist(_) => "session_save_failed",
            AuthError::AccountNotFound => "user_not_found",
            AuthError::Denied(denied) => match denied {
                RoleDenied::NoPermission => "no_permission",
                RoleDenied::CannotGrantRole => "cannot_grant_role",
                RoleDenied::CannotDisableRoot => "cannot_disable_root",
                RoleDenied::CannotDeleteRoot => "cannot_delete_root",
                RoleDenied::CannotDemoteRoot => "cannot_demote_root",
                RoleDenied::CannotPromote => "only_root_can_promote",
                RoleDenied::UserAlreadyAdmin => "user_already_admin",
                RoleDenied::UserAlreadyCommon => "user_already_common",
                RoleDenied::RootCannotDeleteSelf => "root_cannot_delete_self",
            },
            AuthError::AccessTokenCollision => "access_token_collision",
            AuthError::Storage(_) => "internal_error",
        }
    }

    /// Faults of the session store or storage collaborator, logged for operators.
    /// Everything else is a routine outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthError::SessionPersist(_) | AuthError::Storage(_))
    }
}
