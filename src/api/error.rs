//! Structured API error responses with error codes
//!
//! Every failure leaves the gateway as
//! `{"error": {"code", "numeric_code", "message", "details"?}}` with the code
//! repeated in an `x-error-code` header. Messages are localized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::AuthError;
use crate::i18n::MessageCatalog;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Credential errors (1xxx)
    /// No credential presented
    AuthRequired,
    /// Access token matches no account
    InvalidAccessToken,
    /// API token unknown, disabled, expired or exhausted
    InvalidToken,
    /// Account is disabled
    AccountDisabled,
    /// Account is banned from logging in
    AccountBanned,
    /// Role too low for the route or action
    InsufficientPermissions,
    /// Channel override on a non-admin token
    ChannelOverrideForbidden,
    /// Username/password login switched off
    PasswordLoginDisabled,
    /// Username or password wrong
    InvalidCredentials,

    // External identity errors (2xxx)
    /// OAuth state missing or not matching
    StateMismatch,
    /// Self-registration is closed
    RegistrationClosed,
    /// External identity already held by an account
    AlreadyBound,
    /// Provider switched off
    ProviderDisabled,
    /// Provider could not be reached
    ProviderUnreachable,
    /// Provider answered with something unusable
    MalformedProviderResponse,
    /// Provider refused the code
    ProviderRejected,

    // Validation errors (3xxx)
    /// A parameter is missing or invalid
    InvalidParams,
    /// Request body is malformed
    InvalidRequestBody,

    // Resource errors (4xxx)
    /// Account not found
    AccountNotFound,
    /// Route or resource not found
    ResourceNotFound,

    // Conflict errors (5xxx)
    /// Generated access token already in use
    AccessTokenCollision,

    // Infrastructure errors (8xxx)
    /// Session could not be persisted
    SessionError,
    /// Storage collaborator failed
    StorageError,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::AuthRequired => 1001,
            ErrorCode::InvalidAccessToken => 1002,
            ErrorCode::InvalidToken => 1003,
            ErrorCode::AccountDisabled => 1004,
            ErrorCode::AccountBanned => 1005,
            ErrorCode::InsufficientPermissions => 1006,
            ErrorCode::ChannelOverrideForbidden => 1007,
            ErrorCode::PasswordLoginDisabled => 1008,
            ErrorCode::InvalidCredentials => 1009,

            ErrorCode::StateMismatch => 2001,
            ErrorCode::RegistrationClosed => 2002,
            ErrorCode::AlreadyBound => 2003,
            ErrorCode::ProviderDisabled => 2004,
            ErrorCode::ProviderUnreachable => 2005,
            ErrorCode::MalformedProviderResponse => 2006,
            ErrorCode::ProviderRejected => 2007,

            ErrorCode::InvalidParams => 3001,
            ErrorCode::InvalidRequestBody => 3002,

            ErrorCode::AccountNotFound => 4001,
            ErrorCode::ResourceNotFound => 4002,

            ErrorCode::AccessTokenCollision => 5001,

            ErrorCode::SessionError => 8001,
            ErrorCode::StorageError => 8002,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired
            | ErrorCode::InvalidAccessToken
            | ErrorCode::InvalidToken
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,

            ErrorCode::AccountDisabled
            | ErrorCode::AccountBanned
            | ErrorCode::InsufficientPermissions
            | ErrorCode::ChannelOverrideForbidden
            | ErrorCode::PasswordLoginDisabled
            | ErrorCode::StateMismatch
            | ErrorCode::RegistrationClosed
            | ErrorCode::ProviderDisabled => StatusCode::FORBIDDEN,

            ErrorCode::ProviderUnreachable | ErrorCode::MalformedProviderResponse => {
                StatusCode::BAD_GATEWAY
            }

            ErrorCode::ProviderRejected
            | ErrorCode::InvalidParams
            | ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,

            ErrorCode::AccountNotFound | ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::AlreadyBound | ErrorCode::AccessTokenCollision => StatusCode::CONFLICT,

            ErrorCode::SessionError | ErrorCode::StorageError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Code for an auth failure
    pub fn for_auth(err: &AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => ErrorCode::AuthRequired,
            AuthError::InvalidAccessToken => ErrorCode::InvalidAccessToken,
            AuthError::UnknownOrInvalidToken => ErrorCode::InvalidToken,
            AuthError::AccountDisabled => ErrorCode::AccountDisabled,
            AuthError::AccountBanned => ErrorCode::AccountBanned,
            AuthError::PasswordLoginDisabled => ErrorCode::PasswordLoginDisabled,
            AuthError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AuthError::InsufficientRole { .. } | AuthError::Denied(_) => {
                ErrorCode::InsufficientPermissions
            }
            AuthError::InsufficientRoleForChannelOverride => ErrorCode::ChannelOverrideForbidden,
            AuthError::StateMismatch => ErrorCode::StateMismatch,
            AuthError::RegistrationClosed => ErrorCode::RegistrationClosed,
            AuthError::AlreadyBound => ErrorCode::AlreadyBound,
            AuthError::ProviderDisabled(_) => ErrorCode::ProviderDisabled,
            AuthError::ProviderUnreachable(_) => ErrorCode::ProviderUnreachable,
            AuthError::MalformedProviderResponse(_) => ErrorCode::MalformedProviderResponse,
            AuthError::ProviderRejected(_) => ErrorCode::ProviderRejected,
            AuthError::InvalidParams(_) => ErrorCode::InvalidParams,
            AuthError::SessionPersist(_) => ErrorCode::SessionError,
            AuthError::AccountNotFound => ErrorCode::AccountNotFound,
            AuthError::AccessTokenCollision => ErrorCode::AccessTokenCollision,
            AuthError::Storage(_) => ErrorCode::StorageError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::AccountDisabled => "ACCOUNT_DISABLED",
            ErrorCode::AccountBanned => "ACCOUNT_BANNED",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::ChannelOverrideForbidden => "CHANNEL_OVERRIDE_FORBIDDEN",
            ErrorCode::PasswordLoginDisabled => "PASSWORD_LOGIN_DISABLED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::StateMismatch => "STATE_MISMATCH",
            ErrorCode::RegistrationClosed => "REGISTRATION_CLOSED",
            ErrorCode::AlreadyBound => "ALREADY_BOUND",
            ErrorCode::ProviderDisabled => "PROVIDER_DISABLED",
            ErrorCode::ProviderUnreachable => "PROVIDER_UNREACHABLE",
            ErrorCode::MalformedProviderResponse => "MALFORMED_PROVIDER_RESPONSE",
            ErrorCode::ProviderRejected => "PROVIDER_REJECTED",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::AccessTokenCollision => "ACCESS_TOKEN_COLLISION",
            ErrorCode::SessionError => "SESSION_ERROR",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable, localized message
    pub message: String,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }

    /// Build the response for an auth failure in the caller's language.
    ///
    /// Infrastructure faults are logged here; routine denials are not.
    pub fn from_auth(err: &AuthError, catalog: &dyn MessageCatalog, lang: &str) -> Self {
        if err.is_infrastructure() {
            error!(error = %err, "Infrastructure failure during authentication");
        }

        let api_error = ApiError::new(
            ErrorCode::for_auth(err),
            catalog.message(err.message_key(), lang),
        );

        match err {
            AuthError::InsufficientRole { required, actual } => {
                api_error.with_details(serde_json::json!({
                    "required_role": required,
                    "actual_role": actual,
                }))
            }
            AuthError::Denied(_) => api_error.with_details(serde_json::json!({
                "reason": err.message_key(),
            })),
            _ => api_error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

/// Unlocalized conversion; the message is the error's own description
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(ErrorCode::for_auth(&err), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RoleDenied;
    use crate::domain::Role;
    use crate::i18n::StaticCatalog;
    use crate::infra::StoreError;

    #[test]
    fn test_error_code_numeric() {
        assert_eq!(ErrorCode::AuthRequired.numeric_code(), 1001);
        assert_eq!(ErrorCode::StateMismatch.numeric_code(), 2001);
        assert_eq!(ErrorCode::InvalidParams.numeric_code(), 3001);
        assert_eq!(ErrorCode::AccountNotFound.numeric_code(), 4001);
        assert_eq!(ErrorCode::AccessTokenCollision.numeric_code(), 5001);
        assert_eq!(ErrorCode::InternalError.numeric_code(), 8999);
    }

    #[test]
    fn test_auth_error_status() {
        let cases = [
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::UnknownOrInvalidToken, StatusCode::UNAUTHORIZED),
            (AuthError::AccountDisabled, StatusCode::FORBIDDEN),
            (AuthError::StateMismatch, StatusCode::FORBIDDEN),
            (AuthError::AlreadyBound, StatusCode::CONFLICT),
            (
                AuthError::ProviderUnreachable("dns".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AuthError::Storage(StoreError::Unavailable("db".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_localized_message() {
        let catalog = StaticCatalog::embedded().unwrap();
        let err = ApiError::from_auth(&AuthError::AccountBanned, &catalog, "zh");
        assert_eq!(err.error.message, "用户已被封禁");
        assert_eq!(err.error.code, ErrorCode::AccountBanned);
    }

    #[test]
    fn test_denial_details() {
        let catalog = StaticCatalog::embedded().unwrap();
        let err = ApiError::from_auth(
            &AuthError::Denied(RoleDenied::CannotDisableRoot),
            &catalog,
            "en",
        );
        assert_eq!(err.error.details.unwrap()["reason"], "cannot_disable_root");

        let err = ApiError::from_auth(
            &AuthError::InsufficientRole {
                required: Role::Admin,
                actual: Role::Common,
            },
            &catalog,
            "en",
        );
        let details = err.error.details.unwrap();
        assert_eq!(details["required_role"], 10);
        assert_eq!(details["actual_role"], 1);
    }

    #[test]
    fn test_error_header() {
        let response = ApiError::new(ErrorCode::StateMismatch, "nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("x-error-code").unwrap(),
            "STATE_MISMATCH"
        );
    }
}
