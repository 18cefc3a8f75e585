//! Shared request and response types for REST API handlers.

use serde::{Deserialize, Serialize};

use crate::auth::{IdentityContext, ManageAction};
use crate::domain::{Account, AccountId, AccountStatus, Role};

/// Success envelope used by every handler
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Query of a provider redirect
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

/// Body of `POST /api/user/manage`
#[derive(Debug, Deserialize)]
pub struct ManageRequest {
    pub username: String,
    pub action: ManageAction,
}

/// Result of a management action
#[derive(Debug, Serialize)]
pub struct ManageResponse {
    pub action: ManageAction,
    pub account: Account,
}

/// `GET /api/user/self`
#[derive(Debug, Serialize)]
pub struct SelfResponse {
    pub identity: IdentityContext,
    pub account: Account,
}

/// Body of `POST /api/user/login`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// The account fields a login response reveals
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: AccountId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub status: AccountStatus,
}

impl From<&Account> for LoginUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            status: account.status,
        }
    }
}

/// `GET /api/user/session`
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
}
