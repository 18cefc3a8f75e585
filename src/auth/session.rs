//! Session lifecycle
//!
//! Sessions are stored and addressed by `tower-sessions`; the cookie is set
//! by its [`SessionManagerLayer`](tower_sessions::SessionManagerLayer).
//! Handlers wrap the request's [`Session`] in an [`AuthSession`] and pass it
//! explicitly into the resolver and the linking protocol.
//!
//! Claims written on login:
//!
//! | key           | value                          |
//! |---------------|--------------------------------|
//! | `id`          | account id                     |
//! | `username`    | username                       |
//! | `role`        | role tier (1, 10, 100)         |
//! | `status`      | account status (1, 2)          |
//! | `oauth_state` | single-use CSRF nonce          |

use serde_json::Value;
use tower_sessions::session::{Error as SessionStoreError, Id};
use tower_sessions::Session;
use tracing::error;

use crate::domain::{Account, AccountId, AccountStatus, Role};

pub const CLAIM_ID: &str = "id";
pub const CLAIM_USERNAME: &str = "username";
pub const CLAIM_ROLE: &str = "role";
pub const CLAIM_STATUS: &str = "status";
pub const CLAIM_OAUTH_STATE: &str = "oauth_state";

const IDENTITY_CLAIMS: [&str; 4] = [CLAIM_ID, CLAIM_USERNAME, CLAIM_ROLE, CLAIM_STATUS];

/// Session store failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session write failed: {0}")]
    WriteFailed(String),
}

impl SessionError {
    fn read(err: SessionStoreError) -> Self {
        SessionError::Unavailable(err.to_string())
    }

    fn write(err: SessionStoreError) -> Self {
        SessionError::WriteFailed(err.to_string())
    }
}

/// Identity claims held by an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub account_id: AccountId,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
}

/// Identity view over one request's session
#[derive(Debug, Clone)]
pub struct AuthSession {
    inner: Session,
}

impl AuthSession {
    pub fn new(inner: Session) -> Self {
        Self { inner }
    }

    /// Current session id, `None` until the session is first saved
    pub fn id(&self) -> Option<Id> {
        self.inner.id()
    }

    async fn value(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.inner.get_value(key).await.map_err(SessionError::read)
    }

    async fn save(&self) -> Result<(), SessionError> {
        self.inner.save().await.map_err(|e| {
            error!(error = %e, "Failed to persist session");
            SessionError::write(e)
        })
    }

    /// Rotate the session id, write the identity claims for `account` and save.
    ///
    /// The id held before login stops naming this session. On failure the
    /// claims are stripped again so nothing half-written is persisted later.
    pub async fn establish(&self, account: &Account) -> Result<(), SessionError> {
        self.inner.cycle_id().await.map_err(SessionError::write)?;

        let written = async {
            self.inner.insert(CLAIM_ID, account.id.as_i64()).await?;
            self.inner
                .insert(CLAIM_USERNAME, account.username.as_str())
                .await?;
            self.inner.insert(CLAIM_ROLE, account.role.as_i64()).await?;
            self.inner
                .insert(CLAIM_STATUS, account.status.as_i64())
                .await
        }
        .await
        .map_err(SessionError::write);

        let result = match written {
            Ok(()) => self.save().await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            for key in IDENTITY_CLAIMS {
                // The record is already loaded, so removal cannot hit the store
                let _ = self.inner.remove_value(key).await;
            }
        }
        result
    }

    /// Delete the session and everything in it. Idempotent.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.inner.flush().await.map_err(SessionError::write)
    }

    /// Current identity claims, `None` if absent or incomplete
    pub async fn read_claims(&self) -> Result<Option<SessionClaims>, SessionError> {
        let Some(account_id) = self.account_id().await? else {
            return Ok(None);
        };
        let username = self.value(CLAIM_USERNAME).await?;
        let role = self.value(CLAIM_ROLE).await?;
        let status = self.value(CLAIM_STATUS).await?;

        let claims = (|| {
            Some(SessionClaims {
                account_id,
                username: username?.as_str()?.to_string(),
                role: Role::from_i64(role?.as_i64()?)?,
                status: AccountStatus::from_i64(status?.as_i64()?)?,
            })
        })();
        Ok(claims)
    }

    /// Account id claim alone (used by the permissive resolver)
    pub async fn account_id(&self) -> Result<Option<AccountId>, SessionError> {
        Ok(self
            .value(CLAIM_ID)
            .await?
            .and_then(|v| v.as_i64())
            .map(AccountId))
    }

    /// Store a pending OAuth nonce and save
    pub async fn set_oauth_state(&self, nonce: &str) -> Result<(), SessionError> {
        self.inner
            .insert(CLAIM_OAUTH_STATE, nonce)
            .await
            .map_err(SessionError::write)?;
        self.save().await
    }

    /// Remove and return the pending OAuth nonce, saving the removal
    pub async fn take_oauth_state(&self) -> Result<Option<String>, SessionError> {
        let nonce = self
            .inner
            .remove_value(CLAIM_OAUTH_STATE)
            .await
            .map_err(SessionError::read)?;
        self.save().await?;

        Ok(match nonce {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        })
    }
}
