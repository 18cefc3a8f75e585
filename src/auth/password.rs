//! Username/password login

use std::sync::Arc;
use tracing::{debug, info};

use super::session::AuthSession;
use super::AuthError;
use crate::domain::Account;
use crate::infra::AccountStore;

/// Verifies a username/password pair and opens a session for it
pub struct PasswordLogin {
    accounts: Arc<dyn AccountStore>,
    enabled: bool,
}

impl PasswordLogin {
    pub fn new(accounts: Arc<dyn AccountStore>, enabled: bool) -> Self {
        Self { accounts, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Check the credentials and establish `session` for the account.
    ///
    /// A wrong password and an unknown username are indistinguishable to the
    /// caller. A disabled account is refused even with the right password.
    pub async fn login(
        &self,
        session: &AuthSession,
        username: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        if !self.enabled {
            return Err(AuthError::PasswordLoginDisabled);
        }
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidParams("username, password".to_string()));
        }

        let account = self
            .accounts
            .verify_password(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.is_enabled() {
            debug!(account_id = %account.id, "Disabled account attempted password login");
            return Err(AuthError::AccountBanned);
        }

        session.establish(&account).await?;
        info!(account_id = %account.id, "Password login");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::testing::{fresh, FailingStore};
    use crate::domain::{AccountId, AccountStatus, ExternalIdentity, NewAccount, Provider};
    use crate::infra::{InMemoryAccountStore, MockAccountStore};
    use tower_sessions::{MemoryStore, Session};

    async fn store_with(username: &str, password: &str, status: AccountStatus) -> Arc<InMemoryAccountStore> {
        let store = Arc::new(InMemoryAccountStore::new());
        let mut new = NewAccount::provisioned(&ExternalIdentity::new(Provider::GitHub, "x"), AccountId(0));
        new.username = username.to_string();
        let mut account = store.insert(new).await.unwrap();
        account.status = status;
        store.update(&account).await.unwrap();
        store.set_password(account.id, password).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let store = store_with("alice", "hunter22", AccountStatus::Enabled).await;
        let login = PasswordLogin::new(store, true);
        let session = AuthSession::new(fresh(&MemoryStore::default()));

        let account = login.login(&session, "alice", "hunter22").await.unwrap();
        let claims = session.read_claims().await.unwrap().unwrap();
        assert_eq!(claims.account_id, account.id);
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_alike() {
        let store = store_with("alice", "hunter22", AccountStatus::Enabled).await;
        let login = PasswordLogin::new(store, true);
        let session = AuthSession::new(fresh(&MemoryStore::default()));

        for (user, pass) in [("alice", "hunter23"), ("mallory", "hunter22")] {
            let err = login.login(&session, user, pass).await.unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
        }
        assert!(session.read_claims().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_fields_are_invalid_params() {
        let mut accounts = MockAccountStore::new();
        accounts.expect_verify_password().never();
        let login = PasswordLogin::new(Arc::new(accounts), true);
        let session = AuthSession::new(fresh(&MemoryStore::default()));

        for (user, pass) in [("", "pw"), ("alice", ""), ("", "")] {
            let err = login.login(&session, user, pass).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidParams(_)));
        }
    }

    #[tokio::test]
    async fn test_switched_off() {
        let mut accounts = MockAccountStore::new();
        accounts.expect_verify_password().never();
        let login = PasswordLogin::new(Arc::new(accounts), false);
        let session = AuthSession::new(fresh(&MemoryStore::default()));

        let err = login.login(&session, "alice", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::PasswordLoginDisabled);
    }

    #[tokio::test]
    async fn test_disabled_account_is_refused() {
        let store = store_with("bob", "pw", AccountStatus::Disabled).await;
        let login = PasswordLogin::new(store, true);
        let session = AuthSession::new(fresh(&MemoryStore::default()));

        let err = login.login(&session, "bob", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::AccountBanned);
        assert!(session.read_claims().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_failure_surfaces() {
        let store = store_with("alice", "pw", AccountStatus::Enabled).await;
        let login = PasswordLogin::new(store, true);
        let session = AuthSession::new(Session::new(
            None,
            Arc::new(FailingStore::after_writes(0)),
            None,
        ));

        let err = login.login(&session, "alice", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::SessionPersist(_)));
        assert!(session.read_claims().await.unwrap().is_none());
    }
}
