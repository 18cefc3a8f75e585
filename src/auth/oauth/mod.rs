//! External identity linking
//!
//! One protocol for every provider:
//!
//! 1. `issue_state` stores a random nonce in the caller's session.
//! 2. The provider redirects back with `code` and `state`.
//! 3. `handle_callback` consumes the nonce (single use, whatever the
//!    outcome), exchanges the code for an [`ExternalIdentity`], then either
//!    logs in (finding or provisioning the local account) or, when the
//!    session already names an account, binds the identity to it.
//!
//! Providers only implement the wire exchange ([`IdentityProvider`]).
//! Check-then-write on an external identity is serialized per
//! `(provider, provider_user_id)` with [`KeyedLocks`]; the store's unique
//! constraint is the backstop across processes. A login that provisions an
//! account but then fails to establish the session deletes the account again.

mod github;
mod wechat;

pub use github::GitHubProvider;
pub use wechat::WeChatProvider;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::session::AuthSession;
use super::AuthError;
use crate::domain::{Account, AccountId, ExternalIdentity, NewAccount, Provider};
use crate::infra::{AccountStore, KeyedLocks, StoreError};

/// Length of the CSRF nonce
pub const STATE_LENGTH: usize = 12;

/// Attempts at picking a free synthesized username before giving up
const PROVISION_ATTEMPTS: usize = 3;

/// Failure of a provider code exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider exchange timed out")]
    TimedOut,

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider rejected the code: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::TimedOut
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

/// Provider-specific half of the linking protocol
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether logins through this provider are switched on
    fn enabled(&self) -> bool;

    /// Exchange an authorization code for the identity it asserts
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, ProviderError>;
}

/// Settings the linking protocol reads
#[derive(Debug, Clone)]
pub struct LinkerConfig {
    /// Provision accounts for unknown external identities
    pub register_enabled: bool,
    /// Upper bound on one provider exchange
    pub exchange_timeout: Duration,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            register_enabled: true,
            exchange_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a successful callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Session established for `account`
    LoggedIn { account: Account, provisioned: bool },
    /// Identity attached to the already logged-in `account`
    Bound { account: Account },
}

/// Drives the state/callback protocol across registered providers
pub struct OAuthLinker {
    accounts: Arc<dyn AccountStore>,
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
    locks: KeyedLocks<String>,
    config: LinkerConfig,
}

impl OAuthLinker {
    pub fn new(accounts: Arc<dyn AccountStore>, config: LinkerConfig) -> Self {
        Self {
            accounts,
            providers: HashMap::new(),
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Generate a nonce, store it in the session and return it
    pub async fn issue_state(&self, session: &AuthSession) -> Result<String, AuthError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect();

        session.set_oauth_state(&nonce).await?;
        Ok(nonce)
    }

    /// Handle a provider redirect carrying `code` and `state`
    pub async fn handle_callback(
        &self,
        session: &AuthSession,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<LinkOutcome, AuthError> {
        // Consume the nonce before anything else so it can never be replayed
        let expected = session.take_oauth_state().await?;

        match expected {
            Some(expected) if !state.is_empty() && expected == state => {}
            _ => {
                debug!(%provider, "OAuth state mismatch");
                return Err(AuthError::StateMismatch);
            }
        }

        let handler = self
            .providers
            .get(&provider)
            .filter(|p| p.enabled())
            .ok_or_else(|| AuthError::ProviderDisabled(provider.label().to_string()))?;

        if code.is_empty() {
            return Err(AuthError::InvalidParams("code".to_string()));
        }

        let identity = match tokio::time::timeout(
            self.config.exchange_timeout,
            handler.exchange_code(code),
        )
        .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => {
                warn!(%provider, error = %e, "Provider code exchange failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(%provider, "Provider code exchange timed out");
                return Err(ProviderError::TimedOut.into());
            }
        };

        if identity.provider_user_id.is_empty() {
            return Err(AuthError::MalformedProviderResponse(
                "empty provider user id".to_string(),
            ));
        }

        let lock_key = format!("{}:{}", provider.label(), identity.provider_user_id);
        let guard = self.locks.lock(&lock_key).await;

        let outcome = match session.read_claims().await {
            Ok(Some(claims)) => self.bind(claims.account_id, &identity).await,
            Ok(None) => self.login(session, &identity).await,
            Err(e) => Err(e.into()),
        };

        drop(guard);
        self.locks.release(&lock_key);
        outcome
    }

    async fn login(
        &self,
        session: &AuthSession,
        identity: &ExternalIdentity,
    ) -> Result<LinkOutcome, AuthError> {
        let (account, provisioned) = match self.find_holder(identity).await? {
            Some(account) => (account, false),
            None if self.config.register_enabled => self.provision(identity).await?,
            None => {
                debug!(provider = %identity.provider, "Registration closed");
                return Err(AuthError::RegistrationClosed);
            }
        };

        if !account.is_enabled() {
            debug!(account_id = %account.id, "Banned account attempted external login");
            return Err(AuthError::AccountBanned);
        }

        if let Err(e) = session.establish(&account).await {
            if provisioned {
                self.discard(&account).await;
            }
            return Err(e.into());
        }

        info!(
            account_id = %account.id,
            provider = %identity.provider,
            provisioned,
            "External login"
        );
        Ok(LinkOutcome::LoggedIn {
            account,
            provisioned,
        })
    }

    async fn bind(
        &self,
        account_id: AccountId,
        identity: &ExternalIdentity,
    ) -> Result<LinkOutcome, AuthError> {
        if self.find_holder(identity).await?.is_some() {
            return Err(AuthError::AlreadyBound);
        }

        let mut account = self
            .accounts
            .get_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        account.set_external_id(identity.provider, identity.provider_user_id.clone());

        match self.accounts.update(&account).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::AlreadyBound),
            Err(e) => return Err(e.into()),
        }

        info!(account_id = %account.id, provider = %identity.provider, "External identity bound");
        Ok(LinkOutcome::Bound { account })
    }

    /// Undo a provisioning whose login did not complete
    async fn discard(&self, account: &Account) {
        match self.accounts.delete(account.id).await {
            Ok(()) => debug!(account_id = %account.id, "Provisioned account discarded"),
            Err(e) => error!(
                account_id = %account.id,
                error = %e,
                "Failed to discard provisioned account after session failure"
            ),
        }
    }

    async fn find_holder(&self, identity: &ExternalIdentity) -> Result<Option<Account>, AuthError> {
        Ok(self
            .accounts
            .get_by_external_id(identity.provider, &identity.provider_user_id)
            .await?)
    }

    /// Insert an account for `identity`. The flag is false when another
    /// writer provisioned it first and that account is returned instead.
    async fn provision(&self, identity: &ExternalIdentity) -> Result<(Account, bool), AuthError> {
        let mut last_conflict = None;

        for _ in 0..PROVISION_ATTEMPTS {
            let next_id = self.accounts.max_id().await?.next();
            match self
                .accounts
                .insert(NewAccount::provisioned(identity, next_id))
                .await
            {
                Ok(account) => return Ok((account, true)),
                Err(StoreError::Conflict(msg)) => {
                    // Another process may have provisioned this identity meanwhile
                    if let Some(account) = self.find_holder(identity).await? {
                        return Ok((account, false));
                    }
                    last_conflict = Some(msg);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict(last_conflict.unwrap_or_default()).into())
    }
}
