//! Trait definitions for the persistence collaborators keygate depends on

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{Account, AccountId, ApiToken, NewAccount, Provider};

use super::Result;

/// Account persistence.
///
/// Implementations must reject writes that would give two accounts the same
/// username, external id or access token with [`super::StoreError::Conflict`].
/// The linking protocol checks before writing; this is the backstop for the
/// race between check and write.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get account by id
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Get account by username
    async fn get_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Get the account holding `(provider, provider_user_id)`
    async fn get_by_external_id(
        &self,
        provider: Provider,
        provider_user_id: &str,
    ) -> Result<Option<Account>>;

    /// Get the account whose access token equals `token`
    async fn get_by_access_token(&self, token: &str) -> Result<Option<Account>>;

    /// The account named `username` if `password` matches its stored hash.
    /// Unknown usernames and wrong passwords both yield `None`.
    async fn verify_password(&self, username: &str, password: &str) -> Result<Option<Account>>;

    /// Highest id assigned so far (0 when empty)
    async fn max_id(&self) -> Result<AccountId>;

    /// Insert a new account, returning it with its assigned id
    async fn insert(&self, account: NewAccount) -> Result<Account>;

    /// Replace the stored record for `account.id`
    async fn update(&self, account: &Account) -> Result<()>;

    /// Delete an account
    async fn delete(&self, id: AccountId) -> Result<()>;
}

/// API token persistence (read path only)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Get an API token by its secret
    async fn get_by_secret(&self, secret: &str) -> Result<Option<ApiToken>>;
}
