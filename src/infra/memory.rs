//! In-memory store implementations
//!
//! Back the gateway when no external persistence is configured and serve as
//! fixtures in tests. Uniqueness is enforced the same way a database unique
//! index would: the write fails with [`StoreError::Conflict`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::domain::{Account, AccountId, ApiToken, NewAccount, Provider};

use super::password::{hash_password, verify_password};
use super::{AccountStore, Result, StoreError, TokenStore};

/// Account store over a `BTreeMap` keyed by id
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    /// Argon2 hashes by account id
    passwords: RwLock<HashMap<AccountId, String>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully formed account (fixtures and bootstrap)
    pub async fn put(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        check_unique(&accounts, &account)?;
        accounts.insert(account.id, account);
        Ok(())
    }

    /// Set the login password of an existing account
    pub async fn set_password(&self, id: AccountId, password: &str) -> Result<()> {
        if !self.accounts.read().await.contains_key(&id) {
            return Err(StoreError::AccountNotFound(id));
        }
        let hash = hash_password(password)?;
        self.passwords.write().await.insert(id, hash);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn check_unique(accounts: &BTreeMap<AccountId, Account>, candidate: &Account) -> Result<()> {
    for existing in accounts.values().filter(|a| a.id != candidate.id) {
        if existing.username == candidate.username {
            return Err(StoreError::Conflict(format!(
                "username {} already taken",
                candidate.username
            )));
        }

        for provider in Provider::ALL {
            if let (Some(a), Some(b)) = (
                existing.external_id(provider),
                candidate.external_id(provider),
            ) {
                if a == b {
                    return Err(StoreError::Conflict(format!(
                        "{} id {} already bound",
                        provider, b
                    )));
                }
            }
        }

        if existing.access_token.is_some() && existing.access_token == candidate.access_token {
            return Err(StoreError::Conflict("access token already issued".to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn get_by_external_id(
        &self,
        provider: Provider,
        provider_user_id: &str,
    ) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.external_id(provider) == Some(provider_user_id))
            .cloned())
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.access_token.as_deref() == Some(token))
            .cloned())
    }

    async fn verify_password(&self, username: &str, password: &str) -> Result<Option<Account>> {
        let Some(account) = self.get_by_username(username).await? else {
            return Ok(None);
        };
        let matches = self
            .passwords
            .read()
            .await
            .get(&account.id)
            .is_some_and(|hash| verify_password(hash, password));
        Ok(matches.then_some(account))
    }

    async fn max_id(&self) -> Result<AccountId> {
        Ok(self
            .accounts
            .read()
            .await
            .keys()
            .next_back()
            .copied()
            .unwrap_or(AccountId(0)))
    }

    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        let id = accounts
            .keys()
            .next_back()
            .copied()
            .unwrap_or(AccountId(0))
            .next();
        let account = account.into_account(id);
        check_unique(&accounts, &account)?;
        accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn update(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if !accounts.contains_key(&account.id) {
            return Err(StoreError::AccountNotFound(account.id));
        }
        check_unique(&accounts, account)?;
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete(&self, id: AccountId) -> Result<()> {
        self.accounts
            .write()
            .await
            .remove(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        self.passwords.write().await.remove(&id);
        Ok(())
    }
}

/// Token store keyed by the SHA-256 of the secret; plaintext is never kept,
/// so tokens come back with an empty `secret`
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, ApiToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a token secret for lookup
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Register a token under its secret
    pub async fn insert(&self, mut token: ApiToken) -> Result<()> {
        let key = Self::hash_secret(&std::mem::take(&mut token.secret));
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "token secret for {} already registered",
                token.name
            )));
        }
        tokens.insert(key, token);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_by_secret(&self, secret: &str) -> Result<Option<ApiToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .get(&Self::hash_secret(secret))
            .cloned())
    }
}
