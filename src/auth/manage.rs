//! Account administration gated by the role hierarchy
//!
//! Every write that changes an account's status or role invalidates the
//! status cache before returning.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::role::{check_create, check_manage, check_update, check_view, ManageAction, RoleDenied};
use super::{AuthError, IdentityContext};
use crate::domain::{Account, AccountId, AccountStatus, NewAccount, Role};
use crate::infra::{AccountStatusCache, AccountStore, StoreError};

pub struct AccountManager {
    accounts: Arc<dyn AccountStore>,
    status: Arc<AccountStatusCache>,
}

impl AccountManager {
    pub fn new(accounts: Arc<dyn AccountStore>, status: Arc<AccountStatusCache>) -> Self {
        Self { accounts, status }
    }

    async fn load_by_username(&self, username: &str) -> Result<Account, AuthError> {
        self.accounts
            .get_by_username(username)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    async fn load(&self, id: AccountId) -> Result<Account, AuthError> {
        self.accounts
            .get_by_id(id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    /// Apply `action` to the account named `username`.
    ///
    /// Returns the account as it stands afterwards (for `Delete`, the removed
    /// record).
    pub async fn manage(
        &self,
        actor: &IdentityContext,
        username: &str,
        action: ManageAction,
    ) -> Result<Account, AuthError> {
        let mut target = self.load_by_username(username).await?;

        if let Err(denied) = check_manage(actor.role, target.role, action) {
            debug!(
                actor = %actor.account_id,
                target = %target.id,
                %action,
                ?denied,
                "Manage action denied"
            );
            return Err(denied.into());
        }

        match action {
            ManageAction::Delete => {
                self.accounts.delete(target.id).await?;
            }
            ManageAction::Disable => target.status = AccountStatus::Disabled,
            ManageAction::Enable => target.status = AccountStatus::Enabled,
            ManageAction::Promote => target.role = Role::Admin,
            ManageAction::Demote => target.role = Role::Common,
        }

        if action != ManageAction::Delete {
            self.accounts.update(&target).await?;
        }
        self.status.invalidate(target.id).await;

        info!(actor = %actor.account_id, target = %target.id, %action, "Account managed");
        Ok(target)
    }

    /// Replace an account's editable fields, including its role
    pub async fn update_account(
        &self,
        actor: &IdentityContext,
        updated: Account,
    ) -> Result<Account, AuthError> {
        let current = self.load(updated.id).await?;
        check_update(actor.role, current.role, updated.role)?;

        // Fields owned by other flows are not editable here
        let account = Account {
            status: current.status,
            access_token: current.access_token,
            github_id: current.github_id,
            wechat_id: current.wechat_id,
            ..updated
        };
        self.accounts.update(&account).await?;
        self.status.invalidate(account.id).await;
        Ok(account)
    }

    /// Create an account on behalf of `actor`
    pub async fn create_account(
        &self,
        actor: &IdentityContext,
        account: NewAccount,
    ) -> Result<Account, AuthError> {
        check_create(actor.role, account.role)?;
        Ok(self.accounts.insert(account).await?)
    }

    /// Read another account's record
    pub async fn view_account(
        &self,
        actor: &IdentityContext,
        id: AccountId,
    ) -> Result<Account, AuthError> {
        let account = self.load(id).await?;
        check_view(actor.role, account.role)?;
        Ok(account)
    }

    /// Delete the caller's own account. Root may not.
    pub async fn delete_self(&self, actor: &IdentityContext) -> Result<(), AuthError> {
        let account = self.load(actor.account_id).await?;
        if account.role == Role::Root {
            return Err(RoleDenied::RootCannotDeleteSelf.into());
        }

        self.accounts.delete(account.id).await?;
        self.status.invalidate(account.id).await;
        info!(account_id = %account.id, "Account deleted by owner");
        Ok(())
    }

    /// Generate and store a fresh opaque access token for `account_id`
    pub async fn issue_access_token(&self, account_id: AccountId) -> Result<String, AuthError> {
        let mut account = self.load(account_id).await?;
        let token = Uuid::new_v4().simple().to_string();

        if let Some(holder) = self.accounts.get_by_access_token(&token).await? {
            if holder.id != account_id {
                return Err(AuthError::AccessTokenCollision);
            }
        }

        account.access_token = Some(token.clone());
        match self.accounts.update(&account).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::AccessTokenCollision),
            Err(e) => return Err(e.into()),
        }

        info!(account_id = %account_id, "Access token issued");
        Ok(token)
    }
}
