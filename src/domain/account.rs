//! Account records and external identities

use serde::{Deserialize, Serialize};

use super::{AccountId, AccountStatus, Provider, Role};

/// Identity record owned by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub username: String,

    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub role: Role,

    pub status: AccountStatus,

    /// GitHub login bound to this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,

    /// WeChat open id bound to this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wechat_id: Option<String>,

    /// Opaque access token, unique across accounts. Never serialized.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl Account {
    /// External id held for `provider`, if any
    pub fn external_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::GitHub => self.github_id.as_deref(),
            Provider::WeChat => self.wechat_id.as_deref(),
        }
    }

    pub fn set_external_id(&mut self, provider: Provider, provider_user_id: impl Into<String>) {
        let value = Some(provider_user_id.into());
        match provider {
            Provider::GitHub => self.github_id = value,
            Provider::WeChat => self.wechat_id = value,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }
}

/// Fields for an account that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub github_id: Option<String>,
    pub wechat_id: Option<String>,
}

impl NewAccount {
    /// Provision an account for a first-time external login.
    ///
    /// Username is `<provider>_<next_id>`; role is the lowest tier and the
    /// account starts enabled.
    pub fn provisioned(identity: &ExternalIdentity, next_id: AccountId) -> Self {
        let provider = identity.provider;
        let display_name = identity
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(provider.placeholder_display_name())
            .to_string();

        let mut account = Self {
            username: format!("{}_{}", provider.label(), next_id),
            display_name,
            email: identity.email.clone().filter(|e| !e.is_empty()),
            role: Role::LOWEST,
            status: AccountStatus::Enabled,
            github_id: None,
            wechat_id: None,
        };
        match provider {
            Provider::GitHub => account.github_id = Some(identity.provider_user_id.clone()),
            Provider::WeChat => account.wechat_id = Some(identity.provider_user_id.clone()),
        }
        account
    }

    /// Materialize with the id assigned by the store
    pub fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            username: self.username,
            display_name: self.display_name,
            email: self.email,
            role: self.role,
            status: self.status,
            github_id: self.github_id,
            wechat_id: self.wechat_id,
            access_token: None,
        }
    }
}

/// Identity asserted by an external provider after a code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: Provider,

    /// Provider-assigned user id (GitHub login, WeChat open id)
    pub provider_user_id: String,

    pub display_name: Option<String>,

    pub email: Option<String>,
}

impl ExternalIdentity {
    pub fn new(provider: Provider, provider_user_id: impl Into<String>) -> Self {
        Self {
            provider,
            provider_user_id: provider_user_id.into(),
            display_name: None,
            email: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioned_account_defaults() {
        let identity = ExternalIdentity::new(Provider::WeChat, "u42");
        let account = NewAccount::provisioned(&identity, AccountId(8));

        assert_eq!(account.username, "wechat_8");
        assert_eq!(account.display_name, "WeChat User");
        assert_eq!(account.role, Role::Common);
        assert_eq!(account.status, AccountStatus::Enabled);
        assert_eq!(account.wechat_id.as_deref(), Some("u42"));
        assert!(account.github_id.is_none());
    }

    #[test]
    fn test_provisioned_account_uses_profile() {
        let identity = ExternalIdentity::new(Provider::GitHub, "alice123")
            .with_display_name("Alice")
            .with_email("alice@example.com");
        let account = NewAccount::provisioned(&identity, AccountId(3));

        assert_eq!(account.username, "github_3");
        assert_eq!(account.display_name, "Alice");
        assert_eq!(account.email.as_deref(), Some("alice@example.com"));
        assert_eq!(account.github_id.as_deref(), Some("alice123"));
    }

    #[test]
    fn test_empty_profile_name_falls_back_to_placeholder() {
        let identity = ExternalIdentity::new(Provider::GitHub, "bob").with_display_name("");
        let account = NewAccount::provisioned(&identity, AccountId(1));
        assert_eq!(account.display_name, "GitHub User");
    }

    #[test]
    fn test_access_token_not_serialized() {
        let mut account = NewAccount::provisioned(
            &ExternalIdentity::new(Provider::GitHub, "carol"),
            AccountId(1),
        )
        .into_account(AccountId(1));
        account.access_token = Some("secret-token".to_string());

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("\"role\":1"));
    }

    #[test]
    fn test_external_id_accessors() {
        let mut account = NewAccount::provisioned(
            &ExternalIdentity::new(Provider::GitHub, "dave"),
            AccountId(2),
        )
        .into_account(AccountId(2));
        assert_eq!(account.external_id(Provider::GitHub), Some("dave"));
        assert_eq!(account.external_id(Provider::WeChat), None);

        account.set_external_id(Provider::WeChat, "wx-dave");
        assert_eq!(account.external_id(Provider::WeChat), Some("wx-dave"));
    }
}
