//! Core type definitions for the keygate gateway
//!
//! Roles, account status and external identity providers. Integer encodings
//! match what is written into session claims and account records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier assigned by the persistence collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// The id that follows this one (used when synthesizing usernames)
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Privilege tier of an account.
///
/// Totally ordered: `Common < Admin < Root`. All privilege comparisons go
/// through the methods in [`crate::auth::role`]; do not compare the integer
/// encodings directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Role {
    Common,
    Admin,
    Root,
}

impl Role {
    /// Lowest tier, assigned to provisioned accounts
    pub const LOWEST: Role = Role::Common;

    pub fn as_i64(&self) -> i64 {
        match self {
            Role::Common => 1,
            Role::Admin => 10,
            Role::Root => 100,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(Role::Common),
            10 => Some(Role::Admin),
            100 => Some(Role::Root),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Common => "common",
            Role::Admin => "admin",
            Role::Root => "root",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::LOWEST
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.as_i64()
    }
}

impl TryFrom<i64> for Role {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        Role::from_i64(v).ok_or_else(|| format!("unknown role value: {v}"))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an account may authenticate at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum AccountStatus {
    Enabled,
    Disabled,
}

impl AccountStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            AccountStatus::Enabled => 1,
            AccountStatus::Disabled => 2,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(AccountStatus::Enabled),
            2 => Some(AccountStatus::Disabled),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AccountStatus::Enabled)
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        AccountStatus::Enabled
    }
}

impl From<AccountStatus> for i64 {
    fn from(status: AccountStatus) -> Self {
        status.as_i64()
    }
}

impl TryFrom<i64> for AccountStatus {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        AccountStatus::from_i64(v).ok_or_else(|| format!("unknown status value: {v}"))
    }
}

/// External identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    WeChat,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::GitHub, Provider::WeChat];

    /// Lowercase label used in routes and synthesized usernames
    pub fn label(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::WeChat => "wechat",
        }
    }

    /// Display name given to provisioned accounts when the profile has none
    pub fn placeholder_display_name(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub User",
            Provider::WeChat => "WeChat User",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "github" => Some(Provider::GitHub),
            "wechat" => Some(Provider::WeChat),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
