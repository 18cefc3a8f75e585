//! API token records used by machine clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::AccountId;

/// Machine credential record. Quota fields are maintained by billing
/// collaborators; only validity is judged here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: i64,

    pub name: String,

    /// Secret part of the key (the `<secret>` in `sk-<secret>`). Never serialized.
    #[serde(skip_serializing, default)]
    pub secret: String,

    /// Owning account
    pub account_id: AccountId,

    pub enabled: bool,

    /// Expiry time (None = never expires)
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    pub unlimited_quota: bool,

    pub remaining_quota: i64,

    pub model_limits_enabled: bool,

    /// Models this token may call when `model_limits_enabled`
    #[serde(default)]
    pub model_limits: BTreeSet<String>,
}

/// Outcome of evaluating a token's validity at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    Valid,
    Disabled,
    Expired,
    Exhausted,
}

impl TokenValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidity::Valid)
    }
}

impl ApiToken {
    /// Evaluate whether the token may be used at `now`
    pub fn validity_at(&self, now: DateTime<Utc>) -> TokenValidity {
        if !self.enabled {
            return TokenValidity::Disabled;
        }

        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return TokenValidity::Expired;
            }
        }

        if !self.unlimited_quota && self.remaining_quota <= 0 {
            return TokenValidity::Exhausted;
        }

        TokenValidity::Valid
    }

    /// Per-model limits, only when the token enables them
    pub fn model_limit_set(&self) -> Option<BTreeSet<String>> {
        self.model_limits_enabled.then(|| self.model_limits.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token() -> ApiToken {
        ApiToken {
            id: 1,
            name: "default".to_string(),
            secret: "abc999".to_string(),
            account_id: AccountId(1),
            enabled: true,
            expires_at: None,
            unlimited_quota: false,
            remaining_quota: 500,
            model_limits_enabled: false,
            model_limits: BTreeSet::new(),
        }
    }

    #[test]
    fn test_valid_token() {
        assert_eq!(token().validity_at(Utc::now()), TokenValidity::Valid);
    }

    #[test]
    fn test_disabled_token() {
        let mut t = token();
        t.enabled = false;
        assert_eq!(t.validity_at(Utc::now()), TokenValidity::Disabled);
    }

    #[test]
    fn test_expired_token() {
        let mut t = token();
        let now = Utc::now();
        t.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(t.validity_at(now), TokenValidity::Expired);

        t.expires_at = Some(now + Duration::hours(1));
        assert!(t.validity_at(now).is_valid());
    }

    #[test]
    fn test_exhausted_unless_unlimited() {
        let mut t = token();
        t.remaining_quota = 0;
        assert_eq!(t.validity_at(Utc::now()), TokenValidity::Exhausted);

        t.unlimited_quota = true;
        assert!(t.validity_at(Utc::now()).is_valid());
    }

    #[test]
    fn test_model_limits_only_when_enabled() {
        let mut t = token();
        t.model_limits.insert("gpt-4o".to_string());
        assert!(t.model_limit_set().is_none());

        t.model_limits_enabled = true;
        let limits = t.model_limit_set().unwrap();
        assert!(limits.contains("gpt-4o"));
    }
}
