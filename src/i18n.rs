//! Localized user-facing messages
//!
//! Error responses carry a message looked up by message key and a two-letter
//! language tag. English is the base language: unknown tags and keys missing
//! from a table fall back to it, then to a generic message.

use std::collections::HashMap;

/// Base language
pub const DEFAULT_LANGUAGE: &str = "en";

/// Returned when no table knows the key
pub const UNKNOWN_MESSAGE: &str = "Unknown error";

const EN: &str = include_str!("../i18n/en.json");
const ZH: &str = include_str!("../i18n/zh.json");

/// Maps a message key and a language tag to display text
pub trait MessageCatalog: Send + Sync {
    fn message(&self, key: &str, lang: &str) -> String;
}

/// Pick the response language from an `Accept-Language` value
pub fn preferred_language(accept_language: Option<&str>) -> &'static str {
    match accept_language {
        Some(value) if value.trim_start().starts_with("zh") => "zh",
        _ => DEFAULT_LANGUAGE,
    }
}

/// Catalog backed by the tables compiled into the binary
pub struct StaticCatalog {
    tables: HashMap<&'static str, HashMap<String, String>>,
}

impl StaticCatalog {
    /// Load the embedded English and Chinese tables
    pub fn embedded() -> Result<Self, serde_json::Error> {
        let mut tables = HashMap::new();
        tables.insert("en", serde_json::from_str(EN)?);
        tables.insert("zh", serde_json::from_str(ZH)?);
        Ok(Self { tables })
    }
}

impl MessageCatalog for StaticCatalog {
    fn message(&self, key: &str, lang: &str) -> String {
        self.tables
            .get(lang)
            .and_then(|table| table.get(key))
            .or_else(|| {
                self.tables
                    .get(DEFAULT_LANGUAGE)
                    .and_then(|table| table.get(key))
            })
            .cloned()
            .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, ManageAction, RoleDenied};
    use crate::auth::role::check_manage;
    use crate::domain::Role;

    #[test]
    fn test_preferred_language() {
        assert_eq!(preferred_language(Some("zh-CN,zh;q=0.9,en;q=0.8")), "zh");
        assert_eq!(preferred_language(Some("en-US,en;q=0.9")), "en");
        assert_eq!(preferred_language(Some("fr")), "en");
        assert_eq!(preferred_language(None), "en");
    }

    #[test]
    fn test_lookup_and_fallback() {
        let catalog = StaticCatalog::embedded().unwrap();
        assert_eq!(catalog.message("user_banned", "en"), "This user has been banned");
        assert_eq!(catalog.message("user_banned", "zh"), "用户已被封禁");
        assert_eq!(catalog.message("user_banned", "de"), "This user has been banned");
        assert_eq!(catalog.message("no_such_key", "zh"), UNKNOWN_MESSAGE);
    }

    #[test]
    fn test_every_auth_error_has_both_translations() {
        let catalog = StaticCatalog::embedded().unwrap();
        let denials = [
            ManageAction::Disable,
            ManageAction::Delete,
            ManageAction::Promote,
            ManageAction::Demote,
        ]
        .into_iter()
        .filter_map(|a| check_manage(Role::Admin, Role::Root, a).err());

        let errors = [
            AuthError::Unauthenticated,
            AuthError::InvalidAccessToken,
            AuthError::UnknownOrInvalidToken,
            AuthError::AccountDisabled,
            AuthError::AccountBanned,
            AuthError::PasswordLoginDisabled,
            AuthError::InvalidCredentials,
            AuthError::InsufficientRoleForChannelOverride,
            AuthError::StateMismatch,
            AuthError::RegistrationClosed,
            AuthError::AlreadyBound,
            AuthError::ProviderDisabled("github".into()),
            AuthError::ProviderUnreachable(String::new()),
            AuthError::MalformedProviderResponse(String::new()),
            AuthError::ProviderRejected(String::new()),
            AuthError::InvalidParams(String::new()),
            AuthError::AccountNotFound,
            AuthError::AccessTokenCollision,
            AuthError::Denied(RoleDenied::CannotGrantRole),
            AuthError::Denied(RoleDenied::CannotDisableRoot),
            AuthError::Denied(RoleDenied::CannotDeleteRoot),
            AuthError::Denied(RoleDenied::CannotDemoteRoot),
            AuthError::Denied(RoleDenied::CannotPromote),
            AuthError::Denied(RoleDenied::UserAlreadyAdmin),
            AuthError::Denied(RoleDenied::UserAlreadyCommon),
            AuthError::Denied(RoleDenied::RootCannotDeleteSelf),
        ]
        .into_iter()
        .chain(denials.map(AuthError::Denied));

        for err in errors {
            for lang in ["en", "zh"] {
                assert_ne!(
                    catalog.message(err.message_key(), lang),
                    UNKNOWN_MESSAGE,
                    "{} missing in {}",
                    err.message_key(),
                    lang
                );
            }
        }
    }
}
