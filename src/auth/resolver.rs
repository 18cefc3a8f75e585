//! Credential resolver for session and access-token traffic

use std::sync::Arc;
use tracing::debug;

use super::session::AuthSession;
use super::{AuthError, CredentialKind, IdentityContext, BEARER_PREFIX};
use crate::domain::{AccountId, Role};
use crate::infra::{AccountStatusCache, AccountStore};

/// Turns a session or an opaque access token into an identity context
pub struct CredentialResolver {
    accounts: Arc<dyn AccountStore>,
    status: Arc<AccountStatusCache>,
}

impl CredentialResolver {
    pub fn new(accounts: Arc<dyn AccountStore>, status: Arc<AccountStatusCache>) -> Self {
        Self { accounts, status }
    }

    /// Resolve the caller and require at least `min_role`.
    ///
    /// Session claims win over a bearer token. For session callers the
    /// status and role are re-read through the status cache, so a ban or a
    /// demotion applied after login takes effect on the next request.
    pub async fn resolve(
        &self,
        session: &AuthSession,
        bearer: Option<&str>,
        min_role: Role,
    ) -> Result<IdentityContext, AuthError> {
        let context = match session.read_claims().await? {
            Some(claims) => {
                let snapshot = self
                    .status
                    .snapshot(claims.account_id)
                    .await?
                    .ok_or(AuthError::Unauthenticated)?;
                IdentityContext {
                    account_id: claims.account_id,
                    role: snapshot.role,
                    status: snapshot.status,
                    credential: CredentialKind::Session,
                    token: None,
                }
            }
            None => {
                let token = bearer
                    .map(|b| b.strip_prefix(BEARER_PREFIX).unwrap_or(b).trim())
                    .filter(|t| !t.is_empty())
                    .ok_or(AuthError::Unauthenticated)?;

                let account = self
                    .accounts
                    .get_by_access_token(token)
                    .await?
                    .ok_or(AuthError::InvalidAccessToken)?;

                IdentityContext {
                    account_id: account.id,
                    role: account.role,
                    status: account.status,
                    credential: CredentialKind::AccessToken,
                    token: None,
                }
            }
        };

        if !context.status.is_enabled() {
            debug!(account_id = %context.account_id, "Disabled account refused");
            return Err(AuthError::AccountDisabled);
        }

        if !context.role.satisfies(min_role) {
            debug!(
                account_id = %context.account_id,
                role = %context.role,
                required = %min_role,
                "Insufficient role"
            );
            return Err(AuthError::InsufficientRole {
                required: min_role,
                actual: context.role,
            });
        }

        Ok(context)
    }

    /// Permissive variant: the session's account id if any, never an error
    pub async fn try_resolve(&self, session: &AuthSession) -> Option<AccountId> {
        match session.account_id().await {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Session unreadable, treating caller as anonymous");
                None
            }
        }
    }
}
