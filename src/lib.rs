//! keygate library
//!
//! Identity and access-control gateway for a multi-tenant API relay.
//!
//! ## Modules
//!
//! - [`domain`] - Accounts, roles, API tokens and external identities
//! - [`infra`] - Store traits, in-memory stores, status cache, keyed locks
//! - [`auth`] - Role guard, sessions, credential resolution, API keys, OAuth linking
//! - [`i18n`] - Localized user-facing messages
//! - [`metrics`] - Authentication outcome counters
//! - [`telemetry`] - Logging setup
//! - [`api`] - REST API routes

pub mod api;
pub mod auth;
pub mod domain;
pub mod i18n;
pub mod infra;
pub mod metrics;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{Account, AccountId, AccountStatus, ApiToken, Provider, Role};

pub use auth::{AuthError, CredentialKind, IdentityContext};
pub use infra::{AccountStore, Result, StoreError, TokenStore};
