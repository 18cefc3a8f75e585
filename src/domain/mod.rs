//! Domain models for keygate
//!
//! Accounts, API tokens, roles and external identities.

mod account;
mod token;
mod types;

pub use account::*;
pub use token::*;
pub use types::*;
