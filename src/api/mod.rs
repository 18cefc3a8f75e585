//! API layer for keygate
//!
//! REST endpoints for external login, session management and machine
//! identity.

mod error;
mod handlers;
mod rest;
mod types;

pub use error::*;
pub use rest::*;
pub use types::*;
