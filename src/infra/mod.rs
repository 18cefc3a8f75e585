//! Infrastructure layer for keygate
//!
//! Contains:
//! - Store traits for accounts and API tokens
//! - In-memory store implementations
//! - Account status cache (LRU with TTL)
//! - Keyed locks for serializing identity linking
//! - Argon2 password hashing

mod cache;
mod error;
mod keyed_lock;
mod memory;
mod password;
mod traits;

pub use cache::{AccountSnapshot, AccountStatusCache, CacheStats, LruCache};
pub use error::*;
pub use keyed_lock::KeyedLocks;
pub use memory::{InMemoryAccountStore, InMemoryTokenStore};
pub use password::{hash_password, verify_password};
pub use traits::*;
