//! Shared cache store trait.
//!
//! The attempt throttle and the recent-location cache live in a shared
//! cache service reachable by every process instance, which is what
//! keeps their state coherent under horizontal scaling. The contract is
//! the generic get/set/incr/expire/delete surface the product's cache
//! client exposes.

use async_trait::async_trait;
use std::time::Duration;

use crate::AuthResult;

/// Storage trait for the shared, TTL-aware key-value cache.
///
/// Keys and values are strings; structured data is the caller's problem.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a value, `None` if absent or expired.
    ///
    /// # Errors
    /// Returns an error if the cache service is unreachable.
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Writes a value, replacing any existing one. A `ttl` of `None`
    /// means no expiry.
    ///
    /// # Errors
    /// Returns an error if the cache service is unreachable.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AuthResult<()>;

    /// Atomically increments an integer value, creating it at 1 if the
    /// key does not exist, and returns the new value.
    ///
    /// Atomicity is part of the contract: concurrent failure counts must
    /// not be lost to a read-modify-write race.
    ///
    /// # Errors
    /// Returns an error if the cache service is unreachable or the value
    /// is not an integer.
    async fn incr(&self, key: &str) -> AuthResult<i64>;

    /// (Re)sets the TTL on an existing key. A no-op if the key is absent.
    ///
    /// # Errors
    /// Returns an error if the cache service is unreachable.
    async fn expire(&self, key: &str, ttl: Duration) -> AuthResult<()>;

    /// Deletes a key. A no-op if the key is absent.
    ///
    /// # Errors
    /// Returns an error if the cache service is unreachable.
    async fn delete(&self, key: &str) -> AuthResult<()>;
}
