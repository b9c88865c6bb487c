//! In-memory storage backends.
//!
//! Back the test suite and single-process deployments. Each type is a
//! `RwLock`-guarded map behind the corresponding storage trait; TTL
//! handling in the cache is deadline-based and enforced lazily on read.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::store::account::{AccountRecord, AccountStore};
use crate::store::cache::CacheStore;
use crate::store::history::{LoginHistoryRecord, LoginHistoryStore};

// =============================================================================
// Accounts
// =============================================================================

/// In-memory account store.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account record.
    pub fn insert(&self, record: AccountRecord) {
        self.accounts
            .write()
            .unwrap()
            .insert(record.account_id.clone(), record);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find(&self, account_id: &str) -> AuthResult<Option<AccountRecord>> {
        Ok(self.accounts.read().unwrap().get(account_id).cloned())
    }

    async fn set_requires_step_up(&self, account_id: &str, value: bool) -> AuthResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| AuthError::storage(format!("unknown account: {account_id}")))?;
        account.requires_step_up = value;
        Ok(())
    }

    async fn touch_last_login(&self, account_id: &str, when: OffsetDateTime) -> AuthResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| AuthError::storage(format!("unknown account: {account_id}")))?;
        account.last_login_at = Some(when);
        Ok(())
    }
}

// =============================================================================
// Login history
// =============================================================================

/// In-memory append-only login history.
#[derive(Default)]
pub struct MemoryLoginHistoryStore {
    records: RwLock<Vec<LoginHistoryRecord>>,
}

impl MemoryLoginHistoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Returns `true` if no records have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LoginHistoryStore for MemoryLoginHistoryStore {
    async fn append(&self, record: LoginHistoryRecord) -> AuthResult<()> {
        self.records.write().unwrap().push(record);
        Ok(())
    }

    async fn recent_countries(&self, account_id: &str, limit: usize) -> AuthResult<Vec<String>> {
        let records = self.records.read().unwrap();
        let mut countries = Vec::new();
        // Records are appended chronologically; walk newest first.
        for record in records
            .iter()
            .rev()
            .filter(|r| r.account_id == account_id)
            .take(limit)
        {
            if let Some(country) = &record.country_code
                && !countries.contains(country)
            {
                countries.push(country.clone());
            }
        }
        Ok(countries)
    }
}

// =============================================================================
// Cache
// =============================================================================

struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory TTL-aware cache.
///
/// Expired entries are dropped lazily when touched; there is no
/// background sweeper. Good enough for tests and single-process runs,
/// where the key population is bounded by the active user set.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AuthResult<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().unwrap().insert(key.to_string(), entry);
        Ok(())
    }

    async fn incr(&self, key: &str) -> AuthResult<i64> {
        let mut entries = self.entries.write().unwrap();

        // Treat an expired counter as absent so a stale streak cannot
        // leak into a new lockout window.
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }

        match entries.get_mut(key) {
            Some(entry) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| AuthError::storage(format!("non-integer value at {key}")))?;
                entry.value = (current + 1).to_string();
                Ok(current + 1)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AuthResult<()> {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
