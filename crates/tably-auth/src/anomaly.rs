//! Geographic login anomaly detection.
//!
//! A login is anomalous when it originates from a country the account
//! has no recent association with. The check is two-tiered: a fast
//! per-account cache of the last accepted country, then the durable
//! login history as fallback. A hit on either tier is normal; a miss on
//! both sets the account's sticky step-up flag and challenges the login.
//!
//! The detector's dependencies must never become a denial-of-service
//! vector: any cache or history failure degrades to a normal verdict.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::store::account::{AccountRecord, AccountStore};
use crate::store::cache::CacheStore;
use crate::store::history::LoginHistoryStore;

const LOCATION_KEY_PREFIX: &str = "login:location:";

/// Verdict of an anomaly check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyVerdict {
    /// The origin is consistent with the account's recent logins.
    Normal,
    /// The login must complete step-up verification first.
    Anomalous,
}

/// Compares a login's origin country against the account's recent
/// locations.
pub struct AnomalyDetector {
    accounts: Arc<dyn AccountStore>,
    history: Arc<dyn LoginHistoryStore>,
    cache: Arc<dyn CacheStore>,
    location_ttl: Duration,
    history_lookback: usize,
}

impl AnomalyDetector {
    /// Creates a detector with limits from the auth configuration.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        history: Arc<dyn LoginHistoryStore>,
        cache: Arc<dyn CacheStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            accounts,
            history,
            cache,
            location_ttl: config.recent_location_ttl,
            history_lookback: config.history_lookback,
        }
    }

    fn key(account_id: &str) -> String {
        format!("{LOCATION_KEY_PREFIX}{account_id}")
    }

    /// Checks a login attempt against the account's location history.
    ///
    /// The sticky flag short-circuits everything: once an account is
    /// flagged, every attempt is anomalous until the out-of-band
    /// verification flow clears it, whatever country it comes from.
    pub async fn check(
        &self,
        account: &AccountRecord,
        origin_country: Option<&str>,
    ) -> AnomalyVerdict {
        if account.requires_step_up {
            tracing::debug!(account_id = %account.account_id, "step-up flag already set");
            return AnomalyVerdict::Anomalous;
        }

        // Geo resolution is best effort; an unknown origin is not
        // evidence of anything.
        let Some(origin) = origin_country else {
            tracing::debug!(account_id = %account.account_id, "origin country unknown, skipping check");
            return AnomalyVerdict::Normal;
        };

        // Tier 1: last accepted country, no durable-store access.
        match self.cache.get(&Self::key(&account.account_id)).await {
            Ok(Some(cached)) if cached == origin => return AnomalyVerdict::Normal,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(account_id = %account.account_id, %error, "location cache unavailable");
            }
        }

        // Tier 2: distinct countries from the recent history tail.
        let recent = match self
            .history
            .recent_countries(&account.account_id, self.history_lookback)
            .await
        {
            Ok(countries) => countries,
            Err(error) => {
                // Fail open: login availability must not depend on the
                // history store.
                tracing::warn!(account_id = %account.account_id, %error, "login history unavailable");
                return AnomalyVerdict::Normal;
            }
        };

        if recent.iter().any(|country| country == origin) {
            return AnomalyVerdict::Normal;
        }

        tracing::info!(
            account_id = %account.account_id,
            origin = %origin,
            "login from unseen country, requiring step-up verification"
        );
        if let Err(error) = self
            .accounts
            .set_requires_step_up(&account.account_id, true)
            .await
        {
            // The challenge still stands for this attempt; only the
            // stickiness is lost.
            tracing::warn!(account_id = %account.account_id, %error, "failed to persist step-up flag");
        }

        AnomalyVerdict::Anomalous
    }

    /// Records `country` as the account's last accepted login origin.
    ///
    /// Called by the orchestrator after every successful, non-anomalous
    /// login. Failures are logged and swallowed.
    pub async fn remember_location(&self, account_id: &str, country: &str) {
        if let Err(error) = self
            .cache
            .set(&Self::key(account_id), country, Some(self.location_ttl))
            .await
        {
            tracing::warn!(account_id = %account_id, %error, "failed to refresh location cache");
        }
    }
}
