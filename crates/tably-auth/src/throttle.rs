//! Brute-force attempt throttle.
//!
//! Tracks consecutive failed logins per account in the shared cache.
//! The counter lives under a lockout-window TTL that is refreshed by
//! every additional failure; reaching the attempt limit blocks the
//! account until the window lapses. A single success wipes the streak.
//!
//! Cache outages fail open: a broken counter must not lock legitimate
//! users out, and must not grant attackers anything they would not get
//! from the credential check itself.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::store::cache::CacheStore;

const ATTEMPT_KEY_PREFIX: &str = "login:attempt:";

/// Per-account failed-login counter over the shared cache.
pub struct AttemptThrottle {
    cache: Arc<dyn CacheStore>,
    max_attempts: i64,
    captcha_threshold: i64,
    lockout_window: Duration,
}

impl AttemptThrottle {
    /// Creates a throttle with thresholds from the auth configuration.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, config: &AuthConfig) -> Self {
        Self {
            cache,
            max_attempts: i64::from(config.max_attempts),
            captcha_threshold: i64::from(config.captcha_threshold),
            lockout_window: config.lockout_window,
        }
    }

    fn key(account_id: &str) -> String {
        format!("{ATTEMPT_KEY_PREFIX}{account_id}")
    }

    /// Records a failed login: atomically increments the counter and
    /// refreshes its TTL to the lockout window.
    pub async fn on_failure(&self, account_id: &str) {
        let key = Self::key(account_id);
        match self.cache.incr(&key).await {
            Ok(attempts) => {
                if let Err(error) = self.cache.expire(&key, self.lockout_window).await {
                    tracing::warn!(account_id = %account_id, %error, "failed to set attempt TTL");
                }
                tracing::debug!(account_id = %account_id, attempts, "login failure recorded");
            }
            Err(error) => {
                tracing::warn!(account_id = %account_id, %error, "failed to record login failure");
            }
        }
    }

    /// Records a successful login: deletes the counter entirely.
    pub async fn on_success(&self, account_id: &str) {
        if let Err(error) = self.cache.delete(&Self::key(account_id)).await {
            tracing::warn!(account_id = %account_id, %error, "failed to clear attempt counter");
        }
    }

    /// Returns `true` if the account has reached the attempt limit
    /// within the current lockout window.
    pub async fn is_blocked(&self, account_id: &str) -> bool {
        self.attempts(account_id).await >= self.max_attempts
    }

    /// Returns `true` if the account has failed often enough that the
    /// client must solve a captcha before the next attempt.
    pub async fn requires_captcha(&self, account_id: &str) -> bool {
        self.attempts(account_id).await >= self.captcha_threshold
    }

    async fn attempts(&self, account_id: &str) -> i64 {
        match self.cache.get(&Self::key(account_id)).await {
            Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(account_id = %account_id, value = %value, "non-numeric attempt counter");
                0
            }),
            Ok(None) => 0,
            Err(error) => {
                // Fail open.
                tracing::warn!(account_id = %account_id, %error, "attempt counter unavailable");
                0
            }
        }
    }
}
