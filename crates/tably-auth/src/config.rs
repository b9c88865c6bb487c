//! Authentication configuration.
//!
//! Lifetimes and thresholds for the token service, attempt throttle,
//! anomaly detector, and blacklist compaction.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! jwt_secret = "aGlnaC1lbnRyb3B5LXNpZ25pbmcta2V5LW1hdGVyaWFsLi4u"
//! access_token_lifetime = "15m"
//! refresh_token_lifetime = "7d"
//! lockout_window = "5m"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Authentication and session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// BASE64-encoded HMAC signing secret for bearer tokens.
    /// Must decode to at least 32 bytes. There is no baked-in default;
    /// an empty value is a startup error.
    pub jwt_secret: String,

    /// Access token lifetime. Short-lived; authorizes individual requests.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Long-lived; only good for minting a new
    /// access token.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// How long a streak of failed logins is remembered. Refreshed on
    /// every additional failure, not by rejected attempts while blocked.
    #[serde(with = "humantime_serde")]
    pub lockout_window: Duration,

    /// Consecutive failures within the lockout window that block the account.
    pub max_attempts: u32,

    /// Consecutive failures after which the client must solve a captcha.
    pub captcha_threshold: u32,

    /// How long the last accepted login country is cached per account.
    #[serde(with = "humantime_serde")]
    pub recent_location_ttl: Duration,

    /// How many recent login-history records the anomaly detector reads
    /// when the location cache is cold.
    pub history_lookback: usize,

    /// How often the revoked-token set is swept for expired entries.
    #[serde(with = "humantime_serde")]
    pub compaction_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            lockout_window: Duration::from_secs(5 * 60), // 5 minutes
            max_attempts: 5,
            captcha_threshold: 3,
            recent_location_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            history_lookback: 10,
            compaction_interval: Duration::from_secs(24 * 3600), // daily
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_policy() {
        let config = AuthConfig::default();
        assert_eq!(config.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(config.refresh_token_lifetime, Duration::from_secs(604_800));
        assert_eq!(config.lockout_window, Duration::from_secs(300));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.captcha_threshold, 3);
        assert_eq!(config.history_lookback, 10);
    }

    #[test]
    fn parses_humantime_durations() {
        let config: AuthConfig = toml::from_str(
            r#"
            jwt_secret = "c2VjcmV0"
            access_token_lifetime = "30m"
            lockout_window = "10m"
            "#,
        )
        .unwrap();
        assert_eq!(config.access_token_lifetime, Duration::from_secs(1800));
        assert_eq!(config.lockout_window, Duration::from_secs(600));
        // Unset fields keep their defaults.
        assert_eq!(config.max_attempts, 5);
    }
}
