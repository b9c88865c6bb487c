//! Durable login history store trait.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// One successful login, appended once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginHistoryRecord {
    /// Account identifier.
    pub account_id: String,
    /// Origin IP address as received by the HTTP layer.
    pub ip_address: String,
    /// Origin country resolved from the IP, when resolution succeeded.
    pub country_code: Option<String>,
    /// When the login completed.
    pub logged_in_at: OffsetDateTime,
}

/// Storage trait for the append-only login history.
///
/// Retention and purging are out of scope here; this core only appends
/// and reads the recent tail.
#[async_trait]
pub trait LoginHistoryStore: Send + Sync {
    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable. The orchestrator
    /// logs and swallows this; a successful authentication is never
    /// undone by an audit write failing.
    async fn append(&self, record: LoginHistoryRecord) -> AuthResult<()>;

    /// Distinct country codes from the account's most recent logins,
    /// newest first, reading at most `limit` records.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable. The anomaly
    /// detector fails open on it.
    async fn recent_countries(&self, account_id: &str, limit: usize) -> AuthResult<Vec<String>>;
}
