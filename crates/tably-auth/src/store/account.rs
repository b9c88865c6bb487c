//! Account store trait.
//!
//! The account record is owned by the external account store; this core
//! only reads it and flips the step-up flag / last-login timestamp.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// The slice of an account the auth core reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    /// Account identifier.
    pub account_id: String,

    /// PHC-formatted password hash (Argon2id).
    pub password_hash: String,

    /// Roles granted to the account, embedded into issued tokens.
    pub roles: Vec<String>,

    /// Administrative lock, managed by operations tooling. Read-only
    /// here; a locked account cannot complete login.
    pub locked: bool,

    /// Administratively suspended for long inactivity. A dormant account
    /// is a distinct terminal login outcome, not a credential failure.
    pub dormant: bool,

    /// The account no longer exists for login purposes. Treated exactly
    /// like a credential mismatch so callers cannot probe for it.
    pub withdrawn: bool,

    /// Sticky anomaly flag. Set by the anomaly detector on a suspicious
    /// login; cleared only by the out-of-band verification flow.
    pub requires_step_up: bool,

    /// Optional profile fields. Blank fields mean the client should
    /// prompt for profile completion after login.
    pub email: Option<String>,
    /// See `email`.
    pub phone_number: Option<String>,
    /// See `email`.
    pub birth_date: Option<String>,

    /// Last successful login, touched by the orchestrator on success.
    pub last_login_at: Option<OffsetDateTime>,
}

impl AccountRecord {
    /// Returns `true` if any optional profile field is still blank.
    ///
    /// Purely a presentation concern surfaced in the login response; it
    /// has no bearing on any security decision.
    #[must_use]
    pub fn profile_incomplete(&self) -> bool {
        fn blank(field: &Option<String>) -> bool {
            field.as_deref().is_none_or(|v| v.trim().is_empty())
        }
        blank(&self.email) || blank(&self.phone_number) || blank(&self.birth_date)
    }
}

/// Storage trait for the external account store.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Looks up an account by identifier.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable. Callers on the
    /// credential path propagate this; the anomaly path fails open.
    async fn find(&self, account_id: &str) -> AuthResult<Option<AccountRecord>>;

    /// Sets or clears the sticky step-up flag.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    async fn set_requires_step_up(&self, account_id: &str, value: bool) -> AuthResult<()>;

    /// Records a successful login timestamp.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable. This write is an
    /// audit-trail concern; login success never depends on it.
    async fn touch_last_login(&self, account_id: &str, when: OffsetDateTime) -> AuthResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AccountRecord {
        AccountRecord {
            account_id: "u1".to_string(),
            password_hash: String::new(),
            roles: vec![],
            locked: false,
            dormant: false,
            withdrawn: false,
            requires_step_up: false,
            email: Some("u1@example.com".to_string()),
            phone_number: Some("010-0000-0000".to_string()),
            birth_date: Some("19900101".to_string()),
            last_login_at: None,
        }
    }

    #[test]
    fn complete_profile_is_not_flagged() {
        assert!(!record().profile_incomplete());
    }

    #[test]
    fn blank_or_missing_fields_flag_the_profile() {
        let mut account = record();
        account.phone_number = None;
        assert!(account.profile_incomplete());

        let mut account = record();
        account.birth_date = Some("   ".to_string());
        assert!(account.profile_incomplete());
    }
}
