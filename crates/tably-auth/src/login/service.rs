//! The login orchestrator.
//!
//! Sequences a login attempt through the duplicate-session check, the
//! attempt throttle, credential validation, the dormancy check, and the
//! anomaly detector, then mints the token pair and registers the new
//! session. Also owns the request-path `authenticate`, the refresh
//! exchange, and logout.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::anomaly::{AnomalyDetector, AnomalyVerdict};
use crate::error::AuthError;
use crate::login::{AuthContext, LoginOutcome, LoginRequest, authenticate_bearer};
use crate::password::verify_password;
use crate::session::SessionRegistry;
use crate::store::account::{AccountRecord, AccountStore};
use crate::store::history::{LoginHistoryRecord, LoginHistoryStore};
use crate::throttle::AttemptThrottle;
use crate::token::service::TokenService;

/// Orchestrates login, authentication, refresh, and logout.
pub struct LoginService {
    accounts: Arc<dyn AccountStore>,
    history: Arc<dyn LoginHistoryStore>,
    throttle: AttemptThrottle,
    anomaly: AnomalyDetector,
    sessions: Arc<SessionRegistry>,
    tokens: Arc<TokenService>,
}

impl LoginService {
    /// Creates the orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        history: Arc<dyn LoginHistoryStore>,
        throttle: AttemptThrottle,
        anomaly: AnomalyDetector,
        sessions: Arc<SessionRegistry>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            accounts,
            history,
            throttle,
            anomaly,
            sessions,
            tokens,
        }
    }

    /// Runs one login attempt to a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures on the critical
    /// path (account store unreachable, signer misconfigured). Everything
    /// a user can cause comes back as a [`LoginOutcome`].
    pub async fn login(&self, request: &LoginRequest) -> AuthResult<LoginOutcome> {
        let account_id = request.account_id.as_str();

        // 1. Duplicate-session check. Short-circuits before credentials,
        //    counters, or the registry are touched so the caller can
        //    resubmit with `force`.
        if !request.force && self.sessions.is_duplicate_login(account_id) {
            tracing::info!(account_id = %account_id, "duplicate login detected");
            return Ok(LoginOutcome::DuplicateLogin);
        }

        // 2. Lockout check, before credential validation. Rejected
        //    attempts here do not extend the lockout window.
        if self.throttle.is_blocked(account_id).await {
            tracing::info!(account_id = %account_id, "account blocked by attempt throttle");
            return Ok(LoginOutcome::Blocked);
        }

        // 3. Credential validation. Unknown and withdrawn accounts take
        //    the same path as a wrong password.
        let account = match self.accounts.find(account_id).await? {
            Some(account) if !account.withdrawn => account,
            _ => return Ok(self.credential_failure(account_id).await),
        };

        let password_ok = match verify_password(&request.password, &account.password_hash) {
            Ok(matches) => matches,
            Err(error) => {
                tracing::error!(account_id = %account_id, %error, "stored credential hash unusable");
                false
            }
        };
        if !password_ok {
            return Ok(self.credential_failure(account_id).await);
        }

        // 4. Administrative lock and dormancy. Both checked only after
        //    the credentials pass so their status cannot be probed, and
        //    neither touches the throttle or the registry.
        if account.locked {
            tracing::info!(account_id = %account_id, "administratively locked account refused");
            return Ok(LoginOutcome::Blocked);
        }
        if account.dormant {
            tracing::info!(account_id = %account_id, "dormant account held at login");
            return Ok(LoginOutcome::DormantHold);
        }

        // 5. Anomaly detection. An anomalous login gets no tokens and no
        //    session; the account keeps its step-up flag.
        let verdict = self
            .anomaly
            .check(&account, request.country.as_deref())
            .await;
        if verdict == AnomalyVerdict::Anomalous {
            return Ok(LoginOutcome::StepUpRequired);
        }

        self.complete_login(&account, request).await
    }

    /// Success path: reset the throttle, write the audit trail, register
    /// the session, and mint the token pair.
    async fn complete_login(
        &self,
        account: &AccountRecord,
        request: &LoginRequest,
    ) -> AuthResult<LoginOutcome> {
        let account_id = account.account_id.as_str();
        let now = OffsetDateTime::now_utc();

        self.throttle.on_success(account_id).await;

        // Audit-trail writes never undo a successful authentication.
        if let Err(error) = self
            .history
            .append(LoginHistoryRecord {
                account_id: account_id.to_string(),
                ip_address: request.ip_address.clone(),
                country_code: request.country.clone(),
                logged_in_at: now,
            })
            .await
        {
            tracing::warn!(account_id = %account_id, %error, "failed to append login history");
        }

        if let Some(country) = request.country.as_deref() {
            self.anomaly.remember_location(account_id, country).await;
        }

        if let Err(error) = self.accounts.touch_last_login(account_id, now).await {
            tracing::warn!(account_id = %account_id, %error, "failed to update last-login timestamp");
        }

        let access_token = self
            .tokens
            .issue_access(account_id, account.roles.clone())?;
        let refresh_token = self
            .tokens
            .issue_refresh(account_id, account.roles.clone())?;

        // Registering revokes any session the `force` path superseded.
        self.sessions.register_session(account_id, &access_token);

        tracing::info!(account_id = %account_id, "login succeeded");
        Ok(LoginOutcome::Success {
            access_token,
            refresh_token,
            profile_incomplete: account.profile_incomplete(),
        })
    }

    async fn credential_failure(&self, account_id: &str) -> LoginOutcome {
        self.throttle.on_failure(account_id).await;
        LoginOutcome::InvalidCredentials {
            captcha_required: self.throttle.requires_captcha(account_id).await,
        }
    }

    /// Validates a bearer token for the per-request filter.
    ///
    /// # Errors
    /// Returns `TokenRevoked`, `TokenExpired`, or `InvalidToken`.
    pub fn authenticate(&self, bearer: &str) -> AuthResult<AuthContext> {
        authenticate_bearer(&self.tokens, &self.sessions, bearer)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The new access token becomes the account's active session,
    /// revoking the one it supersedes; refresh must not quietly widen
    /// the single-session invariant.
    ///
    /// # Errors
    /// Returns `TokenRevoked`, `TokenExpired`, or `InvalidToken` for bad
    /// refresh tokens.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        if self.sessions.is_revoked(refresh_token) {
            return Err(AuthError::TokenRevoked);
        }

        let verified = self.tokens.verify(refresh_token)?;
        let access_token = self
            .tokens
            .issue_access(&verified.subject, verified.roles)?;
        self.sessions.register_session(&verified.subject, &access_token);

        tracing::debug!(account_id = %verified.subject, "access token refreshed");
        Ok(access_token)
    }

    /// Ends the account's session and blacklists both presented tokens.
    pub fn logout(&self, account_id: &str, access_token: &str, refresh_token: &str) {
        self.sessions.logout(account_id, access_token, refresh_token);
        tracing::info!(account_id = %account_id, "logged out");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::error::AuthError;
    use crate::password::hash_password;
    use crate::store::cache::CacheStore;
    use crate::store::memory::{MemoryAccountStore, MemoryCacheStore, MemoryLoginHistoryStore};
    use crate::token::jwt::JwtSigner;
    use std::sync::OnceLock;

    const TEST_SECRET: &str = "dGFibHktdGVzdC1zaWduaW5nLWtleS0zMi1ieXRlcyEh";
    const PASSWORD: &str = "correct-horse-battery";

    /// Argon2 hashing is deliberately slow; share one hash across tests.
    fn password_hash() -> &'static str {
        static HASH: OnceLock<String> = OnceLock::new();
        HASH.get_or_init(|| hash_password(PASSWORD).unwrap())
    }

    struct Harness {
        service: LoginService,
        accounts: Arc<MemoryAccountStore>,
        history: Arc<MemoryLoginHistoryStore>,
        cache: Arc<MemoryCacheStore>,
        sessions: Arc<SessionRegistry>,
    }

    fn harness() -> Harness {
        let config = AuthConfig::default();
        let signer = Arc::new(JwtSigner::from_base64_secret(TEST_SECRET).unwrap());
        let accounts = Arc::new(MemoryAccountStore::new());
        let history = Arc::new(MemoryLoginHistoryStore::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&signer)));
        let tokens = Arc::new(TokenService::new(Arc::clone(&signer), &config));

        let throttle = AttemptThrottle::new(cache.clone() as Arc<dyn CacheStore>, &config);
        let anomaly = AnomalyDetector::new(
            accounts.clone() as Arc<dyn AccountStore>,
            history.clone() as Arc<dyn LoginHistoryStore>,
            cache.clone() as Arc<dyn CacheStore>,
            &config,
        );
        let service = LoginService::new(
            accounts.clone() as Arc<dyn AccountStore>,
            history.clone() as Arc<dyn LoginHistoryStore>,
            throttle,
            anomaly,
            sessions.clone(),
            tokens,
        );

        Harness {
            service,
            accounts,
            history,
            cache,
            sessions,
        }
    }

    fn seed_account(harness: &Harness, id: &str) {
        harness.accounts.insert(AccountRecord {
            account_id: id.to_string(),
            password_hash: password_hash().to_string(),
            roles: vec!["USER".to_string()],
            locked: false,
            dormant: false,
            withdrawn: false,
            requires_step_up: false,
            email: Some(format!("{id}@example.com")),
            phone_number: Some("010-0000-0000".to_string()),
            birth_date: Some("19900101".to_string()),
            last_login_at: None,
        });
    }

    fn request(id: &str, password: &str) -> LoginRequest {
        LoginRequest {
            account_id: id.to_string(),
            password: password.to_string(),
            force: false,
            ip_address: "203.0.113.1".to_string(),
            country: Some("KR".to_string()),
        }
    }

    async fn seed_known_country(harness: &Harness, id: &str, country: &str) {
        harness
            .service
            .anomaly
            .remember_location(id, country)
            .await;
    }

    // -------------------------------------------------------------------------
    // Scenario A: clean first login
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn clean_login_succeeds_with_full_side_effects() {
        let harness = harness();
        seed_account(&harness, "u1");
        seed_known_country(&harness, "u1", "KR").await;

        let outcome = harness.service.login(&request("u1", PASSWORD)).await.unwrap();

        let LoginOutcome::Success {
            access_token,
            refresh_token,
            profile_incomplete,
        } = outcome
        else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(!profile_incomplete);
        assert_ne!(access_token, refresh_token);

        // New active session holds the access token.
        assert_eq!(
            harness.sessions.active_token("u1").as_deref(),
            Some(access_token.as_str())
        );
        // History appended, attempt counter absent, last login touched.
        assert_eq!(harness.history.len(), 1);
        assert_eq!(harness.cache.get("login:attempt:u1").await.unwrap(), None);
        let stored = harness.accounts.find("u1").await.unwrap().unwrap();
        assert!(stored.last_login_at.is_some());

        // The issued token authenticates.
        let context = harness.service.authenticate(&access_token).unwrap();
        assert_eq!(context.subject, "u1");
        assert_eq!(context.roles, vec!["USER".to_string()]);
    }

    #[tokio::test]
    async fn blank_profile_fields_are_reported() {
        let harness = harness();
        seed_account(&harness, "u1");
        harness.accounts.insert(AccountRecord {
            phone_number: None,
            ..harness.accounts.find("u1").await.unwrap().unwrap()
        });
        seed_known_country(&harness, "u1", "KR").await;

        let outcome = harness.service.login(&request("u1", PASSWORD)).await.unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::Success {
                profile_incomplete: true,
                ..
            }
        ));
    }

    // -------------------------------------------------------------------------
    // Scenario B: duplicate login and force
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn second_login_requires_force_and_revokes_the_first() {
        let harness = harness();
        seed_account(&harness, "u1");
        seed_known_country(&harness, "u1", "KR").await;

        let first = harness.service.login(&request("u1", PASSWORD)).await.unwrap();
        let LoginOutcome::Success {
            access_token: first_token,
            ..
        } = first
        else {
            panic!("expected success");
        };

        // Without force: distinguishable response, nothing touched.
        let second = harness.service.login(&request("u1", PASSWORD)).await.unwrap();
        assert_eq!(second, LoginOutcome::DuplicateLogin);
        assert_eq!(second.reason(), "DUPLICATE_LOGIN");
        assert_eq!(harness.history.len(), 1);

        // With force: success, and the first token is now revoked.
        let mut forced = request("u1", PASSWORD);
        forced.force = true;
        let third = harness.service.login(&forced).await.unwrap();
        assert!(matches!(third, LoginOutcome::Success { .. }));

        assert!(matches!(
            harness.service.authenticate(&first_token),
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn duplicate_check_short_circuits_before_credentials() {
        let harness = harness();
        seed_account(&harness, "u1");
        seed_known_country(&harness, "u1", "KR").await;
        harness.service.login(&request("u1", PASSWORD)).await.unwrap();

        // Wrong password, but the duplicate check answers first and the
        // attempt counter stays untouched.
        let outcome = harness.service.login(&request("u1", "wrong")).await.unwrap();
        assert_eq!(outcome, LoginOutcome::DuplicateLogin);
        assert_eq!(harness.cache.get("login:attempt:u1").await.unwrap(), None);
    }

    // -------------------------------------------------------------------------
    // Scenario C: brute-force lockout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn five_failures_block_even_the_correct_password() {
        let harness = harness();
        seed_account(&harness, "u2");
        seed_known_country(&harness, "u2", "KR").await;

        for _ in 0..5 {
            let outcome = harness.service.login(&request("u2", "wrong")).await.unwrap();
            assert!(matches!(outcome, LoginOutcome::InvalidCredentials { .. }));
        }

        let outcome = harness.service.login(&request("u2", PASSWORD)).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Blocked);
        assert!(harness.sessions.active_token("u2").is_none());
    }

    #[tokio::test]
    async fn captcha_is_demanded_after_three_failures() {
        let harness = harness();
        seed_account(&harness, "u2");

        for expected in [false, false, true, true] {
            let outcome = harness.service.login(&request("u2", "wrong")).await.unwrap();
            assert_eq!(
                outcome,
                LoginOutcome::InvalidCredentials {
                    captcha_required: expected
                }
            );
        }
    }

    #[tokio::test]
    async fn unknown_and_withdrawn_accounts_look_like_bad_passwords() {
        let harness = harness();
        seed_account(&harness, "gone");
        harness.accounts.insert(AccountRecord {
            withdrawn: true,
            ..harness.accounts.find("gone").await.unwrap().unwrap()
        });

        let unknown = harness.service.login(&request("ghost", PASSWORD)).await.unwrap();
        let withdrawn = harness.service.login(&request("gone", PASSWORD)).await.unwrap();
        assert_eq!(
            unknown,
            LoginOutcome::InvalidCredentials {
                captcha_required: false
            }
        );
        assert_eq!(unknown, withdrawn);
    }

    #[tokio::test]
    async fn success_resets_an_accumulating_streak() {
        let harness = harness();
        seed_account(&harness, "u2");
        seed_known_country(&harness, "u2", "KR").await;

        for _ in 0..4 {
            harness.service.login(&request("u2", "wrong")).await.unwrap();
        }
        let outcome = harness.service.login(&request("u2", PASSWORD)).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Success { .. }));

        // The streak is gone: four fresh failures still do not block.
        let mut forced = request("u2", "wrong");
        forced.force = true;
        for _ in 0..4 {
            let outcome = harness.service.login(&forced).await.unwrap();
            assert!(matches!(outcome, LoginOutcome::InvalidCredentials { .. }));
        }
        let mut good = request("u2", PASSWORD);
        good.force = true;
        assert!(matches!(
            harness.service.login(&good).await.unwrap(),
            LoginOutcome::Success { .. }
        ));
    }

    // -------------------------------------------------------------------------
    // Administrative lock and dormancy
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn locked_accounts_are_refused_after_the_credential_check() {
        let harness = harness();
        seed_account(&harness, "u3");
        harness.accounts.insert(AccountRecord {
            locked: true,
            ..harness.accounts.find("u3").await.unwrap().unwrap()
        });

        let outcome = harness.service.login(&request("u3", PASSWORD)).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Blocked);
        assert!(harness.sessions.active_token("u3").is_none());

        // A wrong password on a locked account still reads as a plain
        // credential failure.
        let outcome = harness.service.login(&request("u3", "wrong")).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::InvalidCredentials { .. }));
    }

    #[tokio::test]
    async fn dormant_accounts_are_held_without_side_effects() {
        let harness = harness();
        seed_account(&harness, "u3");
        harness.accounts.insert(AccountRecord {
            dormant: true,
            ..harness.accounts.find("u3").await.unwrap().unwrap()
        });

        let outcome = harness.service.login(&request("u3", PASSWORD)).await.unwrap();
        assert_eq!(outcome, LoginOutcome::DormantHold);

        assert!(harness.sessions.active_token("u3").is_none());
        assert_eq!(harness.history.len(), 0);
        assert_eq!(harness.cache.get("login:attempt:u3").await.unwrap(), None);
    }

    // -------------------------------------------------------------------------
    // Scenario D: anomalous origin and the sticky flag
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn unseen_country_demands_step_up_and_sticks() {
        let harness = harness();
        seed_account(&harness, "u4");
        seed_known_country(&harness, "u4", "KR").await;

        let mut from_abroad = request("u4", PASSWORD);
        from_abroad.country = Some("BR".to_string());
        let outcome = harness.service.login(&from_abroad).await.unwrap();
        assert_eq!(outcome, LoginOutcome::StepUpRequired);

        // No session, no tokens, no history.
        assert!(harness.sessions.active_token("u4").is_none());
        assert_eq!(harness.history.len(), 0);

        // Sticky: the previously seen country is refused too, until the
        // flag is cleared out of band.
        let outcome = harness.service.login(&request("u4", PASSWORD)).await.unwrap();
        assert_eq!(outcome, LoginOutcome::StepUpRequired);

        harness
            .accounts
            .set_requires_step_up("u4", false)
            .await
            .unwrap();
        let outcome = harness.service.login(&request("u4", PASSWORD)).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Success { .. }));
    }

    // -------------------------------------------------------------------------
    // Authenticate / refresh / logout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn authenticate_rejects_garbage_and_expired_tokens() {
        let harness = harness();

        assert!(matches!(
            harness.service.authenticate("not-a-jwt"),
            Err(AuthError::InvalidToken { .. })
        ));

        let expired = harness
            .service
            .tokens
            .issue("u1", vec![], time::Duration::minutes(-5))
            .unwrap();
        assert!(matches!(
            harness.service.authenticate(&expired),
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn refresh_mints_a_new_active_session() {
        let harness = harness();
        seed_account(&harness, "u1");
        seed_known_country(&harness, "u1", "KR").await;

        let LoginOutcome::Success {
            access_token,
            refresh_token,
            ..
        } = harness.service.login(&request("u1", PASSWORD)).await.unwrap()
        else {
            panic!("expected success");
        };

        let new_access = harness.service.refresh(&refresh_token).unwrap();
        assert!(harness.service.authenticate(&new_access).is_ok());

        // The refreshed token superseded the original one.
        assert!(matches!(
            harness.service.authenticate(&access_token),
            Err(AuthError::TokenRevoked)
        ));
        assert_eq!(
            harness.sessions.active_token("u1").as_deref(),
            Some(new_access.as_str())
        );
    }

    #[tokio::test]
    async fn logout_kills_access_and_refresh_alike() {
        let harness = harness();
        seed_account(&harness, "u1");
        seed_known_country(&harness, "u1", "KR").await;

        let LoginOutcome::Success {
            access_token,
            refresh_token,
            ..
        } = harness.service.login(&request("u1", PASSWORD)).await.unwrap()
        else {
            panic!("expected success");
        };

        harness.service.logout("u1", &access_token, &refresh_token);

        assert!(matches!(
            harness.service.authenticate(&access_token),
            Err(AuthError::TokenRevoked)
        ));
        // The refresh token cannot resurrect the session either.
        assert!(matches!(
            harness.service.refresh(&refresh_token),
            Err(AuthError::TokenRevoked)
        ));
        assert!(!harness.sessions.is_duplicate_login("u1"));
    }
}
