//! Session registry: the single-active-session policy and the
//! revoked-token set.
//!
//! At most one access token per account is ever "the active session".
//! Registering a new token for an account revokes the previous one in
//! the same atomic step, so two live tokens for one account are never
//! observable. Revoked tokens stay blacklisted until their own embedded
//! expiry has passed; only then does the periodic compaction sweep drop
//! them. Removing an entry any earlier would let a revoked but still
//! well-signed token back in.
//!
//! Both maps are process-wide shared state behind sharded concurrent
//! maps, constructed explicitly and injected where needed. Scaling past
//! one process means relocating them into the shared cache service the
//! throttle already uses; the registry API is the seam for that move.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::token::jwt::JwtSigner;

/// Registry of active sessions and revoked tokens.
pub struct SessionRegistry {
    /// Account identifier → the one currently valid access token.
    active: DashMap<String, String>,
    /// Tokens rejected regardless of cryptographic validity.
    revoked: DashMap<String, ()>,
    /// Signer used to read embedded expiries during compaction.
    signer: Arc<JwtSigner>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    ///
    /// A cold start means nobody is logged in yet, which is safe; all
    /// registry state is reconstructible from zero.
    #[must_use]
    pub fn new(signer: Arc<JwtSigner>) -> Self {
        Self {
            active: DashMap::new(),
            revoked: DashMap::new(),
            signer,
        }
    }

    /// Returns `true` if the account already has a live session.
    ///
    /// Used to offer the caller a "force login" confirmation before
    /// anything destructive happens.
    #[must_use]
    pub fn is_duplicate_login(&self, account_id: &str) -> bool {
        self.active.contains_key(account_id)
    }

    /// Registers `token` as the account's active session, revoking any
    /// session it supersedes.
    ///
    /// The revoke-then-store sequence runs under the account's map entry
    /// lock: registrations for the same account serialize here, and the
    /// superseded token is in the revoked set before this call returns.
    pub fn register_session(&self, account_id: &str, token: &str) {
        match self.active.entry(account_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let superseded = occupied.get().clone();
                if superseded != token {
                    self.revoked.insert(superseded, ());
                    tracing::debug!(account_id = %account_id, "superseded previous session");
                }
                occupied.insert(token.to_string());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(token.to_string());
            }
        }
    }

    /// Returns `true` if the token has been revoked.
    ///
    /// Consulted on every authenticated request before the verifier is
    /// trusted.
    #[must_use]
    pub fn is_revoked(&self, token: &str) -> bool {
        self.revoked.contains_key(token)
    }

    /// Ends a session: drops the active entry and blacklists both the
    /// access and the refresh token.
    ///
    /// The refresh token is blacklisted too so a logged-out session
    /// cannot resurrect itself through the refresh endpoint. The active
    /// entry is only dropped when it still holds the presented access
    /// token; a stale logout must not kill a newer session.
    pub fn logout(&self, account_id: &str, access_token: &str, refresh_token: &str) {
        self.active
            .remove_if(account_id, |_, active| active.as_str() == access_token);
        self.revoked.insert(access_token.to_string(), ());
        self.revoked.insert(refresh_token.to_string(), ());
        tracing::debug!(account_id = %account_id, "session logged out");
    }

    /// Sweeps the revoked set, dropping every token whose embedded
    /// expiry has passed. Returns the number of entries removed.
    ///
    /// Reads expiries with the lenient decoder; tokens the signer cannot
    /// parse at all are dropped too, since they can never pass
    /// verification in the first place.
    pub fn compact(&self) -> usize {
        let before = self.revoked.len();
        let now = OffsetDateTime::now_utc();

        self.revoked
            .retain(|token, _| match self.signer.decode_allow_expired(token) {
                Ok(claims) => claims.expires_at().is_ok_and(|expiry| expiry > now),
                Err(_) => false,
            });

        let removed = before.saturating_sub(self.revoked.len());
        if removed > 0 {
            tracing::info!(removed, remaining = self.revoked.len(), "compacted revoked-token set");
        }
        removed
    }

    /// The account's current access token, if a session is live.
    #[must_use]
    pub fn active_token(&self, account_id: &str) -> Option<String> {
        self.active.get(account_id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::jwt::TokenClaims;
    use time::Duration;

    const TEST_SECRET: &str = "dGFibHktdGVzdC1zaWduaW5nLWtleS0zMi1ieXRlcyEh";

    fn signer() -> Arc<JwtSigner> {
        Arc::new(JwtSigner::from_base64_secret(TEST_SECRET).unwrap())
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(signer())
    }

    fn signed_token(signer: &JwtSigner, subject: &str, ttl: Duration) -> String {
        signer
            .encode(&TokenClaims::new(subject, vec![], ttl))
            .unwrap()
    }

    #[test]
    fn first_registration_is_not_a_duplicate() {
        let registry = registry();
        assert!(!registry.is_duplicate_login("u1"));

        registry.register_session("u1", "token-a");
        assert!(registry.is_duplicate_login("u1"));
        assert_eq!(registry.active_token("u1").as_deref(), Some("token-a"));
        assert!(!registry.is_revoked("token-a"));
    }

    #[test]
    fn registration_revokes_the_superseded_token() {
        let registry = registry();
        registry.register_session("u1", "token-a");
        registry.register_session("u1", "token-b");

        assert_eq!(registry.active_token("u1").as_deref(), Some("token-b"));
        assert!(registry.is_revoked("token-a"));
        assert!(!registry.is_revoked("token-b"));
    }

    #[test]
    fn logout_blacklists_both_tokens() {
        let registry = registry();
        registry.register_session("u1", "access-a");
        registry.logout("u1", "access-a", "refresh-a");

        assert!(!registry.is_duplicate_login("u1"));
        assert!(registry.is_revoked("access-a"));
        assert!(registry.is_revoked("refresh-a"));
    }

    #[test]
    fn stale_logout_does_not_kill_a_newer_session() {
        let registry = registry();
        registry.register_session("u1", "access-a");
        registry.register_session("u1", "access-b");

        // Logout presented with the superseded token.
        registry.logout("u1", "access-a", "refresh-a");

        assert_eq!(registry.active_token("u1").as_deref(), Some("access-b"));
        assert!(!registry.is_revoked("access-b"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_registrations_leave_exactly_one_session() {
        let registry = Arc::new(registry());
        let tokens: Vec<String> = (0..64).map(|i| format!("token-{i}")).collect();

        let mut handles = Vec::new();
        for token in tokens.clone() {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.register_session("u1", &token);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let survivor = registry.active_token("u1").unwrap();
        assert!(!registry.is_revoked(&survivor));

        // Every token that is not the survivor ended up in the revoked set.
        let revoked = tokens.iter().filter(|t| registry.is_revoked(t)).count();
        assert_eq!(revoked, tokens.len() - 1);
    }

    #[test]
    fn compaction_drops_only_past_expiry_tokens() {
        let signer = signer();
        let registry = SessionRegistry::new(Arc::clone(&signer));

        let expired = signed_token(&signer, "u1", Duration::minutes(-10));
        let live = signed_token(&signer, "u2", Duration::minutes(10));

        registry.register_session("u1", &expired);
        registry.register_session("u1", "replacement-1");
        registry.register_session("u2", &live);
        registry.register_session("u2", "replacement-2");
        assert!(registry.is_revoked(&expired));
        assert!(registry.is_revoked(&live));

        let removed = registry.compact();
        assert_eq!(removed, 1);
        assert!(!registry.is_revoked(&expired));
        assert!(registry.is_revoked(&live));
    }

    #[test]
    fn compaction_drops_unparseable_entries() {
        let registry = registry();
        registry.register_session("u1", "never-a-jwt");
        registry.register_session("u1", "another-token");
        assert!(registry.is_revoked("never-a-jwt"));

        let removed = registry.compact();
        assert_eq!(removed, 1);
        assert!(!registry.is_revoked("never-a-jwt"));
    }

    #[test]
    fn revocation_is_independent_of_embedded_expiry() {
        let signer = signer();
        let registry = SessionRegistry::new(Arc::clone(&signer));

        // Well-signed, unexpired token: revocation must still stick.
        let live = signed_token(&signer, "u1", Duration::minutes(10));
        registry.register_session("u1", &live);
        registry.register_session("u1", "newer-token");

        assert!(registry.is_revoked(&live));
        assert_eq!(registry.compact(), 0);
        assert!(registry.is_revoked(&live));
    }
}
