//! Token service for issuing and verifying bearer tokens.
//!
//! Stateless apart from the signing key. Issues access tokens (short
//! lived, authorize individual requests) and refresh tokens (long lived,
//! only good for minting a new access token); the two differ in TTL
//! only, not structure.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::jwt::{JwtError, JwtSigner, TokenClaims};

/// The result of a successful strict verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Account identifier the token was issued to.
    pub subject: String,
    /// Roles embedded at issue time.
    pub roles: Vec<String>,
    /// When the token expires.
    pub expires_at: OffsetDateTime,
}

/// Service for issuing and verifying bearer tokens.
pub struct TokenService {
    signer: Arc<JwtSigner>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Creates a token service over a shared signer with lifetimes from
    /// the auth configuration.
    #[must_use]
    pub fn new(signer: Arc<JwtSigner>, config: &AuthConfig) -> Self {
        Self {
            signer,
            access_ttl: Duration::seconds(config.access_token_lifetime.as_secs() as i64),
            refresh_ttl: Duration::seconds(config.refresh_token_lifetime.as_secs() as i64),
        }
    }

    /// Issues a token for `subject` with an explicit TTL.
    ///
    /// # Errors
    /// Fails only on signer misconfiguration; never retried.
    pub fn issue(
        &self,
        subject: &str,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims::new(subject, roles, ttl);
        self.signer
            .encode(&claims)
            .map_err(|e| AuthError::configuration(format!("token signing failed: {e}")))
    }

    /// Issues an access token with the configured short lifetime.
    ///
    /// # Errors
    /// Fails only on signer misconfiguration.
    pub fn issue_access(&self, subject: &str, roles: Vec<String>) -> Result<String, AuthError> {
        self.issue(subject, roles, self.access_ttl)
    }

    /// Issues a refresh token with the configured long lifetime.
    ///
    /// # Errors
    /// Fails only on signer misconfiguration.
    pub fn issue_refresh(&self, subject: &str, roles: Vec<String>) -> Result<String, AuthError> {
        self.issue(subject, roles, self.refresh_ttl)
    }

    /// Strictly verifies a token: signature, structure, and expiry.
    ///
    /// # Errors
    /// Returns `TokenExpired` for well-signed but expired tokens and
    /// `InvalidToken` for everything else. Callers on the request path
    /// must treat both as a uniform rejection toward the end user.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let claims = self.signer.decode(token).map_err(|e| match e {
            JwtError::Expired => AuthError::TokenExpired,
            other => AuthError::invalid_token(other.to_string()),
        })?;

        let expires_at = claims
            .expires_at()
            .map_err(|e| AuthError::invalid_token(e.to_string()))?;

        Ok(VerifiedToken {
            subject: claims.sub,
            roles: claims.roles,
            expires_at,
        })
    }

    /// Extracts the subject without a validity check.
    ///
    /// Returns `None` for tokens this signer did not produce. Never use
    /// this to authorize a request.
    #[must_use]
    pub fn subject_of(&self, token: &str) -> Option<String> {
        self.signer
            .decode_allow_expired(token)
            .ok()
            .map(|claims| claims.sub)
    }

    /// Reads the embedded expiry, ignoring whether it has passed.
    ///
    /// This is the lenient claim reader used by the revoked-token sweep.
    /// Returns `None` for tokens this signer cannot parse.
    #[must_use]
    pub fn expiry_of(&self, token: &str) -> Option<OffsetDateTime> {
        self.signer
            .decode_allow_expired(token)
            .ok()
            .and_then(|claims| claims.expires_at().ok())
    }

    /// The configured access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// The configured refresh token lifetime.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "dGFibHktdGVzdC1zaWduaW5nLWtleS0zMi1ieXRlcyEh";

    fn service() -> TokenService {
        let signer = Arc::new(JwtSigner::from_base64_secret(TEST_SECRET).unwrap());
        TokenService::new(signer, &AuthConfig::default())
    }

    #[test]
    fn issue_and_verify_access_token() {
        let service = service();
        let token = service
            .issue_access("u1", vec!["USER".to_string()])
            .unwrap();

        let verified = service.verify(&token).unwrap();
        assert_eq!(verified.subject, "u1");
        assert_eq!(verified.roles, vec!["USER".to_string()]);
        assert!(verified.expires_at > OffsetDateTime::now_utc());
    }

    #[test]
    fn refresh_token_outlives_access_token() {
        let service = service();
        let access = service.issue_access("u1", vec![]).unwrap();
        let refresh = service.issue_refresh("u1", vec![]).unwrap();

        let access_exp = service.expiry_of(&access).unwrap();
        let refresh_exp = service.expiry_of(&refresh).unwrap();
        assert!(refresh_exp > access_exp);
    }

    #[test]
    fn expired_token_maps_to_token_expired() {
        let service = service();
        let token = service.issue("u1", vec![], Duration::minutes(-5)).unwrap();

        assert!(matches!(service.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn malformed_token_maps_to_invalid_token() {
        let service = service();
        assert!(matches!(
            service.verify("garbage"),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn expiry_readable_after_expiry() {
        let service = service();
        let token = service.issue("u1", vec![], Duration::minutes(-5)).unwrap();

        let exp = service.expiry_of(&token).unwrap();
        assert!(exp < OffsetDateTime::now_utc());
        assert_eq!(service.subject_of(&token).as_deref(), Some("u1"));
    }

    #[test]
    fn foreign_tokens_yield_no_claims() {
        let service = service();
        assert_eq!(service.subject_of("garbage"), None);
        assert_eq!(service.expiry_of("garbage"), None);
    }
}
