//! JWT encoding and validation.
//!
//! Bearer tokens are self-contained HS256 JWTs carrying the account
//! identifier, the account's roles, and the issue/expiry timestamps.
//! Access and refresh tokens share this structure; only the lifetime
//! differs.
//!
//! The signer exposes two decoders:
//!
//! - [`JwtSigner::decode`] — strict; rejects bad signatures, malformed
//!   input, and expired tokens. Used for every authorization decision.
//! - [`JwtSigner::decode_allow_expired`] — lenient; validates the
//!   signature but ignores expiry. Used only by the revoked-token sweep,
//!   which must read expiries that have already passed.

use base64::{Engine, engine::general_purpose::STANDARD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Minimum decoded secret length for HS256 signing.
const MIN_SECRET_BYTES: usize = 32;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// The token is structurally malformed or cannot be parsed.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of why the token cannot be parsed.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The signing key is unusable.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a validation error (expired, bad
    /// signature, unparseable input) as opposed to a key/configuration
    /// problem.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::InvalidSignature | Self::Malformed { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::malformed(err.to_string()),
        }
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject (account identifier).
    pub sub: String,

    /// The account's roles at issue time.
    pub roles: Vec<String>,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// Creates claims for `subject` expiring `ttl` from now.
    #[must_use]
    pub fn new(subject: impl Into<String>, roles: Vec<String>, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            sub: subject.into(),
            roles,
            iat: now,
            exp: now + ttl.whole_seconds(),
        }
    }

    /// The claim's expiry as an [`OffsetDateTime`].
    ///
    /// # Errors
    /// Returns `Malformed` if the embedded timestamp is out of range.
    pub fn expires_at(&self) -> Result<OffsetDateTime, JwtError> {
        OffsetDateTime::from_unix_timestamp(self.exp)
            .map_err(|e| JwtError::malformed(format!("exp out of range: {e}")))
    }
}

// ============================================================================
// Signer
// ============================================================================

/// HS256 signer shared by the token service and the session registry's
/// compaction sweep.
///
/// Thread-safe (`Send + Sync`); construct once and share via `Arc`.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtSigner {
    /// Creates a signer from a BASE64-encoded secret.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the secret is not valid BASE64 or decodes
    /// to fewer than 32 bytes. This is a startup-time failure; it is
    /// never retried.
    pub fn from_base64_secret(secret: &str) -> Result<Self, JwtError> {
        let key_bytes = STANDARD
            .decode(secret.trim())
            .map_err(|e| JwtError::invalid_key(format!("secret is not valid base64: {e}")))?;

        if key_bytes.len() < MIN_SECRET_BYTES {
            return Err(JwtError::invalid_key(format!(
                "secret must decode to at least {MIN_SECRET_BYTES} bytes, got {}",
                key_bytes.len()
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key_bytes),
            decoding_key: DecodingKey::from_secret(&key_bytes),
        })
    }

    /// Encodes claims into a signed JWT string.
    ///
    /// # Errors
    /// Returns an error only on signer misconfiguration.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and fully validates a token (signature and expiry).
    ///
    /// # Errors
    /// Returns `Expired`, `InvalidSignature`, or `Malformed`.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }

    /// Decodes a token validating the signature but ignoring expiry.
    ///
    /// Callers must not use the result to authorize anything; the only
    /// legitimate consumer is the blacklist compaction sweep, which needs
    /// the `exp` of tokens that are already past it.
    ///
    /// # Errors
    /// Returns `InvalidSignature` or `Malformed`.
    pub fn decode_allow_expired(&self, token: &str) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "dGFibHktdGVzdC1zaWduaW5nLWtleS0zMi1ieXRlcyEh";

    fn signer() -> JwtSigner {
        JwtSigner::from_base64_secret(TEST_SECRET).unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let signer = signer();
        let claims = TokenClaims::new("u1", vec!["USER".to_string()], Duration::minutes(15));

        let token = signer.encode(&claims).unwrap();
        let decoded = signer.decode(&token).unwrap();

        assert_eq!(decoded.sub, "u1");
        assert_eq!(decoded.roles, vec!["USER".to_string()]);
        assert_eq!(decoded.exp, claims.exp);
    }

    #[test]
    fn expired_token_rejected() {
        let signer = signer();
        let claims = TokenClaims::new("u1", vec![], Duration::minutes(-30));

        let token = signer.encode(&claims).unwrap();
        let result = signer.decode(&token);

        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn expired_token_readable_leniently() {
        let signer = signer();
        let claims = TokenClaims::new("u1", vec![], Duration::minutes(-30));
        let token = signer.encode(&claims).unwrap();

        let decoded = signer.decode_allow_expired(&token).unwrap();
        assert_eq!(decoded.sub, "u1");
        assert!(decoded.expires_at().unwrap() < OffsetDateTime::now_utc());
    }

    #[test]
    fn foreign_signature_rejected_even_leniently() {
        let signer = signer();
        let other =
            JwtSigner::from_base64_secret("b3RoZXItdGVzdC1zaWduaW5nLWtleS0zMi1ieXRlcyE=").unwrap();
        let claims = TokenClaims::new("u1", vec![], Duration::minutes(15));
        let token = other.encode(&claims).unwrap();

        assert!(matches!(
            signer.decode(&token),
            Err(JwtError::InvalidSignature)
        ));
        assert!(matches!(
            signer.decode_allow_expired(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let signer = signer();
        assert!(matches!(
            signer.decode("not-a-jwt"),
            Err(JwtError::Malformed { .. })
        ));
    }

    #[test]
    fn short_secret_rejected() {
        // "c2hvcnQ=" decodes to 5 bytes.
        let result = JwtSigner::from_base64_secret("c2hvcnQ=");
        assert!(matches!(result, Err(JwtError::InvalidKey { .. })));
    }

    #[test]
    fn invalid_base64_rejected() {
        let result = JwtSigner::from_base64_secret("!!not base64!!");
        assert!(matches!(result, Err(JwtError::InvalidKey { .. })));
    }
}
