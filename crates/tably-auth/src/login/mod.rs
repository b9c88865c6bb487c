//! Login orchestration.
//!
//! - [`service`] - the state machine sequencing duplicate-login check,
//!   credential validation, dormancy, anomaly detection, and token
//!   issuance
//!
//! Terminal login results are values, not errors: the HTTP layer needs
//! to render a specific message per variant, so they travel as a tagged
//! [`LoginOutcome`] rather than a generic exception type.

pub mod service;

pub use service::LoginService;

use crate::AuthResult;
use crate::error::AuthError;
use crate::session::SessionRegistry;
use crate::token::service::TokenService;

/// A login attempt as received from the HTTP layer.
///
/// `country` is the origin country resolved from the client IP by the
/// edge; resolution is best effort and `None` when it failed.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Account identifier.
    pub account_id: String,
    /// The submitted secret, already transport-decrypted by the edge.
    pub password: String,
    /// Set on resubmission after a `DuplicateLogin` response to confirm
    /// that the previous session should be terminated.
    pub force: bool,
    /// Client IP address.
    pub ip_address: String,
    /// Origin country code, when geo resolution succeeded.
    pub country: Option<String>,
}

/// The result of a login attempt.
///
/// Every variant is terminal and mutually exclusive; the orchestrator
/// never retries. Retries, where they make sense, belong to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Authentication succeeded; a new session is registered.
    Success {
        /// Short-lived bearer token authorizing individual requests.
        access_token: String,
        /// Long-lived token, only good for minting a new access token.
        refresh_token: String,
        /// The client should prompt for profile completion.
        profile_incomplete: bool,
    },

    /// The account already has a live session. Nothing was touched;
    /// resubmit with `force` to supersede it.
    DuplicateLogin,

    /// Unknown account, withdrawn account, or wrong password — the
    /// three are deliberately indistinguishable.
    InvalidCredentials {
        /// The client must solve a captcha before retrying.
        captcha_required: bool,
    },

    /// Too many consecutive failures; blocked until the lockout window
    /// lapses.
    Blocked,

    /// The account is dormant and must be reactivated out of band.
    DormantHold,

    /// The login origin is anomalous; step-up verification required.
    StepUpRequired,
}

impl LoginOutcome {
    /// Stable wire code for the outcome, rendered by the HTTP layer.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Success { .. } => "SUCCESS",
            Self::DuplicateLogin => "DUPLICATE_LOGIN",
            Self::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            Self::Blocked => "ACCOUNT_BLOCKED",
            Self::DormantHold => "DORMANT_ACCOUNT",
            Self::StepUpRequired => "STEP_UP_REQUIRED",
        }
    }
}

/// An authenticated request principal.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    /// Account identifier from the token's subject claim.
    pub subject: String,
    /// Roles embedded at token issue time.
    pub roles: Vec<String>,
}

/// Validates a bearer token against the revoked set and the verifier.
///
/// The blacklist is consulted first: a revoked token is rejected even
/// when its signature and expiry would pass. Shared by the request-path
/// middleware and [`LoginService::authenticate`].
///
/// # Errors
/// Returns `TokenRevoked`, `TokenExpired`, or `InvalidToken`.
pub fn authenticate_bearer(
    tokens: &TokenService,
    sessions: &SessionRegistry,
    bearer: &str,
) -> AuthResult<AuthContext> {
    if sessions.is_revoked(bearer) {
        return Err(AuthError::TokenRevoked);
    }

    let verified = tokens.verify(bearer)?;
    Ok(AuthContext {
        subject: verified.subject,
        roles: verified.roles,
    })
}
