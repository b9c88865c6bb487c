//! Bearer token authentication extractor.
//!
//! The per-request filter: every authenticated route extracts
//! [`BearerAuth`], which consults the session registry's revoked set
//! first and the token verifier second before admitting the request.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use tably_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(auth): BearerAuth) -> String {
//!     format!("Hello, {}!", auth.subject)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::login::{AuthContext, authenticate_bearer};
use crate::session::SessionRegistry;
use crate::token::service::TokenService;

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer token authentication.
///
/// Include in the application state and expose to the extractor via
/// `FromRef`. Both collaborators are constructor-injected; the filter
/// holds no state of its own.
#[derive(Clone)]
pub struct AuthState {
    /// Token service for strict verification.
    pub tokens: Arc<TokenService>,

    /// Session registry for the revocation check.
    pub sessions: Arc<SessionRegistry>,
}

impl AuthState {
    /// Creates a new auth state.
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, sessions: Arc<SessionRegistry>) -> Self {
        Self { tokens, sessions }
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Axum extractor that validates bearer tokens and yields the principal.
///
/// This extractor:
/// 1. Extracts the `Authorization: Bearer <token>` header
/// 2. Rejects tokens in the revoked set, whatever their embedded expiry
/// 3. Strictly verifies signature, structure, and expiry
///
/// # Errors
///
/// Returns [`AuthError`] (which implements `IntoResponse`) if the header
/// is missing or malformed, or the token is revoked, expired, or
/// invalid. All variants render as 401 with a stable error code; the
/// end user sees no distinction between "expired" and "revoked", the
/// logs do.
pub struct BearerAuth(pub AuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::unauthorized("Missing bearer token"))?;

        let context = authenticate_bearer(&auth_state.tokens, &auth_state.sessions, token)
            .inspect_err(|error| {
                tracing::debug!(%error, "bearer token rejected");
            })?;

        tracing::debug!(subject = %context.subject, "bearer token accepted");
        Ok(BearerAuth(context))
    }
}
