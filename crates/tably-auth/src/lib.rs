//! # tably-auth
//!
//! Authentication and session integrity for the Tably backend.
//!
//! This crate provides:
//! - Bearer token issuance and validation (access + refresh)
//! - A single-active-session-per-account registry with token revocation
//! - Brute-force attempt throttling with temporary lockout
//! - Geographic login anomaly detection with step-up escalation
//! - The login orchestrator tying the above together
//! - Axum middleware for the per-request bearer check
//!
//! ## Overview
//!
//! The login orchestrator sequences credential validation, the dormancy
//! check, and anomaly detection, then registers the new session —
//! implicitly revoking any previous one — and mints the token pair.
//! Every subsequent request passes the [`middleware::BearerAuth`]
//! filter, which consults the session registry's revoked set before
//! trusting the token verifier.
//!
//! External collaborators (the account store, the durable login
//! history, the shared cache service) are consumed through the traits
//! in [`store`]; in-memory backends back tests and single-process runs.
//!
//! ## Modules
//!
//! - [`config`] - lifetimes and thresholds
//! - [`token`] - token issuance and verification
//! - [`throttle`] - failed-attempt counter and lockout
//! - [`anomaly`] - geographic anomaly detection
//! - [`session`] - active sessions and the revoked-token set
//! - [`login`] - the login orchestrator
//! - [`middleware`] - the per-request bearer filter
//! - [`store`] - collaborator storage traits
//! - [`password`] - Argon2id verification helpers

pub mod anomaly;
pub mod config;
pub mod error;
pub mod login;
pub mod middleware;
pub mod password;
pub mod session;
pub mod store;
pub mod throttle;
pub mod token;

pub use anomaly::{AnomalyDetector, AnomalyVerdict};
pub use config::AuthConfig;
pub use error::AuthError;
pub use login::{AuthContext, LoginOutcome, LoginRequest, LoginService};
pub use middleware::{AuthState, BearerAuth};
pub use session::SessionRegistry;
pub use store::{
    AccountRecord, AccountStore, CacheStore, LoginHistoryRecord, LoginHistoryStore,
    MemoryAccountStore, MemoryCacheStore, MemoryLoginHistoryStore,
};
pub use throttle::AttemptThrottle;
pub use token::{JwtSigner, TokenService};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
