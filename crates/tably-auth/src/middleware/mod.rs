//! HTTP middleware for request authentication.
//!
//! - [`auth`] - the bearer-token extractor consulted on every
//!   authenticated request

pub mod auth;

pub use auth::{AuthState, BearerAuth};
