//! Authentication error types.
//!
//! This module defines all error types that can occur during login,
//! token verification, and session management. Terminal login *outcomes*
//! (wrong password, lockout, duplicate login) are not errors — they are
//! variants of [`crate::login::LoginOutcome`]. `AuthError` covers the
//! request-path rejections and infrastructure failures.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Errors that can occur during authentication and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request lacks valid authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The bearer token is malformed, has a bad signature, or cannot be parsed.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The bearer token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The bearer token has been explicitly revoked.
    ///
    /// A revoked token is rejected even when its signature and expiry
    /// would otherwise pass verification.
    #[error("Token revoked")]
    TokenRevoked,

    /// An error occurred while reaching an external store on a critical path.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid (e.g. a bad signing secret).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a token-related rejection.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TokenRevoked
        )
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = error_details(&self);

        let body = json!({
            "error": code,
            "message": message,
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        if status == StatusCode::UNAUTHORIZED {
            let www_auth = format!("Bearer error=\"{code}\", error_description=\"{message}\"");
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Extracts error details from an `AuthError`.
///
/// Returns (HTTP status, wire error code, message). Server-side failures
/// deliberately map to an opaque message; the detail stays in the logs.
fn error_details(error: &AuthError) -> (StatusCode, &'static str, String) {
    match error {
        AuthError::Unauthorized { message } => {
            (StatusCode::UNAUTHORIZED, "unauthorized", message.clone())
        }
        AuthError::InvalidToken { message } => {
            (StatusCode::UNAUTHORIZED, "invalid_token", message.clone())
        }
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "token_expired",
            "Token has expired".to_string(),
        ),
        AuthError::TokenRevoked => (
            StatusCode::UNAUTHORIZED,
            "token_revoked",
            "Token has been revoked".to_string(),
        ),
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_are_client_errors() {
        assert!(AuthError::TokenExpired.is_token_error());
        assert!(AuthError::TokenRevoked.is_token_error());
        assert!(AuthError::invalid_token("garbage").is_token_error());
        assert!(!AuthError::storage("down").is_token_error());
    }

    #[test]
    fn server_errors_are_classified() {
        assert!(AuthError::storage("down").is_server_error());
        assert!(AuthError::configuration("bad secret").is_server_error());
        assert!(!AuthError::TokenRevoked.is_server_error());
    }

    #[test]
    fn storage_errors_do_not_leak_detail() {
        let (status, code, message) = error_details(&AuthError::storage("dsn=postgres://secret"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_error");
        assert!(!message.contains("secret"));
    }
}
