//! HTTP handlers for the auth endpoints.
//!
//! Thin translation between the wire DTOs and the login orchestrator;
//! no auth logic lives here. The client IP and its resolved origin
//! country arrive as edge-injected headers.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tably_auth::{AuthError, BearerAuth, LoginOutcome, LoginRequest};

use crate::state::AppState;

/// Header carrying the client IP, set by the edge proxy.
const CLIENT_IP_HEADER: &str = "x-forwarded-for";
/// Header carrying the geo-resolved origin country, set by the edge.
const GEO_COUNTRY_HEADER: &str = "x-geo-country";

// =============================================================================
// DTOs
// =============================================================================

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    /// Account identifier.
    pub account_id: String,
    /// The submitted secret.
    pub password: String,
    /// Confirm termination of an existing session.
    #[serde(default)]
    pub force: bool,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Stable outcome code, e.g. `DUPLICATE_LOGIN`.
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_incomplete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_required: Option<bool>,
}

/// Refresh request body.
#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    /// The refresh token obtained at login.
    pub refresh_token: String,
}

/// Refresh response body.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// The newly minted access token.
    pub access_token: String,
}

/// Logout request body.
#[derive(Debug, Deserialize)]
pub struct LogoutBody {
    /// The refresh token to blacklist along with the access token.
    pub refresh_token: String,
}

/// Principal probe response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Authenticated account identifier.
    pub account_id: String,
    /// Roles embedded in the bearer token.
    pub roles: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Result<Response, AuthError> {
    let request = LoginRequest {
        account_id: body.account_id,
        password: body.password,
        force: body.force,
        ip_address: client_ip(&headers),
        country: header_value(&headers, GEO_COUNTRY_HEADER),
    };

    let outcome = state.login.login(&request).await?;
    Ok(login_response(outcome))
}

/// Maps a login outcome to its HTTP rendering.
fn login_response(outcome: LoginOutcome) -> Response {
    let reason = outcome.reason();
    match outcome {
        LoginOutcome::Success {
            access_token,
            refresh_token,
            profile_incomplete,
        } => (
            StatusCode::OK,
            Json(LoginResponse {
                reason,
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                profile_incomplete: Some(profile_incomplete),
                captcha_required: None,
            }),
        )
            .into_response(),
        LoginOutcome::DuplicateLogin => {
            (StatusCode::CONFLICT, Json(empty_response(reason))).into_response()
        }
        LoginOutcome::InvalidCredentials { captcha_required } => (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                captcha_required: Some(captcha_required),
                ..empty_response(reason)
            }),
        )
            .into_response(),
        LoginOutcome::Blocked => {
            (StatusCode::LOCKED, Json(empty_response(reason))).into_response()
        }
        LoginOutcome::DormantHold | LoginOutcome::StepUpRequired => {
            (StatusCode::FORBIDDEN, Json(empty_response(reason))).into_response()
        }
    }
}

fn empty_response(reason: &'static str) -> LoginResponse {
    LoginResponse {
        reason,
        access_token: None,
        refresh_token: None,
        profile_incomplete: None,
        captcha_required: None,
    }
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let access_token = state.login.refresh(&body.refresh_token)?;
    Ok(Json(RefreshResponse { access_token }))
}

/// `POST /auth/logout`
///
/// The bearer header carries the access token to blacklist. The subject
/// is read leniently so an expired access token can still be logged out.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LogoutBody>,
) -> Result<StatusCode, AuthError> {
    let access_token = bearer_token(&headers)
        .ok_or_else(|| AuthError::unauthorized("Missing bearer token"))?;
    let account_id = state
        .tokens
        .subject_of(&access_token)
        .ok_or_else(|| AuthError::invalid_token("Unrecognized access token"))?;

    state
        .login
        .logout(&account_id, &access_token, &body.refresh_token);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/session`
///
/// Probe route demonstrating the per-request bearer filter.
pub async fn session(BearerAuth(context): BearerAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        account_id: context.subject,
        roles: context.roles,
    })
}

// =============================================================================
// Header helpers
// =============================================================================

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// First hop of `X-Forwarded-For`, or `unknown` when the edge did not
/// set it.
fn client_ip(headers: &HeaderMap) -> String {
    header_value(headers, CLIENT_IP_HEADER)
        .and_then(|value| value.split(',').next().map(|ip| ip.trim().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}
