// Request authentication.
//
// Two independent layers:
// - optional Bearer gate: if AUTH_SECRET is set, protected routes require
//   `Authorization: Bearer <secret>`
// - session identity: the caller's user id arrives in `X-User-Id`, issued by
//   whatever session layer sits in front of this service

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{ChatError, Surface};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that enforces Bearer token auth when AUTH_SECRET is configured.
/// Health routes should NOT use this middleware.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let secret = match state.auth_secret.as_deref() {
        Some(s) => s,
        None => return Ok(next.run(request).await),
    };

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!("Auth failed: invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Auth failed: missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// The session user id, if the request carried a valid one.
///
/// Extraction never fails; handlers call [`Session::require`] with their own
/// error surface so a missing session maps to `unauthorized:<surface>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session(pub Option<Uuid>);

impl Session {
    pub fn require(self, surface: Surface) -> Result<Uuid, ChatError> {
        self.0.ok_or_else(|| ChatError::unauthorized(surface))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok());
        Ok(Session(user_id))
    }
}
