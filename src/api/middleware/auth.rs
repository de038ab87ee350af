//! Shared-token check for collector and operator requests
//!
//! Collectors and operators present the hub's token as
//! `Authorization: Bearer <token>`. A request without a usable header is
//! unauthenticated (401); one with a different token is refused (403).

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

/// Let the request through only if it carries the hub token
pub async fn require_hub_token(
    State(hub_token): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = bearer_token(request.headers())?;
    if presented != hub_token {
        debug!(path = %request.uri().path(), "request refused: token mismatch");
        return Err(AuthError::TokenMismatch);
    }

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer` header
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::NoCredentials)?
        .to_str()
        .map_err(|_| AuthError::NotBearer)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::NotBearer)
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    NoCredentials,
    NotBearer,
    TokenMismatch,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::NoCredentials => (StatusCode::UNAUTHORIZED, "hub token required"),
            AuthError::NotBearer => (
                StatusCode::UNAUTHORIZED,
                "expected Authorization: Bearer <hub token>",
            ),
            AuthError::TokenMismatch => (StatusCode::FORBIDDEN, "hub token rejected"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
