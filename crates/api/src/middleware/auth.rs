//! Request identity: the `AuthUser` extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use syncsphere_core::error::CoreError;
use syncsphere_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated user behind a request, proven by a Bearer token.
///
/// Every collaboration endpoint, including the WebSocket upgrade, takes
/// this extractor first; a request without a verifiable token is rejected
/// with 401 before any handler body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| unauthorized("Missing or malformed Authorization header"))?;

        let claims = state
            .config
            .jwt
            .verify(token)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(msg.to_string()))
}
