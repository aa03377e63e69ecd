//! Route definitions for box ownership.
//!
//! All endpoints require authentication via the `AuthUser` extractor.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::collaboration;
use crate::state::AppState;

/// Collaboration routes mounted at `/collab`.
///
/// ```text
/// POST /locks/acquire                  -> acquire_lock
/// POST /locks/release                  -> release_lock
/// GET  /locks/{project_id}             -> list_ownership
/// GET  /locks/{project_id}/{box_id}    -> get_lock_owner
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks/acquire", post(collaboration::acquire_lock))
        .route("/locks/release", post(collaboration::release_lock))
        .route("/locks/{project_id}", get(collaboration::list_ownership))
        .route(
            "/locks/{project_id}/{box_id}",
            get(collaboration::get_lock_owner),
        )
}
