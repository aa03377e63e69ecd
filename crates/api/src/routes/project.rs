//! Route definitions for project rooms and snapshots.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::project;
use crate::state::AppState;

/// Project routes mounted at `/projects`.
///
/// ```text
/// POST /                  -> create_project
/// GET  /{id}              -> get_project
/// PUT  /{id}/snapshot     -> save_snapshot
/// GET  /{id}/snapshot     -> load_snapshot
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(project::create_project))
        .route("/{id}", get(project::get_project))
        .route(
            "/{id}/snapshot",
            put(project::save_snapshot).get(project::load_snapshot),
        )
}
