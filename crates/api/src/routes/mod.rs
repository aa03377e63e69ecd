pub mod collaboration;
pub mod health;
pub mod project;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket (live collaboration)
///
/// /collab/locks/acquire                acquire a box lock (POST)
/// /collab/locks/release                release a box lock (POST)
/// /collab/locks/{project_id}           full ownership table (GET)
/// /collab/locks/{project_id}/{box_id}  current owner of one box (GET)
///
/// /projects                            create room (POST)
/// /projects/{id}                       room metadata (GET)
/// /projects/{id}/snapshot              save snapshot (PUT), load (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/collab", collaboration::router())
        .nest("/projects", project::router())
}
