//! Request/response handlers for project rooms and snapshot persistence.
//!
//! Snapshot saves are full overwrites versioned by the project's sync
//! counter, and never interact with the lock table. The persist path is
//! shared with the WebSocket `project.update` dispatch so both façades
//! commit and announce saves identically.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use syncsphere_core::collaboration::CollabMessage;
use syncsphere_core::error::CoreError;
use syncsphere_core::types::DbId;
use syncsphere_db::models::project::CreateProject;
use syncsphere_db::repositories::ProjectRepo;
use syncsphere_events::DomainEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for a snapshot save. `bundle` is the opaque session blob,
/// base64-encoded for transit.
#[derive(Debug, Deserialize)]
pub struct SaveSnapshotRequest {
    pub content: serde_json::Value,
    #[serde(default)]
    pub bundle: Option<String>,
}

/// Body of a snapshot save response.
#[derive(Debug, Serialize)]
pub struct SaveSnapshotResponse {
    pub sync_version: i64,
}

/// Body of a snapshot load response.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub content: serde_json::Value,
    pub bundle: Option<String>,
    pub sync_version: i64,
}

/// POST /api/v1/projects
///
/// Create a collaboration room with empty content. The full room CRUD
/// surface lives in the platform service; this exists so collaborators have
/// something to join.
pub async fn create_project(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Project name must not be empty".into()));
    }

    let project = ProjectRepo::create(&state.pool, &input).await?;
    tracing::info!(project_id = project.id, name = %project.name, "Project created");
    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/projects/{id}
pub async fn get_project(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "project".into(),
                id,
            })
        })?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}/snapshot
///
/// Overwrite the project's content and bundle. The new sync version is
/// returned to the saver and broadcast to the room.
pub async fn save_snapshot(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SaveSnapshotRequest>,
) -> AppResult<impl IntoResponse> {
    let sync_version =
        persist_snapshot(&state, id, auth.user_id, &input.content, input.bundle.as_deref()).await?;

    let msg = CollabMessage::ProjectUpdated {
        project_id: id,
        sync_version,
    };
    match serde_json::to_string(&msg) {
        Ok(json) => {
            state
                .ws_manager
                .broadcast_to_room(id, axum::extract::ws::Message::Text(json.into()), None)
                .await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize broadcast message"),
    }

    Ok(Json(DataResponse {
        data: SaveSnapshotResponse { sync_version },
    }))
}

/// GET /api/v1/projects/{id}/snapshot
pub async fn load_snapshot(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = ProjectRepo::load_snapshot(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "project".into(),
                id,
            })
        })?;

    Ok(Json(DataResponse {
        data: SnapshotResponse {
            content: snapshot.content,
            bundle: snapshot.bundle.map(|b| BASE64.encode(b)),
            sync_version: snapshot.sync_version,
        },
    }))
}

/// Decode, persist, and announce one snapshot save. Shared by the REST
/// handler above and the WebSocket `project.update` dispatch.
///
/// Returns the new sync version; an unknown project surfaces as NotFound.
pub(crate) async fn persist_snapshot(
    state: &AppState,
    project_id: DbId,
    user_id: DbId,
    content: &serde_json::Value,
    bundle_b64: Option<&str>,
) -> AppResult<i64> {
    let bundle = bundle_b64
        .map(|s| BASE64.decode(s))
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 bundle: {e}")))?;

    let sync_version =
        ProjectRepo::save_snapshot(&state.pool, project_id, content, bundle.as_deref())
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::NotFound {
                    entity: "project".into(),
                    id: project_id,
                })
            })?;

    tracing::info!(project_id, user_id, sync_version, "Project snapshot saved");
    state.event_bus.publish(
        DomainEvent::new("project.saved")
            .with_project(project_id)
            .with_actor(user_id)
            .with_payload(serde_json::json!({ "sync_version": sync_version })),
    );
    Ok(sync_version)
}
