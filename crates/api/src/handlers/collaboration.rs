//! Request/response handlers for box ownership.
//!
//! The synchronous half of the dual façade, for clients that only need
//! point-in-time reads or cannot hold a persistent connection. Mutations go
//! through the same [`OwnershipManager`](crate::collab::OwnershipManager) as
//! the WebSocket path and fan out the same room broadcasts.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use syncsphere_core::collaboration::{validate_box_id, validate_project_id, CollabMessage};
use syncsphere_core::error::CoreError;
use syncsphere_core::types::{DbId, Timestamp};
use syncsphere_db::models::box_lock::LockRequest;
use syncsphere_db::repositories::{BoxLockRepo, ProjectRepo};

use crate::collab::{LockOutcome, ReleaseOutcome};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of an acquire response. Denial is a 200 with the current owner, so
/// the client can render "owned by X" instead of an error toast.
#[derive(Debug, Serialize)]
pub struct AcquireResponse {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<DbId>,
}

/// Body of a release response. `released: false` means the caller did not
/// hold the lock (already released or reclaimed by the sweep).
#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Body of an owner query. `owner_id: null` means unclaimed.
#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub owner_id: Option<DbId>,
}

/// One row of an ownership listing.
#[derive(Debug, Serialize)]
pub struct OwnershipEntry {
    pub box_id: String,
    pub user_id: DbId,
    pub acquired_at: Timestamp,
}

/// POST /api/v1/collab/locks/acquire
///
/// Attempt to acquire an exclusive lock on a box. On grant, the room is told
/// via an `ownership.changed` broadcast.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<impl IntoResponse> {
    validate_lock_ref(&input)?;
    ensure_project_exists(&state, input.project_id).await?;

    match state
        .ownership
        .acquire(input.project_id, &input.box_id, auth.user_id)
        .await?
    {
        LockOutcome::Granted => {
            broadcast_ownership_changed(
                &state,
                input.project_id,
                input.box_id.clone(),
                Some(auth.user_id),
            )
            .await;
            Ok(Json(DataResponse {
                data: AcquireResponse {
                    granted: true,
                    owner_id: None,
                },
            }))
        }
        LockOutcome::Denied { owner_id } => Ok(Json(DataResponse {
            data: AcquireResponse {
                granted: false,
                owner_id: Some(owner_id),
            },
        })),
    }
}

/// POST /api/v1/collab/locks/release
///
/// Release a held lock. Releasing a box the caller does not own is a no-op
/// reported as `released: false`, never an error.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<impl IntoResponse> {
    validate_lock_ref(&input)?;

    let outcome = state
        .ownership
        .release(input.project_id, &input.box_id, auth.user_id)
        .await?;

    let released = outcome == ReleaseOutcome::Released;
    if released {
        broadcast_ownership_changed(&state, input.project_id, input.box_id.clone(), None).await;
    }

    Ok(Json(DataResponse {
        data: ReleaseResponse { released },
    }))
}

/// GET /api/v1/collab/locks/{project_id}/{box_id}
///
/// Point-in-time read of a box's owner.
pub async fn get_lock_owner(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((project_id, box_id)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    validate_project_id(project_id).map_err(AppError::BadRequest)?;
    validate_box_id(&box_id).map_err(AppError::BadRequest)?;

    let owner_id = BoxLockRepo::get_owner(&state.pool, project_id, &box_id).await?;
    Ok(Json(DataResponse {
        data: OwnerResponse { owner_id },
    }))
}

/// GET /api/v1/collab/locks/{project_id}
///
/// Full ownership table for a project, as pushed to WebSocket joiners.
pub async fn list_ownership(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    validate_project_id(project_id).map_err(AppError::BadRequest)?;
    ensure_project_exists(&state, project_id).await?;

    let locks = BoxLockRepo::list_for_project(&state.pool, project_id).await?;
    let entries: Vec<OwnershipEntry> = locks
        .into_iter()
        .map(|lock| OwnershipEntry {
            box_id: lock.box_id,
            user_id: lock.user_id,
            acquired_at: lock.acquired_at,
        })
        .collect();

    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_lock_ref(input: &LockRequest) -> AppResult<()> {
    validate_project_id(input.project_id).map_err(AppError::BadRequest)?;
    validate_box_id(&input.box_id).map_err(AppError::BadRequest)?;
    Ok(())
}

async fn ensure_project_exists(state: &AppState, project_id: DbId) -> AppResult<()> {
    if ProjectRepo::find_by_id(&state.pool, project_id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "project".into(),
            id: project_id,
        }));
    }
    Ok(())
}

/// Fan an ownership change out to the room. REST callers hold no WebSocket
/// connection, so nobody is excluded.
async fn broadcast_ownership_changed(
    state: &AppState,
    project_id: DbId,
    box_id: String,
    owner_id: Option<DbId>,
) {
    let msg = CollabMessage::OwnershipChanged {
        project_id,
        box_id,
        owner_id,
    };
    match serde_json::to_string(&msg) {
        Ok(json) => {
            state
                .ws_manager
                .broadcast_to_room(
                    project_id,
                    axum::extract::ws::Message::Text(json.into()),
                    None,
                )
                .await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize broadcast message"),
    }
}
