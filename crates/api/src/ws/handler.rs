//! The persistent-connection half of the collaboration façade.
//!
//! After the authenticated upgrade, each socket is split into a sender task
//! (draining the hub's bounded queue into the sink) and an inbound loop that
//! dispatches [`CollabMessage`]s through the same ownership manager and
//! persistence path the REST handlers use.
//!
//! Disconnection semantics: an explicit `room.leave` or a clean Close frame
//! releases every lock the user holds; a raw socket drop only deregisters
//! the connection, leaving locks to the staleness sweep so a reconnecting
//! editor keeps its claims.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use syncsphere_core::collaboration::{validate_box_id, CollabMessage, OwnedBox};
use syncsphere_core::error::CoreError;
use syncsphere_core::types::DbId;
use syncsphere_db::models::box_lock::BoxLock;
use syncsphere_db::repositories::{BoxLockRepo, ProjectRepo};

use crate::collab::{LockOutcome, ReleaseOutcome};
use crate::error::{AppError, AppResult};
use crate::handlers::project::persist_snapshot;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// The `AuthUser` extractor runs before the upgrade, so unauthenticated
/// clients are rejected with 401 and never reach the socket loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    auth: AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the hub.
///   2. Spawns a sender task forwarding queued messages to the sink.
///   3. Dispatches inbound messages on the current task.
///   4. On a clean close, force-releases the user's locks; always
///      deregisters.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward queued messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: dispatch inbound messages.
    let mut clean_close = false;
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => {
                clean_close = true;
                break;
            }
            Ok(Message::Text(text)) => {
                if let Err(e) = dispatch(&state, &conn_id, user_id, text.as_str()).await {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Rejected client message");
                    send(
                        &state,
                        &conn_id,
                        &CollabMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
            Ok(Message::Pong(_)) => {
                // Heartbeat reply: the editor is alive, keep its claims
                // ahead of the sweep.
                if let Some(project_id) = state.ws_manager.room_of(&conn_id).await {
                    if let Err(e) = state.ownership.refresh(project_id, user_id).await {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Lock refresh failed");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // A clean close is a graceful goodbye: give the boxes back. A dropped
    // socket is not -- the user may be reconnecting, so the sweep decides.
    if clean_close {
        release_all_and_broadcast(&state, &conn_id, user_id).await;
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, clean_close, "WebSocket disconnected");
}

/// Route one parsed client message through the collaboration core.
async fn dispatch(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    text: &str,
) -> AppResult<()> {
    let msg: CollabMessage = serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Unrecognized message: {e}")))?;

    match msg {
        CollabMessage::RoomJoin { project_id } => {
            join_room(state, conn_id, project_id).await
        }
        CollabMessage::RoomLeave => {
            state.ws_manager.leave(conn_id).await;
            release_all_and_broadcast(state, conn_id, user_id).await;
            Ok(())
        }
        CollabMessage::LockAcquire { box_id } => {
            let project_id = joined_room(state, conn_id).await?;
            validate_box_id(&box_id).map_err(AppError::BadRequest)?;

            match state.ownership.acquire(project_id, &box_id, user_id).await? {
                LockOutcome::Granted => {
                    send(
                        state,
                        conn_id,
                        &CollabMessage::LockResult {
                            box_id: box_id.clone(),
                            granted: true,
                            owner_id: None,
                        },
                    )
                    .await;
                    broadcast(
                        state,
                        project_id,
                        &CollabMessage::OwnershipChanged {
                            project_id,
                            box_id,
                            owner_id: Some(user_id),
                        },
                        Some(conn_id),
                    )
                    .await;
                }
                LockOutcome::Denied { owner_id } => {
                    send(
                        state,
                        conn_id,
                        &CollabMessage::LockResult {
                            box_id,
                            granted: false,
                            owner_id: Some(owner_id),
                        },
                    )
                    .await;
                }
            }
            Ok(())
        }
        CollabMessage::LockRelease { box_id } => {
            let project_id = joined_room(state, conn_id).await?;
            validate_box_id(&box_id).map_err(AppError::BadRequest)?;

            let outcome = state.ownership.release(project_id, &box_id, user_id).await?;
            let released = outcome == ReleaseOutcome::Released;
            send(
                state,
                conn_id,
                &CollabMessage::ReleaseResult {
                    box_id: box_id.clone(),
                    released,
                },
            )
            .await;
            if released {
                broadcast(
                    state,
                    project_id,
                    &CollabMessage::OwnershipChanged {
                        project_id,
                        box_id,
                        owner_id: None,
                    },
                    Some(conn_id),
                )
                .await;
            }
            Ok(())
        }
        CollabMessage::ProjectUpdate { content, bundle } => {
            let project_id = joined_room(state, conn_id).await?;

            let sync_version =
                persist_snapshot(state, project_id, user_id, &content, bundle.as_deref()).await?;

            let updated = CollabMessage::ProjectUpdated {
                project_id,
                sync_version,
            };
            // Ack the saver with the new version, then fan out.
            send(state, conn_id, &updated).await;
            broadcast(state, project_id, &updated, Some(conn_id)).await;
            Ok(())
        }
        // Server-to-client variants arriving inbound are protocol misuse.
        other => Err(AppError::BadRequest(format!(
            "Unexpected message from client: {}",
            message_kind(&other)
        ))),
    }
}

/// Subscribe a connection to a room and push the full ownership snapshot so
/// the joiner never has to infer state from incremental events.
async fn join_room(state: &AppState, conn_id: &str, project_id: DbId) -> AppResult<()> {
    if ProjectRepo::find_by_id(&state.pool, project_id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "project".into(),
            id: project_id,
        }));
    }

    state.ws_manager.join(conn_id, project_id).await;
    send(state, conn_id, &CollabMessage::RoomJoined { project_id }).await;

    let locks = BoxLockRepo::list_for_project(&state.pool, project_id).await?;
    let snapshot = CollabMessage::OwnershipSnapshot {
        project_id,
        locks: locks.iter().map(owned_box).collect(),
    };
    send(state, conn_id, &snapshot).await;

    tracing::info!(conn_id = %conn_id, project_id, "Joined room");
    Ok(())
}

/// Release every lock the user holds and tell each affected room.
async fn release_all_and_broadcast(state: &AppState, conn_id: &str, user_id: DbId) {
    match state.ownership.force_release_all(user_id).await {
        Ok(released) => {
            for lock in released {
                broadcast(
                    state,
                    lock.project_id,
                    &CollabMessage::OwnershipChanged {
                        project_id: lock.project_id,
                        box_id: lock.box_id,
                        owner_id: None,
                    },
                    Some(conn_id),
                )
                .await;
            }
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, user_id, error = %e, "Force-release failed");
        }
    }
}

/// The room this connection is subscribed to, or a validation error.
async fn joined_room(state: &AppState, conn_id: &str) -> AppResult<DbId> {
    state
        .ws_manager
        .room_of(conn_id)
        .await
        .ok_or_else(|| AppError::BadRequest("Join a room before sending this message".into()))
}

fn owned_box(lock: &BoxLock) -> OwnedBox {
    OwnedBox {
        box_id: lock.box_id.clone(),
        user_id: lock.user_id,
        acquired_at: lock.acquired_at.to_rfc3339(),
    }
}

/// Serialize and queue a message for one connection.
async fn send(state: &AppState, conn_id: &str, msg: &CollabMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            state.ws_manager.send_to(conn_id, Message::Text(json.into())).await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize outbound message"),
    }
}

/// Serialize and fan a message out to a room.
async fn broadcast(
    state: &AppState,
    project_id: DbId,
    msg: &CollabMessage,
    exclude: Option<&str>,
) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            state
                .ws_manager
                .broadcast_to_room(project_id, Message::Text(json.into()), exclude)
                .await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize broadcast message"),
    }
}

/// Human-readable tag for protocol-misuse errors.
fn message_kind(msg: &CollabMessage) -> &'static str {
    match msg {
        CollabMessage::RoomJoin { .. } => "room.join",
        CollabMessage::RoomLeave => "room.leave",
        CollabMessage::LockAcquire { .. } => "lock.acquire",
        CollabMessage::LockRelease { .. } => "lock.release",
        CollabMessage::ProjectUpdate { .. } => "project.update",
        CollabMessage::RoomJoined { .. } => "room.joined",
        CollabMessage::OwnershipSnapshot { .. } => "ownership.snapshot",
        CollabMessage::LockResult { .. } => "lock.result",
        CollabMessage::ReleaseResult { .. } => "release.result",
        CollabMessage::OwnershipChanged { .. } => "ownership.changed",
        CollabMessage::ProjectUpdated { .. } => "project.updated",
        CollabMessage::Error { .. } => "error",
    }
}
