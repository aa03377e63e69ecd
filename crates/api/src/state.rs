use std::sync::Arc;

use crate::collab::OwnershipManager;
use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: syncsphere_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection hub (room-scoped fan-out).
    pub ws_manager: Arc<WsManager>,
    /// Centralized bus for publishing domain events.
    pub event_bus: Arc<syncsphere_events::EventBus>,
    /// Box ownership manager (single writer path to the lock table).
    pub ownership: Arc<OwnershipManager>,
}
