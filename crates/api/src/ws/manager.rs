//! The connection hub: per-room registry of live WebSocket connections and
//! the broadcast fan-out between them.
//!
//! Each connection's outbound queue is bounded. Delivery uses `try_send`, so
//! fan-out never awaits a slow receiver; a connection whose queue is full or
//! closed is dropped from the registry after the pass, which closes its
//! socket without disturbing delivery to the rest of the room.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use syncsphere_core::collaboration::WS_SEND_QUEUE_CAPACITY;
use syncsphere_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;

/// Metadata for a single live connection.
pub struct WsConnection {
    /// Authenticated user behind the connection.
    pub user_id: DbId,
    /// Room (project) this connection is subscribed to, if any.
    pub project_id: Option<DbId>,
    /// Bounded channel for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections, keyed by connection id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Connections are ephemeral and never
/// persisted -- locks outlive them deliberately.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new authenticated connection.
    ///
    /// Returns the receiver half of the bounded message channel so the
    /// caller can forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(WS_SEND_QUEUE_CAPACITY);
        let conn = WsConnection {
            user_id,
            project_id: None,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its id.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Subscribe a connection to a room. Returns `false` for an unknown
    /// connection id.
    pub async fn join(&self, conn_id: &str, project_id: DbId) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.project_id = Some(project_id);
                true
            }
            None => false,
        }
    }

    /// Unsubscribe a connection from its room, returning the room it left.
    ///
    /// Leaving a room does not release locks here -- that decision belongs to
    /// the ownership manager, driven by the handler.
    pub async fn leave(&self, conn_id: &str) -> Option<DbId> {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => conn.project_id.take(),
            None => None,
        }
    }

    /// The room a connection is currently subscribed to.
    pub async fn room_of(&self, conn_id: &str) -> Option<DbId> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .and_then(|conn| conn.project_id)
    }

    /// Send a message directly to one connection (snapshot pushes, request
    /// results). Returns `false` if the connection is unknown or its queue
    /// rejected the message, in which case it is dropped from the registry.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        let rejected = {
            let conns = self.connections.read().await;
            match conns.get(conn_id) {
                Some(conn) => conn.sender.try_send(message).is_err(),
                None => return false,
            }
        };
        if rejected {
            tracing::warn!(conn_id = %conn_id, "Outbound queue rejected direct send, dropping connection");
            self.remove(conn_id).await;
            return false;
        }
        true
    }

    /// Deliver `message` to every connection subscribed to `project_id`,
    /// except the optional `exclude` connection (typically the originator,
    /// which already applied the change locally).
    ///
    /// A full or closed queue on one connection never aborts delivery to the
    /// remaining connections: the offender is marked and removed after the
    /// pass. Returns the number of connections the message was queued for.
    pub async fn broadcast_to_room(
        &self,
        project_id: DbId,
        message: Message,
        exclude: Option<&str>,
    ) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<String> = Vec::new();
        {
            let conns = self.connections.read().await;
            for (id, conn) in conns.iter() {
                if conn.project_id != Some(project_id) {
                    continue;
                }
                if exclude == Some(id.as_str()) {
                    continue;
                }
                match conn.sender.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            conn_id = %id,
                            project_id,
                            "Outbound queue full, disconnecting slow client"
                        );
                        dead.push(id.clone());
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(id.clone());
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &dead {
                conns.remove(id);
            }
        }
        delivered
    }

    /// Number of connections currently subscribed to a room.
    pub async fn connections_in_room(&self, project_id: DbId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.project_id == Some(project_id))
            .count()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task; Pong replies feed lock refresh. A queue
    /// that cannot even take a ping is left for the next broadcast or
    /// receive-loop pass to clean up.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
