//! WebSocket infrastructure for real-time collaboration.
//!
//! Provides the room-scoped connection hub, the message dispatch loop behind
//! the HTTP upgrade handler, and heartbeat monitoring.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
