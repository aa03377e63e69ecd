use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::WsManager;

/// Seconds between heartbeat pings.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn the heartbeat task: a periodic Ping to every live connection.
///
/// The Pong replies are what feed lock refresh in the socket handler, so a
/// silently-alive editor keeps its claims without sending any traffic of
/// its own. Runs until aborted via the returned handle during shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }
    })
}
