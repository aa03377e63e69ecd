//! Periodic reclamation of stale box locks.
//!
//! A client that crashes without a disconnect signal leaves its rows in the
//! lock table; this task bounds how long they survive. Each reclaimed box is
//! announced to its room with an `ownership.changed` broadcast carrying
//! `owner_id: null`, so every member's view reverts to unclaimed. The
//! previous holder gets no dedicated notice -- it learns on its next release
//! or acquire.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use syncsphere_core::collaboration::CollabMessage;
use tokio_util::sync::CancellationToken;

use crate::collab::OwnershipManager;
use crate::ws::WsManager;

/// Startup-and-interval sweep of locks past their maximum age.
pub struct LockSweeper {
    ownership: Arc<OwnershipManager>,
    ws_manager: Arc<WsManager>,
    max_age_secs: i64,
    interval_secs: u64,
}

impl LockSweeper {
    pub fn new(
        ownership: Arc<OwnershipManager>,
        ws_manager: Arc<WsManager>,
        max_age_secs: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            ownership,
            ws_manager,
            max_age_secs,
            interval_secs,
        }
    }

    /// Run until cancelled. The first tick fires immediately, so locks
    /// stranded by a previous process lifetime are reclaimed at startup.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        tracing::info!(
            max_age_secs = self.max_age_secs,
            interval_secs = self.interval_secs,
            "Lock sweeper started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Lock sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    async fn sweep_once(&self) {
        let expired = match self.ownership.expire_stale(self.max_age_secs).await {
            Ok(expired) => expired,
            Err(e) => {
                // The next tick retries; stale locks only get staler.
                tracing::error!(error = %e, "Lock sweep failed");
                return;
            }
        };

        if expired.is_empty() {
            tracing::debug!("Lock sweep found no stale locks");
            return;
        }

        tracing::info!(count = expired.len(), "Lock sweep reclaimed stale locks");
        for lock in expired {
            let msg = CollabMessage::OwnershipChanged {
                project_id: lock.project_id,
                box_id: lock.box_id,
                owner_id: None,
            };
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    self.ws_manager
                        .broadcast_to_room(lock.project_id, Message::Text(json.into()), None)
                        .await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize broadcast message"),
            }
        }
    }
}
