//! Audit capture: every bus event lands in the `events` table.
//!
//! Runs as one long-lived task subscribed to the bus. Decoupling the write
//! from the publisher keeps the ownership manager's hot path free of a
//! second database round-trip per lock operation.

use syncsphere_db::repositories::EventRepo;
use syncsphere_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::DomainEvent;

/// Background writer for the domain-event audit trail.
pub struct EventPersistence;

impl EventPersistence {
    /// Persist events from `receiver` until the bus closes.
    ///
    /// A failed insert loses that one event: it is logged and the loop
    /// keeps going, because stalling audit capture must never stall the
    /// collaboration it audits. Lag is reported with the number of events
    /// the channel overwrote.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<DomainEvent>) {
        let mut written: u64 = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let result = EventRepo::insert(
                        &pool,
                        &event.event_type,
                        event.project_id,
                        event.actor_user_id,
                        &event.payload,
                    )
                    .await;
                    match result {
                        Ok(_) => written += 1,
                        Err(e) => tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        ),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lost = n, "Event persistence lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!(written, "Event bus closed, persistence shutting down");
    }
}
