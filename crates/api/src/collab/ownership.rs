//! The ownership manager: acquisition, release, bulk release, expiry, and
//! refresh of exclusive box locks.
//!
//! Every call round-trips to the lock table -- there is no in-process cache
//! of ownership, so horizontally scaled instances cannot diverge. Conflicting
//! acquisitions resolve first-writer-wins at the table's atomic insert;
//! nothing here holds a mutex across boxes, so claims on unrelated boxes
//! proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use syncsphere_core::types::DbId;
use syncsphere_db::models::box_lock::BoxLock;
use syncsphere_db::repositories::BoxLockRepo;
use syncsphere_db::DbPool;
use syncsphere_events::{DomainEvent, EventBus};

use crate::error::AppError;

/// Bounded attempts against the lock store before a failure is surfaced.
const STORE_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between store retries.
const STORE_RETRY_BASE_DELAY_MS: u64 = 50;

/// Result of an acquisition attempt.
///
/// Denial is a normal outcome, not an error: it carries the current owner so
/// the caller can show "owned by X" instead of a bare failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Denied { owner_id: DbId },
}

/// Result of a release attempt. `Ignored` means the caller did not hold the
/// lock -- tolerated stale client state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    Ignored,
}

/// Business logic enforcing at-most-one-owner-per-box.
///
/// Owns the only write path to the lock table and publishes a domain event
/// for every state change it commits.
pub struct OwnershipManager {
    pool: DbPool,
    event_bus: Arc<EventBus>,
}

impl OwnershipManager {
    pub fn new(pool: DbPool, event_bus: Arc<EventBus>) -> Self {
        Self { pool, event_bus }
    }

    /// Attempt to acquire exclusive ownership of a box.
    ///
    /// Grants if the box is unclaimed, or if `user_id` already owns it
    /// (idempotent re-acquire, tolerating client retry after a dropped
    /// acknowledgment). Denies otherwise, reporting the current owner.
    ///
    /// Two races are absorbed by the bounded retry loop: a transient store
    /// failure, and the window where the insert conflicts but the owning row
    /// is released before the follow-up read observes it.
    pub async fn acquire(
        &self,
        project_id: DbId,
        box_id: &str,
        user_id: DbId,
    ) -> Result<LockOutcome, AppError> {
        let mut attempt = 0u32;
        loop {
            match self.acquire_once(project_id, box_id, user_id).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {
                    // Insert conflicted but the row vanished before the owner
                    // read: the previous holder released in between. Retrying
                    // re-runs the insert against the now-free slot.
                    attempt += 1;
                    if attempt >= STORE_RETRY_ATTEMPTS {
                        return Err(AppError::InternalError(
                            "Lock conflict detected but no owner found after retries".into(),
                        ));
                    }
                    tracing::debug!(
                        project_id,
                        box_id,
                        user_id,
                        attempt,
                        "Lock slot freed mid-acquire, retrying"
                    );
                }
                Err(e) if is_transient(&e) && attempt + 1 < STORE_RETRY_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        project_id,
                        box_id,
                        attempt,
                        "Transient lock store failure during acquire, retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) if is_transient(&e) => return Err(retries_exhausted(e)),
                Err(e) => return Err(AppError::Database(e)),
            }
        }
    }

    /// One acquisition pass. `Ok(None)` signals the released-between-insert-
    /// and-read race; the caller retries.
    async fn acquire_once(
        &self,
        project_id: DbId,
        box_id: &str,
        user_id: DbId,
    ) -> Result<Option<LockOutcome>, sqlx::Error> {
        let inserted =
            BoxLockRepo::set_owner(&self.pool, project_id, box_id, Some(user_id)).await?;
        if inserted {
            tracing::info!(project_id, box_id, user_id, "Lock acquired");
            self.event_bus.publish(
                DomainEvent::new("lock.acquired")
                    .with_project(project_id)
                    .with_actor(user_id)
                    .with_payload(serde_json::json!({ "box_id": box_id })),
            );
            return Ok(Some(LockOutcome::Granted));
        }

        match BoxLockRepo::get_owner(&self.pool, project_id, box_id).await? {
            // Re-acquire by the current owner: no new row, no new event.
            Some(owner) if owner == user_id => Ok(Some(LockOutcome::Granted)),
            Some(owner) => Ok(Some(LockOutcome::Denied { owner_id: owner })),
            None => Ok(None),
        }
    }

    /// Release a box held by `user_id`.
    ///
    /// A release of a box the caller does not own returns
    /// [`ReleaseOutcome::Ignored`] and leaves any existing claim untouched --
    /// this is how a previous holder learns its lock was reclaimed.
    pub async fn release(
        &self,
        project_id: DbId,
        box_id: &str,
        user_id: DbId,
    ) -> Result<ReleaseOutcome, AppError> {
        let mut attempt = 0u32;
        let released = loop {
            match BoxLockRepo::release(&self.pool, project_id, box_id, user_id).await {
                Ok(released) => break released,
                Err(e) if is_transient(&e) && attempt + 1 < STORE_RETRY_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        project_id,
                        box_id,
                        attempt,
                        "Transient lock store failure during release, retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) if is_transient(&e) => return Err(retries_exhausted(e)),
                Err(e) => return Err(AppError::Database(e)),
            }
        };

        if released {
            tracing::info!(project_id, box_id, user_id, "Lock released");
            self.event_bus.publish(
                DomainEvent::new("lock.released")
                    .with_project(project_id)
                    .with_actor(user_id)
                    .with_payload(serde_json::json!({ "box_id": box_id })),
            );
            Ok(ReleaseOutcome::Released)
        } else {
            tracing::debug!(project_id, box_id, user_id, "Release ignored, not the owner");
            Ok(ReleaseOutcome::Ignored)
        }
    }

    /// Release every box held by `user_id`, across all projects.
    ///
    /// Called on explicit room-leave or graceful disconnect. Each box is
    /// released as an independent operation: a failure on one is logged and
    /// skipped so it never blocks releasing the rest. Returns the locks that
    /// were actually released, for broadcasting.
    pub async fn force_release_all(&self, user_id: DbId) -> Result<Vec<BoxLock>, AppError> {
        let held = BoxLockRepo::list_for_user(&self.pool, user_id).await?;
        let mut released = Vec::with_capacity(held.len());

        for lock in held {
            match BoxLockRepo::release(&self.pool, lock.project_id, &lock.box_id, user_id).await {
                Ok(true) => {
                    self.event_bus.publish(
                        DomainEvent::new("lock.released")
                            .with_project(lock.project_id)
                            .with_actor(user_id)
                            .with_payload(serde_json::json!({ "box_id": lock.box_id })),
                    );
                    released.push(lock);
                }
                // Already gone -- a concurrent sweep or release beat us.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        project_id = lock.project_id,
                        box_id = %lock.box_id,
                        user_id,
                        "Failed to release one lock during force-release, continuing"
                    );
                }
            }
        }

        if !released.is_empty() {
            tracing::info!(user_id, count = released.len(), "Force-released locks");
        }
        Ok(released)
    }

    /// Reclaim every lock older than `max_age_secs`, regardless of the
    /// holder's connection state. Returns the reclaimed locks so the caller
    /// can broadcast the reverted boxes.
    pub async fn expire_stale(&self, max_age_secs: i64) -> Result<Vec<BoxLock>, AppError> {
        let expired = BoxLockRepo::sweep_expired(&self.pool, max_age_secs).await?;

        for lock in &expired {
            tracing::info!(
                project_id = lock.project_id,
                box_id = %lock.box_id,
                user_id = lock.user_id,
                "Lock expired"
            );
            self.event_bus.publish(
                DomainEvent::new("lock.expired")
                    .with_project(lock.project_id)
                    .with_actor(lock.user_id)
                    .with_payload(serde_json::json!({
                        "box_id": lock.box_id,
                        "acquired_at": lock.acquired_at.to_rfc3339(),
                    })),
            );
        }
        Ok(expired)
    }

    /// Refresh the age of every lock `user_id` holds in a project.
    ///
    /// Fed by connection heartbeats: a live editor's claims stay ahead of
    /// the sweep without any per-request timeout.
    pub async fn refresh(&self, project_id: DbId, user_id: DbId) -> Result<u64, AppError> {
        let refreshed = BoxLockRepo::refresh_for_user(&self.pool, project_id, user_id).await?;
        if refreshed > 0 {
            tracing::trace!(project_id, user_id, refreshed, "Lock ages refreshed");
        }
        Ok(refreshed)
    }
}

/// A transient failure survived every retry. Surfaced as a service error,
/// never silently dropped: a client must not believe it holds a lock it
/// does not.
fn retries_exhausted(err: sqlx::Error) -> AppError {
    AppError::StoreUnavailable(format!(
        "lock store still failing after {STORE_RETRY_ATTEMPTS} attempts: {err}"
    ))
}

/// Whether a sqlx error is worth retrying.
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

/// Exponential backoff: 50ms, 100ms, 200ms, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(STORE_RETRY_BASE_DELAY_MS << (attempt - 1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
