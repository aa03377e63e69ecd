//! Box ownership lock model and request DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use syncsphere_core::types::{DbId, Timestamp};

/// A row from the `box_locks` table: one user's exclusive claim on one box.
///
/// Existence of the row means the box is owned; there is no released or
/// expired state on the row itself -- those transitions delete it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BoxLock {
    pub project_id: DbId,
    pub box_id: String,
    pub user_id: DbId,
    pub acquired_at: Timestamp,
}

/// DTO for acquiring or releasing a lock over the request/response surface.
#[derive(Debug, Clone, Deserialize)]
pub struct LockRequest {
    pub project_id: DbId,
    pub box_id: String,
}
