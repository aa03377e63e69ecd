//! Repository for the `box_locks` table -- the single source of truth for box
//! ownership.
//!
//! Every operation here is a single SQL statement, so concurrent calls for
//! the same (project, box) serialize inside PostgreSQL rather than behind any
//! in-process mutex. Two simultaneous acquisition attempts resolve to exactly
//! one inserted row; the loser sees the conflict and reads the winner.

use sqlx::PgPool;
use syncsphere_core::types::DbId;

use crate::models::box_lock::BoxLock;

/// Column list for `box_locks` queries.
const LOCK_COLUMNS: &str = "project_id, box_id, user_id, acquired_at";

/// Provides atomic operations on exclusive box locks.
pub struct BoxLockRepo;

impl BoxLockRepo {
    /// Read the current owner of a box, or `None` if unclaimed.
    pub async fn get_owner(
        pool: &PgPool,
        project_id: DbId,
        box_id: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        let row: Option<(DbId,)> =
            sqlx::query_as("SELECT user_id FROM box_locks WHERE project_id = $1 AND box_id = $2")
                .bind(project_id)
                .bind(box_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Write or clear the owner of a box.
    ///
    /// `Some(user_id)` inserts a lock row via `ON CONFLICT DO NOTHING`: if
    /// the box is already owned (by anyone, including `user_id` itself) the
    /// existing row is left untouched -- ownership is never reassigned in
    /// place. `None` deletes the row; absence of a row is the canonical
    /// unclaimed state, never a null-owner row.
    ///
    /// Returns `true` if a row was inserted or deleted.
    pub async fn set_owner(
        pool: &PgPool,
        project_id: DbId,
        box_id: &str,
        owner: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = match owner {
            Some(user_id) => {
                sqlx::query(
                    "INSERT INTO box_locks (project_id, box_id, user_id) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (project_id, box_id) DO NOTHING",
                )
                .bind(project_id)
                .bind(box_id)
                .bind(user_id)
                .execute(pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM box_locks WHERE project_id = $1 AND box_id = $2")
                    .bind(project_id)
                    .bind(box_id)
                    .execute(pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    /// Release a lock. Only a row whose owner matches `user_id` is deleted,
    /// so a stale release from a non-owner cannot disturb the current claim.
    ///
    /// Returns `true` if a lock was released.
    pub async fn release(
        pool: &PgPool,
        project_id: DbId,
        box_id: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM box_locks \
             WHERE project_id = $1 AND box_id = $2 AND user_id = $3",
        )
        .bind(project_id)
        .bind(box_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full ownership table for a project, oldest claim first. Sent to every
    /// client joining the room so state never has to be inferred from
    /// incremental events.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<BoxLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM box_locks \
             WHERE project_id = $1 ORDER BY acquired_at, box_id"
        );
        sqlx::query_as::<_, BoxLock>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Every lock currently held by a user, across all projects.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<BoxLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM box_locks \
             WHERE user_id = $1 ORDER BY project_id, box_id"
        );
        sqlx::query_as::<_, BoxLock>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Delete every lock older than `max_age_secs`, regardless of owner.
    ///
    /// Returns the removed rows so the caller can broadcast the reclaimed
    /// boxes and record the expiries.
    pub async fn sweep_expired(
        pool: &PgPool,
        max_age_secs: i64,
    ) -> Result<Vec<BoxLock>, sqlx::Error> {
        let query = format!(
            "DELETE FROM box_locks \
             WHERE acquired_at < NOW() - ($1 || ' seconds')::interval \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, BoxLock>(&query)
            .bind(max_age_secs.to_string())
            .fetch_all(pool)
            .await
    }

    /// Reset `acquired_at` on every lock a user holds in a project, keeping
    /// a live editor's claims ahead of the sweep. The owner column is never
    /// touched.
    ///
    /// Returns the number of locks refreshed.
    pub async fn refresh_for_user(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE box_locks SET acquired_at = NOW() \
             WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
