//! Repository for the append-only `events` table.

use sqlx::PgPool;
use syncsphere_core::types::DbId;

use crate::models::event::EventRow;

/// Column list for `events` queries.
const EVENT_COLUMNS: &str = "id, event_type, project_id, actor_user_id, payload, created_at";

/// Provides insert and audit queries for domain events.
pub struct EventRepo;

impl EventRepo {
    /// Append one event, returning its id.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        project_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO events (event_type, project_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(project_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Most recent events for a project, newest first.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        limit: i64,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE project_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(project_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
