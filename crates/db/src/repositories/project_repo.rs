//! Repository for the `projects` table.
//!
//! Snapshot persistence is deliberately independent of the lock table: a
//! save overwrites content and bundle wholesale whatever locks exist, and
//! lock operations never write here. A crash between a lock acquisition and
//! the next save leaves the prior snapshot intact.

use sqlx::PgPool;
use syncsphere_core::types::DbId;

use crate::models::project::{CreateProject, Project, ProjectSnapshot};

/// Column list for metadata queries (blobs excluded).
const PROJECT_COLUMNS: &str = "id, name, sync_version, created_at, updated_at";

/// Provides room lifecycle and snapshot persistence for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project with empty content, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name) VALUES ($1) RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// Find a project's metadata by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the project's content and bundle, bumping `sync_version`.
    ///
    /// Returns the new version, or `None` if the project does not exist.
    pub async fn save_snapshot(
        pool: &PgPool,
        id: DbId,
        content: &serde_json::Value,
        bundle: Option<&[u8]>,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE projects SET \
                content = $2, \
                bundle = $3, \
                sync_version = sync_version + 1, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING sync_version",
        )
        .bind(id)
        .bind(content)
        .bind(bundle)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(version,)| version))
    }

    /// Load the current snapshot, or `None` if the project does not exist.
    pub async fn load_snapshot(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProjectSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, ProjectSnapshot>(
            "SELECT content, bundle, sync_version FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
