//! Project (collaboration room) models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use syncsphere_core::types::{DbId, Timestamp};

/// Project metadata from the `projects` table. The snapshot blobs are
/// deliberately excluded; listing and existence checks never drag them
/// across the wire.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub sync_version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The full persisted state of a project: structured content plus the opaque
/// session bundle, stamped with the version that wrote it.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectSnapshot {
    pub content: serde_json::Value,
    pub bundle: Option<Vec<u8>>,
    pub sync_version: i64,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
}
