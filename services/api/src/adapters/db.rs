//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProjectStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use writing_project_core::domain::ProjectDocument;
use writing_project_core::ports::{PortError, PortResult, ProjectStore};
use writing_project_core::reconcile::normalize_document;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProjectStore` port.
///
/// One row per (activity, user); the document is stored as a single JSONB
/// snapshot, replaced wholesale on every save.
#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    /// Creates a new `PgProjectStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProjectRecord {
    document: Value,
}

impl ProjectRecord {
    /// Restoration goes through the lenient normalizer, so a malformed item
    /// inside an otherwise valid stored snapshot is skipped, not fatal.
    fn to_domain(self) -> PortResult<ProjectDocument> {
        normalize_document(self.document)
    }
}

//=========================================================================================
// `ProjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn load(
        &self,
        activity_id: &str,
        user_id: Uuid,
    ) -> PortResult<Option<ProjectDocument>> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "SELECT document FROM projects WHERE activity_id = $1 AND user_id = $2",
        )
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(ProjectRecord::to_domain).transpose()
    }

    async fn save(
        &self,
        activity_id: &str,
        user_id: Uuid,
        document: &ProjectDocument,
    ) -> PortResult<()> {
        let payload = serde_json::to_value(document)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query(
            "INSERT INTO projects (activity_id, user_id, document) VALUES ($1, $2, $3) \
             ON CONFLICT (activity_id, user_id) \
             DO UPDATE SET document = EXCLUDED.document, updated_at = now()",
        )
        .bind(activity_id)
        .bind(user_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, activity_id: &str, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM projects WHERE activity_id = $1 AND user_id = $2")
            .bind(activity_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
