//! Repository for the `migration_targets` table.

use migrator_core::inventory::CloudType;
use migrator_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::models::migration_target::MigrationTarget;

/// Column list for `migration_targets` queries.
const COLUMNS: &str = "id, cloud_type, target_workload_id, created_at, updated_at";

/// Provides CRUD operations for migration targets.
pub struct MigrationTargetRepo;

impl MigrationTargetRepo {
    pub async fn create(
        pool: &PgPool,
        cloud_type: CloudType,
        target_workload_id: DbId,
    ) -> Result<MigrationTarget, sqlx::Error> {
        let query = format!(
            "INSERT INTO migration_targets (id, cloud_type, target_workload_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationTarget>(&query)
            .bind(new_id())
            .bind(cloud_type.as_str())
            .bind(target_workload_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MigrationTarget>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM migration_targets WHERE id = $1");
        sqlx::query_as::<_, MigrationTarget>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<MigrationTarget>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM migration_targets ORDER BY created_at DESC");
        sqlx::query_as::<_, MigrationTarget>(&query)
            .fetch_all(pool)
            .await
    }

    /// Update the given fields; `None` keeps the stored value.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        cloud_type: Option<CloudType>,
        target_workload_id: Option<DbId>,
    ) -> Result<Option<MigrationTarget>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_targets SET \
                cloud_type = COALESCE($2, cloud_type), \
                target_workload_id = COALESCE($3, target_workload_id), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MigrationTarget>(&query)
            .bind(id)
            .bind(cloud_type.map(CloudType::as_str))
            .bind(target_workload_id)
            .fetch_optional(pool)
            .await
    }

    /// Whether any migration of this target reads from `workload_id`.
    pub async fn has_migration_from(
        pool: &PgPool,
        id: DbId,
        workload_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (\
                SELECT 1 FROM migrations WHERE target_id = $1 AND source_workload_id = $2\
             )",
        )
        .bind(id)
        .bind(workload_id)
        .fetch_one(pool)
        .await
    }

    /// Delete a target (cascades to its migrations).
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM migration_targets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
