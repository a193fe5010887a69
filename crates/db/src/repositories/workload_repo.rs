//! Repository for the `workloads` table.

use migrator_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::models::mount_point::CreateMountPoint;
use crate::models::workload::Workload;
use crate::repositories::MountPointRepo;

/// Column list for `workloads` queries.
const COLUMNS: &str = "id, name, ip_address, created_at, updated_at";

/// Provides CRUD operations for workloads.
pub struct WorkloadRepo;

impl WorkloadRepo {
    /// Insert a workload and its initial mount points in one transaction.
    /// `ip_address` must already be canonical.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        ip_address: &str,
        mount_points: &[CreateMountPoint],
    ) -> Result<Workload, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO workloads (id, name, ip_address) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let workload = sqlx::query_as::<_, Workload>(&query)
            .bind(new_id())
            .bind(name)
            .bind(ip_address)
            .fetch_one(&mut *tx)
            .await?;
        MountPointRepo::insert_many(&mut tx, workload.id, mount_points).await?;

        tx.commit().await?;
        Ok(workload)
    }

    /// Find a workload by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Workload>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workloads WHERE id = $1");
        sqlx::query_as::<_, Workload>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all workloads, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Workload>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workloads ORDER BY created_at DESC");
        sqlx::query_as::<_, Workload>(&query).fetch_all(pool).await
    }

    /// Rename a workload and, when `mount_points` is given, replace its
    /// mount points in the same transaction. The IP address is never
    /// written after insert.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        mount_points: Option<&[CreateMountPoint]>,
    ) -> Result<Option<Workload>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE workloads SET name = COALESCE($2, name), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let Some(workload) = sqlx::query_as::<_, Workload>(&query)
            .bind(id)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if let Some(items) = mount_points {
            sqlx::query("DELETE FROM mount_points WHERE workload_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            MountPointRepo::insert_many(&mut tx, id, items).await?;
        }

        tx.commit().await?;
        Ok(Some(workload))
    }

    /// Delete a workload (cascades to mount points, targets and migrations).
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workloads WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
