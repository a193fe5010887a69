//! Repository for the `mount_points` table.

use migrator_core::types::{new_id, DbId};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::mount_point::{CreateMountPoint, MountPoint};

/// Column list for `mount_points` queries.
const COLUMNS: &str = "id, workload_id, name, size_gb, created_at, updated_at";

/// Provides CRUD operations for mount points.
pub struct MountPointRepo;

impl MountPointRepo {
    /// Attach a new mount point to a workload.
    pub async fn create(
        pool: &PgPool,
        workload_id: DbId,
        input: &CreateMountPoint,
    ) -> Result<MountPoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO mount_points (id, workload_id, name, size_gb) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MountPoint>(&query)
            .bind(new_id())
            .bind(workload_id)
            .bind(&input.name)
            .bind(input.size_gb)
            .fetch_one(pool)
            .await
    }

    /// List a workload's mount points ordered by name.
    pub async fn list_by_workload(
        pool: &PgPool,
        workload_id: DbId,
    ) -> Result<Vec<MountPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM mount_points WHERE workload_id = $1 ORDER BY name"
        );
        sqlx::query_as::<_, MountPoint>(&query)
            .bind(workload_id)
            .fetch_all(pool)
            .await
    }

    /// Delete one mount point of a workload.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(
        pool: &PgPool,
        workload_id: DbId,
        mount_point_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM mount_points WHERE id = $1 AND workload_id = $2")
            .bind(mount_point_id)
            .bind(workload_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace every mount point of a workload within one transaction.
    ///
    /// Delete-all-then-bulk-insert; readers see either the old set or the
    /// new one, never a mix.
    pub async fn replace_for_workload(
        pool: &PgPool,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> Result<Vec<MountPoint>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM mount_points WHERE workload_id = $1")
            .bind(workload_id)
            .execute(&mut *tx)
            .await?;
        let rows = Self::insert_many(&mut tx, workload_id, items).await?;

        tx.commit().await?;
        Ok(rows)
    }

    /// Bulk insert inside a caller's transaction. Rows come back sorted by
    /// name.
    pub async fn insert_many(
        tx: &mut Transaction<'_, Postgres>,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> Result<Vec<MountPoint>, sqlx::Error> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DbId> = items.iter().map(|_| new_id()).collect();
        let names: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
        let sizes: Vec<i64> = items.iter().map(|i| i.size_gb).collect();

        let query = format!(
            "INSERT INTO mount_points (id, workload_id, name, size_gb) \
             SELECT id, $2, name, size_gb \
             FROM UNNEST($1::uuid[], $3::text[], $4::bigint[]) AS t(id, name, size_gb) \
             RETURNING {COLUMNS}"
        );
        let mut rows = sqlx::query_as::<_, MountPoint>(&query)
            .bind(&ids)
            .bind(workload_id)
            .bind(&names)
            .bind(&sizes)
            .fetch_all(&mut **tx)
            .await?;

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}
