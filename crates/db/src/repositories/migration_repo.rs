//! Repository for the `migrations` and `migration_mount_points` tables.
//!
//! State changes go through [`MigrationRepo::compare_and_set_state`] only;
//! there is no unconditional state update.

use migrator_core::migration::MigrationState;
use migrator_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::models::migration::{Migration, MigrationListQuery, SelectedMountPoint};

/// Column list for `migrations` queries.
const COLUMNS: &str = "\
    id, source_workload_id, target_id, state, error_detail, \
    started_at, completed_at, created_at, updated_at";

/// Provides persistence for migration jobs.
pub struct MigrationRepo;

impl MigrationRepo {
    /// Insert a migration in `not_started` together with its selection
    /// snapshot, in one transaction.
    pub async fn create(
        pool: &PgPool,
        source_workload_id: DbId,
        target_id: DbId,
        selection: &[SelectedMountPoint],
    ) -> Result<Migration, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO migrations (id, source_workload_id, target_id, state) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let mut migration = sqlx::query_as::<_, Migration>(&query)
            .bind(new_id())
            .bind(source_workload_id)
            .bind(target_id)
            .bind(MigrationState::NotStarted.as_str())
            .fetch_one(&mut *tx)
            .await?;

        for item in selection {
            sqlx::query(
                "INSERT INTO migration_mount_points (migration_id, mount_point_id, name, size_gb) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(migration.id)
            .bind(item.mount_point_id)
            .bind(&item.name)
            .bind(item.size_gb)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        migration.selected_mount_points = selection.to_vec();
        Ok(migration)
    }

    /// Find a migration by its ID, including its selection.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Migration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM migrations WHERE id = $1");
        let migration = sqlx::query_as::<_, Migration>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match migration {
            Some(m) => Ok(Some(Self::with_selection(pool, m).await?)),
            None => Ok(None),
        }
    }

    /// List migrations newest first with optional state filter and paging.
    pub async fn list(
        pool: &PgPool,
        params: &MigrationListQuery,
    ) -> Result<Vec<Migration>, sqlx::Error> {
        let (limit, offset) = params.page();

        let query = format!(
            "SELECT {COLUMNS} FROM migrations \
             WHERE ($1::text IS NULL OR state = $1) \
             ORDER BY created_at DESC, id \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, Migration>(&query)
            .bind(params.state.map(MigrationState::as_str))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for m in rows {
            out.push(Self::with_selection(pool, m).await?);
        }
        Ok(out)
    }

    /// Atomically move a migration from `expected` to `new_state`.
    ///
    /// Returns `None` when the row does not exist or is no longer in
    /// `expected`; the caller distinguishes the two. `started_at` and
    /// `completed_at` are stamped on entering `running` and a terminal
    /// state respectively.
    pub async fn compare_and_set_state(
        pool: &PgPool,
        id: DbId,
        expected: MigrationState,
        new_state: MigrationState,
        error_detail: Option<&str>,
    ) -> Result<Option<Migration>, sqlx::Error> {
        let query = format!(
            "UPDATE migrations \
             SET state = $3, \
                 error_detail = $4, \
                 started_at = CASE WHEN $3 = 'running' THEN NOW() ELSE started_at END, \
                 completed_at = CASE WHEN $3 IN ('success', 'error') THEN NOW() ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND state = $2 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Migration>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(new_state.as_str())
            .bind(error_detail)
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(m) => Ok(Some(Self::with_selection(pool, m).await?)),
            None => Ok(None),
        }
    }

    /// Attach the selection snapshot to a bare migration row.
    async fn with_selection(pool: &PgPool, mut migration: Migration) -> Result<Migration, sqlx::Error> {
        migration.selected_mount_points = sqlx::query_as::<_, SelectedMountPoint>(
            "SELECT mount_point_id, name, size_gb FROM migration_mount_points \
             WHERE migration_id = $1 ORDER BY name",
        )
        .bind(migration.id)
        .fetch_all(pool)
        .await?;
        Ok(migration)
    }
}
