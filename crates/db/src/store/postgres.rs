//! [`Store`](super::Store) implementation over PostgreSQL repositories.

use async_trait::async_trait;
use migrator_core::error::CoreError;
use migrator_core::inventory::{
    ensure_ip_unchanged, normalize_ip_address, validate_mount_point, validate_workload_name,
};
use migrator_core::migration::{validate_transition, MigrationState};
use migrator_core::types::DbId;
use sqlx::PgPool;

use super::{
    ensure_distinct_workloads, select_mount_points, validate_mount_point_set, InventoryStore,
    MigrationStore, StoreError, StoreResult,
};
use crate::models::migration::{CreateMigration, Migration, MigrationListQuery};
use crate::models::migration_target::{
    CreateMigrationTarget, MigrationTarget, UpdateMigrationTarget,
};
use crate::models::mount_point::{CreateMountPoint, MountPoint};
use crate::models::workload::{CreateWorkload, UpdateWorkload, Workload};
use crate::repositories::{MigrationRepo, MigrationTargetRepo, MountPointRepo, WorkloadRepo};

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed store. Cheap to clone (the pool is reference counted).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn a unique violation on one of our `uq_*` constraints into a domain
/// `Conflict` so both store implementations report duplicates the same way.
fn map_unique_violation(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let is_ours = db_err
            .constraint()
            .is_some_and(|name| name.starts_with("uq_"));
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) && is_ours {
            return StoreError::Core(CoreError::Conflict(message.to_string()));
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn create_workload(&self, input: &CreateWorkload) -> StoreResult<Workload> {
        validate_workload_name(&input.name)?;
        let ip = normalize_ip_address(&input.ip_address)?;
        validate_mount_point_set(&input.mount_points)?;

        WorkloadRepo::create(&self.pool, input.name.trim(), &ip, &input.mount_points)
            .await
            .map_err(|e| {
                map_unique_violation(e, &format!("A workload with IP address {ip} already exists"))
            })
    }

    async fn get_workload(&self, id: DbId) -> StoreResult<Workload> {
        WorkloadRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("Workload", id))
    }

    async fn list_workloads(&self) -> StoreResult<Vec<Workload>> {
        Ok(WorkloadRepo::list(&self.pool).await?)
    }

    async fn update_workload(&self, id: DbId, input: &UpdateWorkload) -> StoreResult<Workload> {
        let current = self.get_workload(id).await?;
        ensure_ip_unchanged(&current.ip_address, input.ip_address.as_deref())?;
        if let Some(name) = input.name.as_deref() {
            validate_workload_name(name)?;
        }
        if let Some(items) = &input.mount_points {
            validate_mount_point_set(items)?;
        }

        WorkloadRepo::update(
            &self.pool,
            id,
            input.name.as_deref().map(str::trim),
            input.mount_points.as_deref(),
        )
        .await?
        .ok_or_else(|| StoreError::not_found("Workload", id))
    }

    async fn delete_workload(&self, id: DbId) -> StoreResult<()> {
        if WorkloadRepo::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::not_found("Workload", id))
        }
    }

    async fn add_mount_point(
        &self,
        workload_id: DbId,
        input: &CreateMountPoint,
    ) -> StoreResult<MountPoint> {
        validate_mount_point(&input.name, input.size_gb)?;
        self.get_workload(workload_id).await?;

        MountPointRepo::create(&self.pool, workload_id, input)
            .await
            .map_err(|e| {
                map_unique_violation(
                    e,
                    &format!("Mount point \"{}\" already exists on this workload", input.name),
                )
            })
    }

    async fn list_mount_points(&self, workload_id: DbId) -> StoreResult<Vec<MountPoint>> {
        self.get_workload(workload_id).await?;
        Ok(MountPointRepo::list_by_workload(&self.pool, workload_id).await?)
    }

    async fn delete_mount_point(&self, workload_id: DbId, mount_point_id: DbId) -> StoreResult<()> {
        if MountPointRepo::delete(&self.pool, workload_id, mount_point_id).await? {
            Ok(())
        } else {
            Err(StoreError::not_found("MountPoint", mount_point_id))
        }
    }

    async fn replace_mount_points(
        &self,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> StoreResult<Vec<MountPoint>> {
        validate_mount_point_set(items)?;
        self.get_workload(workload_id).await?;

        Ok(MountPointRepo::replace_for_workload(&self.pool, workload_id, items).await?)
    }

    async fn create_target(&self, input: &CreateMigrationTarget) -> StoreResult<MigrationTarget> {
        self.get_workload(input.target_workload_id).await?;

        MigrationTargetRepo::create(&self.pool, input.cloud_type, input.target_workload_id)
            .await
            .map_err(|e| {
                map_unique_violation(e, "The workload is already used by another migration target")
            })
    }

    async fn get_target(&self, id: DbId) -> StoreResult<MigrationTarget> {
        MigrationTargetRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("MigrationTarget", id))
    }

    async fn list_targets(&self) -> StoreResult<Vec<MigrationTarget>> {
        Ok(MigrationTargetRepo::list(&self.pool).await?)
    }

    async fn update_target(
        &self,
        id: DbId,
        input: &UpdateMigrationTarget,
    ) -> StoreResult<MigrationTarget> {
        let current = self.get_target(id).await?;
        if let Some(workload_id) = input
            .target_workload_id
            .filter(|w| *w != current.target_workload_id)
        {
            self.get_workload(workload_id).await?;
            if MigrationTargetRepo::has_migration_from(&self.pool, id, workload_id).await? {
                return Err(CoreError::Validation(
                    "Source workload and target workload must differ".to_string(),
                )
                .into());
            }
        }

        MigrationTargetRepo::update(&self.pool, id, input.cloud_type, input.target_workload_id)
            .await
            .map_err(|e| {
                map_unique_violation(e, "The workload is already used by another migration target")
            })?
            .ok_or_else(|| StoreError::not_found("MigrationTarget", id))
    }

    async fn delete_target(&self, id: DbId) -> StoreResult<()> {
        if MigrationTargetRepo::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::not_found("MigrationTarget", id))
        }
    }
}

#[async_trait]
impl MigrationStore for PgStore {
    async fn create_migration(&self, input: &CreateMigration) -> StoreResult<Migration> {
        self.get_workload(input.source_workload_id).await?;
        let target = self.get_target(input.target_id).await?;
        ensure_distinct_workloads(input.source_workload_id, &target)?;

        let owned = MountPointRepo::list_by_workload(&self.pool, input.source_workload_id).await?;
        let selection = select_mount_points(&owned, &input.mount_point_ids)?;

        Ok(MigrationRepo::create(&self.pool, input.source_workload_id, input.target_id, &selection).await?)
    }

    async fn get_migration(&self, id: DbId) -> StoreResult<Migration> {
        MigrationRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("Migration", id))
    }

    async fn list_migrations(&self, query: &MigrationListQuery) -> StoreResult<Vec<Migration>> {
        Ok(MigrationRepo::list(&self.pool, query).await?)
    }

    async fn update_state(
        &self,
        id: DbId,
        expected: MigrationState,
        new_state: MigrationState,
        error_detail: Option<&str>,
    ) -> StoreResult<Migration> {
        validate_transition(expected, new_state)?;
        let detail = error_detail.filter(|_| new_state == MigrationState::Error);

        if let Some(updated) =
            MigrationRepo::compare_and_set_state(&self.pool, id, expected, new_state, detail).await?
        {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or someone else moved it.
        let current = self.get_migration(id).await?;
        Err(StoreError::Core(CoreError::Conflict(format!(
            "Migration {id} is {}, expected {expected}",
            current.state
        ))))
    }
}
