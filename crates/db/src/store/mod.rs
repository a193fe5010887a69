//! Store traits: the seam between the orchestrator and persistence.
//!
//! [`InventoryStore`] covers workloads, mount points and migration targets;
//! [`MigrationStore`] covers migration jobs and their compare-and-set state
//! updates. [`Store`] is both, and is what the engine and API hold as
//! `Arc<dyn Store>`.
//!
//! Two implementations: [`PgStore`] (repositories over a `PgPool`) and
//! [`MemoryStore`] (process-local, for tests and the `memory` backend).
//! Both apply the same `migrator_core` rules so callers cannot tell them
//! apart.

use std::collections::HashMap;

use async_trait::async_trait;
use migrator_core::error::CoreError;
use migrator_core::inventory::validate_mount_point;
use migrator_core::migration::MigrationState;
use migrator_core::types::DbId;

use crate::models::migration::{CreateMigration, Migration, MigrationListQuery, SelectedMountPoint};
use crate::models::migration_target::{
    CreateMigrationTarget, MigrationTarget, UpdateMigrationTarget,
};
use crate::models::mount_point::{CreateMountPoint, MountPoint};
use crate::models::workload::{CreateWorkload, UpdateWorkload, Workload};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned by every store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error (not found, validation, conflict, transition).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backing store cannot serve requests right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        StoreError::Core(CoreError::NotFound { entity, id })
    }

    /// Whether the failure is infrastructural and worth retrying.
    ///
    /// Domain errors and errors reported by the database server itself
    /// (constraint violations, bad SQL) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Core(_) => false,
            StoreError::Unavailable(_) => true,
            StoreError::Database(err) => !matches!(
                err,
                sqlx::Error::Database(_)
                    | sqlx::Error::RowNotFound
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::TypeNotFound { .. }
                    | sqlx::Error::Decode(_)
            ),
        }
    }

    /// The wrapped domain error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            StoreError::Core(core) => Some(core),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Workloads, their mount points, and migration targets.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Create a workload together with its initial mount points.
    async fn create_workload(&self, input: &CreateWorkload) -> StoreResult<Workload>;
    async fn get_workload(&self, id: DbId) -> StoreResult<Workload>;
    async fn list_workloads(&self) -> StoreResult<Vec<Workload>>;
    /// Rename a workload and optionally replace its mount points in one
    /// step. Fails with `Validation` if the IP would change.
    async fn update_workload(&self, id: DbId, input: &UpdateWorkload) -> StoreResult<Workload>;
    async fn delete_workload(&self, id: DbId) -> StoreResult<()>;

    async fn add_mount_point(
        &self,
        workload_id: DbId,
        input: &CreateMountPoint,
    ) -> StoreResult<MountPoint>;
    async fn list_mount_points(&self, workload_id: DbId) -> StoreResult<Vec<MountPoint>>;
    async fn delete_mount_point(&self, workload_id: DbId, mount_point_id: DbId) -> StoreResult<()>;
    /// Atomically replace all mount points of a workload.
    async fn replace_mount_points(
        &self,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> StoreResult<Vec<MountPoint>>;

    async fn create_target(&self, input: &CreateMigrationTarget) -> StoreResult<MigrationTarget>;
    async fn get_target(&self, id: DbId) -> StoreResult<MigrationTarget>;
    async fn list_targets(&self) -> StoreResult<Vec<MigrationTarget>>;
    /// Change the cloud type or point the target at another workload.
    async fn update_target(
        &self,
        id: DbId,
        input: &UpdateMigrationTarget,
    ) -> StoreResult<MigrationTarget>;
    /// Delete a target and every migration that uses it.
    async fn delete_target(&self, id: DbId) -> StoreResult<()>;
}

/// Durable record of migration jobs.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create a job in `not_started`.
    ///
    /// Fails with `Validation` if `mount_point_ids` is empty or names a
    /// mount point not owned by the source workload.
    async fn create_migration(&self, input: &CreateMigration) -> StoreResult<Migration>;

    /// Fails with `NotFound` if absent.
    async fn get_migration(&self, id: DbId) -> StoreResult<Migration>;

    async fn list_migrations(&self, query: &MigrationListQuery) -> StoreResult<Vec<Migration>>;

    /// Compare-and-set the job state.
    ///
    /// - `InvalidTransition` if `expected -> new_state` is not an edge of
    ///   the state machine (storage is not touched).
    /// - `NotFound` if the job does not exist.
    /// - `Conflict` if the stored state is not `expected`.
    ///
    /// `error_detail` is persisted only for the `error` state.
    async fn update_state(
        &self,
        id: DbId,
        expected: MigrationState,
        new_state: MigrationState,
        error_detail: Option<&str>,
    ) -> StoreResult<Migration>;
}

/// Everything the orchestrator needs from persistence.
pub trait Store: InventoryStore + MigrationStore {}

impl<T: InventoryStore + MigrationStore> Store for T {}

// ---------------------------------------------------------------------------
// Shared rules
// ---------------------------------------------------------------------------

/// Validate a whole set of mount point inputs: each item on its own, and
/// names unique within the set.
pub(crate) fn validate_mount_point_set(items: &[CreateMountPoint]) -> Result<(), CoreError> {
    for (i, item) in items.iter().enumerate() {
        validate_mount_point(&item.name, item.size_gb)?;
        if items[..i].iter().any(|other| other.name == item.name) {
            return Err(CoreError::Conflict(format!(
                "Mount point \"{}\" appears more than once",
                item.name
            )));
        }
    }
    Ok(())
}

/// Resolve requested mount point ids against the source workload's mount
/// points, producing the selection snapshot (sorted by name, duplicates
/// collapsed).
pub(crate) fn select_mount_points(
    owned: &[MountPoint],
    requested: &[DbId],
) -> Result<Vec<SelectedMountPoint>, CoreError> {
    if requested.is_empty() {
        return Err(CoreError::Validation(
            "At least one mount point must be selected".to_string(),
        ));
    }

    let by_id: HashMap<DbId, &MountPoint> = owned.iter().map(|mp| (mp.id, mp)).collect();
    let mut selection: HashMap<DbId, SelectedMountPoint> = HashMap::new();

    for id in requested {
        let mp = by_id.get(id).ok_or_else(|| {
            CoreError::Validation(format!(
                "Mount point {id} does not belong to the source workload"
            ))
        })?;
        selection.entry(*id).or_insert_with(|| SelectedMountPoint {
            mount_point_id: Some(mp.id),
            name: mp.name.clone(),
            size_gb: mp.size_gb,
        });
    }

    let mut selection: Vec<SelectedMountPoint> = selection.into_values().collect();
    selection.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(selection)
}

/// A target whose workload is the source itself would copy onto itself.
pub(crate) fn ensure_distinct_workloads(
    source_workload_id: DbId,
    target: &MigrationTarget,
) -> Result<(), CoreError> {
    if target.target_workload_id == source_workload_id {
        return Err(CoreError::Validation(
            "Source workload and target workload must differ".to_string(),
        ));
    }
    Ok(())
}

/// Copy the selection of a migration as mount point inputs for the target.
pub fn copies_of(selection: &[SelectedMountPoint]) -> Vec<CreateMountPoint> {
    selection
        .iter()
        .map(|mp| CreateMountPoint {
            name: mp.name.clone(),
            size_gb: mp.size_gb,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use migrator_core::types::new_id;

    use super::*;

    fn mount_point(workload_id: DbId, name: &str, size_gb: i64) -> MountPoint {
        MountPoint {
            id: new_id(),
            workload_id,
            name: name.to_string(),
            size_gb,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn selection_rejects_empty_request() {
        assert_matches!(select_mount_points(&[], &[]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn selection_rejects_foreign_mount_point() {
        let source = new_id();
        let owned = vec![mount_point(source, "C:\\", 100)];
        assert_matches!(
            select_mount_points(&owned, &[new_id()]),
            Err(CoreError::Validation(msg)) if msg.contains("does not belong")
        );
    }

    #[test]
    fn selection_collapses_duplicates_and_sorts_by_name() {
        let source = new_id();
        let d = mount_point(source, "D:\\", 500);
        let c = mount_point(source, "C:\\", 100);
        let owned = vec![d.clone(), c.clone()];

        let selection = select_mount_points(&owned, &[d.id, c.id, d.id]).unwrap();

        assert_eq!(selection.len(), 2);
        assert_eq!(selection[0].name, "C:\\");
        assert_eq!(selection[0].mount_point_id, Some(c.id));
        assert_eq!(selection[1].size_gb, 500);
    }

    #[test]
    fn mount_point_set_rejects_repeated_names() {
        let items = vec![
            CreateMountPoint { name: "C:\\".into(), size_gb: 10 },
            CreateMountPoint { name: "C:\\".into(), size_gb: 20 },
        ];
        assert_matches!(validate_mount_point_set(&items), Err(CoreError::Conflict(_)));
        assert_matches!(validate_mount_point_set(&items[..1]), Ok(()));
        assert_matches!(
            validate_mount_point_set(&[CreateMountPoint { name: "E:\\".into(), size_gb: 0 }]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn database_server_errors_are_not_retryable() {
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(!StoreError::not_found("Migration", new_id()).is_retryable());
    }
}
