//! Migration job entity, its selected mount point snapshot, and DTOs.

use migrator_core::migration::MigrationState;
use migrator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A migration job.
///
/// Loaded from the `migrations` row plus its `migration_mount_points`
/// snapshot. Values returned by a store are immutable snapshots; state only
/// changes through `MigrationStore::update_state`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Migration {
    pub id: DbId,
    pub source_workload_id: DbId,
    pub target_id: DbId,
    #[sqlx(try_from = "String")]
    pub state: MigrationState,
    /// Populated only in the `error` state.
    pub error_detail: Option<String>,
    #[sqlx(skip)]
    pub selected_mount_points: Vec<SelectedMountPoint>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Migration {
    /// Names of the selected mount points, in selection order.
    pub fn selected_names(&self) -> impl Iterator<Item = &str> {
        self.selected_mount_points.iter().map(|mp| mp.name.as_str())
    }

    /// Read-only projection served to polling clients.
    pub fn status(&self) -> MigrationStatus {
        MigrationStatus {
            id: self.id,
            state: self.state,
            error_detail: self.error_detail.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A mount point copied into a migration's selection at creation time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SelectedMountPoint {
    /// `None` once the source mount point has been deleted.
    pub mount_point_id: Option<DbId>,
    pub name: String,
    pub size_gb: i64,
}

/// DTO for `POST /api/v1/migrations`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMigration {
    pub source_workload_id: DbId,
    pub target_id: DbId,
    /// Mount points of the source workload to migrate. Must be non-empty.
    pub mount_point_ids: Vec<DbId>,
}

/// Query parameters for `GET /api/v1/migrations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationListQuery {
    /// Filter by state (e.g. `running`).
    pub state: Option<MigrationState>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Maximum page size for migration listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for migration listing.
pub const DEFAULT_LIMIT: i64 = 50;

impl MigrationListQuery {
    /// Effective `(limit, offset)` after defaults and clamping.
    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Status projection returned by `GET /api/v1/migrations/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub id: DbId,
    pub state: MigrationState,
    pub error_detail: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
