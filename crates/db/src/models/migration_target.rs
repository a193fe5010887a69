use migrator_core::inventory::CloudType;
use migrator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `migration_targets` table: where a workload is migrated to.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct MigrationTarget {
    pub id: DbId,
    #[sqlx(try_from = "String")]
    pub cloud_type: CloudType,
    /// The workload that receives the copied mount points.
    pub target_workload_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /api/v1/migration-targets`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMigrationTarget {
    pub cloud_type: CloudType,
    pub target_workload_id: DbId,
}

/// DTO for `PUT /api/v1/migration-targets/{id}`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMigrationTarget {
    pub cloud_type: Option<CloudType>,
    pub target_workload_id: Option<DbId>,
}
