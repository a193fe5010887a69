use migrator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `mount_points` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct MountPoint {
    pub id: DbId,
    pub workload_id: DbId,
    pub name: String,
    pub size_gb: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for adding a mount point to a workload. Also used as the item type
/// when a migration replaces a target's mount points wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreateMountPoint {
    pub name: String,
    pub size_gb: i64,
}
