//! Workload entity: a source or target server / virtual machine.

use migrator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::mount_point::CreateMountPoint;

/// A row from the `workloads` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Workload {
    pub id: DbId,
    pub name: String,
    /// Canonical text form; unique and immutable after creation.
    pub ip_address: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /api/v1/workloads`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkload {
    pub name: String,
    pub ip_address: String,
    /// Mount points created together with the workload.
    #[serde(default)]
    pub mount_points: Vec<CreateMountPoint>,
}

/// DTO for `PUT /api/v1/workloads/{id}`.
///
/// `ip_address` is accepted only so a client can echo the current value
/// back; any other value is rejected. When `mount_points` is present it
/// replaces the workload's whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkload {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub mount_points: Option<Vec<CreateMountPoint>>,
}
