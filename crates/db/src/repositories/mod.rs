//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Business rules live in
//! `migrator_core` and are applied by [`crate::store::PgStore`] before
//! calling in here.

pub mod migration_repo;
pub mod migration_target_repo;
pub mod mount_point_repo;
pub mod task_repo;
pub mod workload_repo;

pub use migration_repo::MigrationRepo;
pub use migration_target_repo::MigrationTargetRepo;
pub use mount_point_repo::MountPointRepo;
pub use task_repo::TaskRepo;
pub use workload_repo::WorkloadRepo;
