pub mod migration;
pub mod migration_target;
pub mod mount_point;
pub mod workload;
