//! Integration tests for the PostgreSQL store and task queue repository.
//!
//! Exercises the full repository layer against a real database:
//! - Unique constraints surfaced as domain conflicts
//! - Migration creation with its mount point snapshot
//! - Compare-and-set state updates
//! - Task claim / requeue / visibility timeout
//!
//! `#[sqlx::test]` creates a fresh database per test from `DATABASE_URL`.

use assert_matches::assert_matches;
use migrator_core::error::CoreError;
use migrator_core::inventory::CloudType;
use migrator_core::migration::MigrationState;
use migrator_db::models::migration::{CreateMigration, MigrationListQuery};
use migrator_db::models::migration_target::{CreateMigrationTarget, UpdateMigrationTarget};
use migrator_db::models::mount_point::CreateMountPoint;
use migrator_db::models::task::TaskStatus;
use migrator_db::models::workload::{CreateWorkload, UpdateWorkload};
use migrator_db::repositories::TaskRepo;
use migrator_db::store::{InventoryStore, MigrationStore, PgStore, StoreError};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_workload(name: &str, ip: &str) -> CreateWorkload {
    CreateWorkload {
        name: name.to_string(),
        ip_address: ip.to_string(),
        mount_points: Vec::new(),
    }
}

fn new_mount_point(name: &str, size_gb: i64) -> CreateMountPoint {
    CreateMountPoint {
        name: name.to_string(),
        size_gb,
    }
}

/// Source with C:\ and D:\, plus an AWS target. Returns (store, migration input).
async fn seed(pool: PgPool) -> (PgStore, CreateMigration) {
    let store = PgStore::new(pool);
    let source = store
        .create_workload(&new_workload("source", "10.1.0.1"))
        .await
        .unwrap();
    let target_vm = store
        .create_workload(&new_workload("target", "10.1.0.2"))
        .await
        .unwrap();
    let target = store
        .create_target(&CreateMigrationTarget {
            cloud_type: CloudType::Aws,
            target_workload_id: target_vm.id,
        })
        .await
        .unwrap();
    let c = store
        .add_mount_point(source.id, &new_mount_point("C:\\", 100))
        .await
        .unwrap();
    let d = store
        .add_mount_point(source.id, &new_mount_point("D:\\", 200))
        .await
        .unwrap();

    let input = CreateMigration {
        source_workload_id: source.id,
        target_id: target.id,
        mount_point_ids: vec![d.id, c.id],
    };
    (store, input)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_ip_is_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    store
        .create_workload(&new_workload("a", "192.168.1.10"))
        .await
        .unwrap();

    let err = store
        .create_workload(&new_workload("b", "192.168.1.10"))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Conflict(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_workload_ip_cannot_change(pool: PgPool) {
    let store = PgStore::new(pool);
    let w = store
        .create_workload(&new_workload("a", "192.168.1.10"))
        .await
        .unwrap();

    let err = store
        .update_workload(
            w.id,
            &UpdateWorkload {
                name: None,
                ip_address: Some("192.168.1.11".into()),
                mount_points: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    let reloaded = store.get_workload(w.id).await.unwrap();
    assert_eq!(reloaded.ip_address, "192.168.1.10");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replace_mount_points(pool: PgPool) {
    let store = PgStore::new(pool);
    let w = store
        .create_workload(&new_workload("a", "192.168.1.10"))
        .await
        .unwrap();
    store
        .add_mount_point(w.id, &new_mount_point("Z:\\", 1))
        .await
        .unwrap();

    let replaced = store
        .replace_mount_points(
            w.id,
            &[new_mount_point("D:\\", 20), new_mount_point("C:\\", 10)],
        )
        .await
        .unwrap();

    let names: Vec<&str> = replaced.iter().map(|mp| mp.name.as_str()).collect();
    assert_eq!(names, ["C:\\", "D:\\"]);
    assert_eq!(store.list_mount_points(w.id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_workload_created_with_mount_points(pool: PgPool) {
    let store = PgStore::new(pool);
    let w = store
        .create_workload(&CreateWorkload {
            mount_points: vec![new_mount_point("D:\\", 20), new_mount_point("C:\\", 10)],
            ..new_workload("a", "192.168.1.10")
        })
        .await
        .unwrap();

    let names: Vec<String> = store
        .list_mount_points(w.id)
        .await
        .unwrap()
        .into_iter()
        .map(|mp| mp.name)
        .collect();
    assert_eq!(names, ["C:\\", "D:\\"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_workload_update_replaces_mount_points(pool: PgPool) {
    let store = PgStore::new(pool);
    let w = store
        .create_workload(&CreateWorkload {
            mount_points: vec![new_mount_point("C:\\", 10)],
            ..new_workload("a", "192.168.1.10")
        })
        .await
        .unwrap();

    let updated = store
        .update_workload(
            w.id,
            &UpdateWorkload {
                name: Some("renamed".into()),
                mount_points: Some(vec![new_mount_point("E:\\", 5)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "renamed");

    let listed = store.list_mount_points(w.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "E:\\");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_target_update_and_delete(pool: PgPool) {
    let (store, input) = seed(pool).await;
    let migration = store.create_migration(&input).await.unwrap();
    let spare = store
        .create_workload(&new_workload("spare", "10.1.0.3"))
        .await
        .unwrap();

    let updated = store
        .update_target(
            input.target_id,
            &UpdateMigrationTarget {
                cloud_type: Some(CloudType::Vsphere),
                target_workload_id: Some(spare.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.cloud_type, CloudType::Vsphere);
    assert_eq!(updated.target_workload_id, spare.id);

    let onto_source = store
        .update_target(
            input.target_id,
            &UpdateMigrationTarget {
                target_workload_id: Some(input.source_workload_id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(onto_source, StoreError::Core(CoreError::Validation(_)));

    store.delete_target(input.target_id).await.unwrap();
    assert_matches!(
        store.get_migration(migration.id).await,
        Err(StoreError::Core(CoreError::NotFound { .. }))
    );
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_migration_snapshots_selection(pool: PgPool) {
    let (store, input) = seed(pool).await;

    let migration = store.create_migration(&input).await.unwrap();
    assert_eq!(migration.state, MigrationState::NotStarted);
    assert_eq!(migration.selected_names().collect::<Vec<_>>(), ["C:\\", "D:\\"]);

    let reloaded = store.get_migration(migration.id).await.unwrap();
    assert_eq!(reloaded.selected_mount_points, migration.selected_mount_points);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_compare_and_set_state(pool: PgPool) {
    let (store, input) = seed(pool).await;
    let migration = store.create_migration(&input).await.unwrap();

    let running = store
        .update_state(migration.id, MigrationState::NotStarted, MigrationState::Running, None)
        .await
        .unwrap();
    assert_eq!(running.state, MigrationState::Running);
    assert!(running.started_at.is_some());

    let stale = store
        .update_state(migration.id, MigrationState::NotStarted, MigrationState::Running, None)
        .await
        .unwrap_err();
    assert_matches!(stale, StoreError::Core(CoreError::Conflict(_)));

    let failed = store
        .update_state(
            migration.id,
            MigrationState::Running,
            MigrationState::Error,
            Some("copy failed"),
        )
        .await
        .unwrap();
    assert_eq!(failed.error_detail.as_deref(), Some("copy failed"));
    assert!(failed.completed_at.is_some());

    let listed = store
        .list_migrations(&MigrationListQuery {
            state: Some(MigrationState::Error),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].selected_mount_points.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deleted_mount_point_keeps_snapshot(pool: PgPool) {
    let (store, input) = seed(pool).await;
    let migration = store.create_migration(&input).await.unwrap();

    let d_id = input.mount_point_ids[0];
    store
        .delete_mount_point(input.source_workload_id, d_id)
        .await
        .unwrap();

    let reloaded = store.get_migration(migration.id).await.unwrap();
    let d = reloaded
        .selected_mount_points
        .iter()
        .find(|mp| mp.name == "D:\\")
        .unwrap();
    assert_eq!(d.mount_point_id, None);
    assert_eq!(d.size_gb, 200);
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_task_claim_is_exclusive(pool: PgPool) {
    let (store, input) = seed(pool.clone()).await;
    let migration = store.create_migration(&input).await.unwrap();

    TaskRepo::enqueue(&pool, migration.id, 3).await.unwrap();

    let first = TaskRepo::claim_next(&pool, 300.0).await.unwrap().unwrap();
    assert_eq!(first.status, TaskStatus::Claimed);
    assert_eq!(first.attempts, 1);
    assert!(TaskRepo::claim_next(&pool, 300.0).await.unwrap().is_none());

    TaskRepo::complete(&pool, first.id).await.unwrap();
    let tasks = TaskRepo::list_by_migration(&pool, migration.id).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Done);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_task_redelivered_after_visibility_timeout(pool: PgPool) {
    let (store, input) = seed(pool.clone()).await;
    let migration = store.create_migration(&input).await.unwrap();

    TaskRepo::enqueue(&pool, migration.id, 2).await.unwrap();
    TaskRepo::claim_next(&pool, 0.0).await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let again = TaskRepo::claim_next(&pool, 0.0).await.unwrap().unwrap();
    assert_eq!(again.attempts, 2);

    // Attempts exhausted: not claimable, reaped instead.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(TaskRepo::claim_next(&pool, 0.0).await.unwrap().is_none());
    let reaped = TaskRepo::reap_exhausted(&pool, 0.0).await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].status, TaskStatus::Dead);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_task_requeue_delays_delivery(pool: PgPool) {
    let (store, input) = seed(pool.clone()).await;
    let migration = store.create_migration(&input).await.unwrap();

    let task = TaskRepo::enqueue(&pool, migration.id, 3).await.unwrap();
    TaskRepo::claim_next(&pool, 300.0).await.unwrap().unwrap();
    TaskRepo::requeue(&pool, task.id, "store unavailable", 3600.0)
        .await
        .unwrap();

    assert!(TaskRepo::claim_next(&pool, 300.0).await.unwrap().is_none());
    let tasks = TaskRepo::list_by_migration(&pool, migration.id).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Queued);
    assert_eq!(tasks[0].last_error.as_deref(), Some("store unavailable"));
}
