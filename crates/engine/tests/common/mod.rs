//! Shared fixtures for engine integration tests.
//!
//! Everything runs on [`MemoryStore`] and [`InMemoryQueue`]; [`HookedStore`]
//! wraps the store to inject outages and to line up concurrent callers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use migrator_core::inventory::CloudType;
use migrator_core::migration::MigrationState;
use migrator_core::types::DbId;
use migrator_db::models::migration::{CreateMigration, Migration, MigrationListQuery};
use migrator_db::models::migration_target::{
    CreateMigrationTarget, MigrationTarget, UpdateMigrationTarget,
};
use migrator_db::models::mount_point::{CreateMountPoint, MountPoint};
use migrator_db::models::workload::{CreateWorkload, UpdateWorkload, Workload};
use migrator_db::store::{
    InventoryStore, MemoryStore, MigrationStore, Store, StoreError, StoreResult,
};
use migrator_engine::{
    Dispatcher, Executor, InMemoryQueue, MigrationTransfer, TaskQueue, TransferError, WorkerPool,
};
use migrator_events::EventBus;
use tokio::sync::Barrier;

// ---------------------------------------------------------------------------
// Inventory fixture
// ---------------------------------------------------------------------------

pub struct Inventory {
    pub source: Workload,
    pub target_workload: Workload,
    pub target: MigrationTarget,
    pub c_drive: MountPoint,
    pub d_drive: MountPoint,
}

/// Source workload with `C:\` (100 GB) and `D:\` (500 GB), and an AWS
/// target pointing at an empty workload.
pub async fn seed_inventory(store: &dyn Store) -> Inventory {
    let source = store
        .create_workload(&CreateWorkload {
            name: "app-server".into(),
            ip_address: "10.0.0.10".into(),
            mount_points: Vec::new(),
        })
        .await
        .unwrap();
    let target_workload = store
        .create_workload(&CreateWorkload {
            name: "app-server-aws".into(),
            ip_address: "172.16.0.10".into(),
            mount_points: Vec::new(),
        })
        .await
        .unwrap();
    let target = store
        .create_target(&CreateMigrationTarget {
            cloud_type: CloudType::Aws,
            target_workload_id: target_workload.id,
        })
        .await
        .unwrap();
    let c_drive = store
        .add_mount_point(
            source.id,
            &CreateMountPoint {
                name: "C:\\".into(),
                size_gb: 100,
            },
        )
        .await
        .unwrap();
    let d_drive = store
        .add_mount_point(
            source.id,
            &CreateMountPoint {
                name: "D:\\".into(),
                size_gb: 500,
            },
        )
        .await
        .unwrap();

    Inventory {
        source,
        target_workload,
        target,
        c_drive,
        d_drive,
    }
}

pub async fn create_migration(
    store: &dyn Store,
    inventory: &Inventory,
    mount_points: &[&MountPoint],
) -> Migration {
    store
        .create_migration(&CreateMigration {
            source_workload_id: inventory.source.id,
            target_id: inventory.target.id,
            mount_point_ids: mount_points.iter().map(|mp| mp.id).collect(),
        })
        .await
        .unwrap()
}

/// `(name, size_gb)` pairs of a workload's mount points, sorted by name.
pub async fn mount_point_sizes(store: &dyn Store, workload_id: DbId) -> Vec<(String, i64)> {
    store
        .list_mount_points(workload_id)
        .await
        .unwrap()
        .into_iter()
        .map(|mp| (mp.name, mp.size_gb))
        .collect()
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// Succeeds immediately and counts invocations.
#[derive(Default)]
pub struct CountingTransfer {
    pub calls: AtomicUsize,
}

impl CountingTransfer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationTransfer for CountingTransfer {
    async fn transfer(&self, _migration: &Migration) -> Result<(), TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stands in for the queue giving up on the job while the transfer is
/// still running: moves the job from `running` to `error` mid-transfer.
pub struct InterruptedTransfer {
    pub store: Arc<dyn Store>,
}

#[async_trait]
impl MigrationTransfer for InterruptedTransfer {
    async fn transfer(&self, migration: &Migration) -> Result<(), TransferError> {
        self.store
            .update_state(
                migration.id,
                MigrationState::Running,
                MigrationState::Error,
                Some("worker did not finish within the visibility timeout"),
            )
            .await
            .map_err(|e| TransferError(e.to_string()))?;
        Ok(())
    }
}

/// Always fails with the given message.
pub struct FailingTransfer(pub &'static str);

#[async_trait]
impl MigrationTransfer for FailingTransfer {
    async fn transfer(&self, _migration: &Migration) -> Result<(), TransferError> {
        Err(TransferError(self.0.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HookedStore
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryStore`], with hooks:
///
/// - `outages`: the next N `get_migration` calls fail with
///   `StoreError::Unavailable`;
/// - `barrier`: the first `parties` `get_migration` calls wait on the
///   barrier after reading, so concurrent callers all observe the same
///   state before any of them writes;
/// - `success_faults`: the next N `update_state` calls that would write
///   `success` fail with `StoreError::Unavailable`;
/// - `replace_calls`: counts `replace_mount_points`, i.e. copy steps.
pub struct HookedStore {
    pub inner: MemoryStore,
    pub outages: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub barrier: Option<Barrier>,
    pub barrier_uses: AtomicUsize,
    pub success_faults: AtomicUsize,
    pub replace_calls: AtomicUsize,
}

impl HookedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            outages: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            barrier: None,
            barrier_uses: AtomicUsize::new(0),
            success_faults: AtomicUsize::new(0),
            replace_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_barrier(parties: usize) -> Self {
        Self {
            barrier: Some(Barrier::new(parties)),
            barrier_uses: AtomicUsize::new(parties),
            ..Self::new()
        }
    }

    pub fn fail_next_gets(&self, n: usize) {
        self.outages.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_success_writes(&self, n: usize) {
        self.success_faults.store(n, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

/// Take one unit from `counter` if any is left.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl InventoryStore for HookedStore {
    async fn create_workload(&self, input: &CreateWorkload) -> StoreResult<Workload> {
        self.inner.create_workload(input).await
    }
    async fn get_workload(&self, id: DbId) -> StoreResult<Workload> {
        self.inner.get_workload(id).await
    }
    async fn list_workloads(&self) -> StoreResult<Vec<Workload>> {
        self.inner.list_workloads().await
    }
    async fn update_workload(&self, id: DbId, input: &UpdateWorkload) -> StoreResult<Workload> {
        self.inner.update_workload(id, input).await
    }
    async fn delete_workload(&self, id: DbId) -> StoreResult<()> {
        self.inner.delete_workload(id).await
    }
    async fn add_mount_point(
        &self,
        workload_id: DbId,
        input: &CreateMountPoint,
    ) -> StoreResult<MountPoint> {
        self.inner.add_mount_point(workload_id, input).await
    }
    async fn list_mount_points(&self, workload_id: DbId) -> StoreResult<Vec<MountPoint>> {
        self.inner.list_mount_points(workload_id).await
    }
    async fn delete_mount_point(&self, workload_id: DbId, mount_point_id: DbId) -> StoreResult<()> {
        self.inner.delete_mount_point(workload_id, mount_point_id).await
    }
    async fn replace_mount_points(
        &self,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> StoreResult<Vec<MountPoint>> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_mount_points(workload_id, items).await
    }
    async fn create_target(&self, input: &CreateMigrationTarget) -> StoreResult<MigrationTarget> {
        self.inner.create_target(input).await
    }
    async fn get_target(&self, id: DbId) -> StoreResult<MigrationTarget> {
        self.inner.get_target(id).await
    }
    async fn list_targets(&self) -> StoreResult<Vec<MigrationTarget>> {
        self.inner.list_targets().await
    }
    async fn update_target(
        &self,
        id: DbId,
        input: &UpdateMigrationTarget,
    ) -> StoreResult<MigrationTarget> {
        self.inner.update_target(id, input).await
    }
    async fn delete_target(&self, id: DbId) -> StoreResult<()> {
        self.inner.delete_target(id).await
    }
}

#[async_trait]
impl MigrationStore for HookedStore {
    async fn create_migration(&self, input: &CreateMigration) -> StoreResult<Migration> {
        self.inner.create_migration(input).await
    }

    async fn get_migration(&self, id: DbId) -> StoreResult<Migration> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.outages) {
            return Err(StoreError::Unavailable("injected outage".into()));
        }

        let migration = self.inner.get_migration(id).await?;
        if let Some(barrier) = &self.barrier {
            if take_one(&self.barrier_uses) {
                barrier.wait().await;
            }
        }
        Ok(migration)
    }

    async fn list_migrations(&self, query: &MigrationListQuery) -> StoreResult<Vec<Migration>> {
        self.inner.list_migrations(query).await
    }

    async fn update_state(
        &self,
        id: DbId,
        expected: MigrationState,
        new_state: MigrationState,
        error_detail: Option<&str>,
    ) -> StoreResult<Migration> {
        if new_state == MigrationState::Success && take_one(&self.success_faults) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.inner
            .update_state(id, expected, new_state, error_detail)
            .await
    }
}

// ---------------------------------------------------------------------------
// Engine wiring
// ---------------------------------------------------------------------------

pub struct Engine {
    pub store: Arc<dyn Store>,
    pub queue: Arc<InMemoryQueue>,
    pub events: Arc<EventBus>,
    pub dispatcher: Dispatcher,
    pub executor: Arc<Executor>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, transfer: Arc<dyn MigrationTransfer>) -> Self {
        Self::with_queue(store, transfer, Arc::new(InMemoryQueue::new(3, Duration::ZERO)))
    }

    pub fn with_queue(
        store: Arc<dyn Store>,
        transfer: Arc<dyn MigrationTransfer>,
        queue: Arc<InMemoryQueue>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            Arc::clone(&events),
        );
        let executor = Arc::new(Executor::new(Arc::clone(&store), transfer, Arc::clone(&events)));
        Self {
            store,
            queue,
            events,
            dispatcher,
            executor,
        }
    }

    pub fn worker_pool(&self, concurrency: usize) -> WorkerPool {
        WorkerPool::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.queue) as Arc<dyn TaskQueue>,
            concurrency,
            Duration::from_millis(5),
        )
    }
}

/// Poll the store until the job reaches a terminal state.
pub async fn wait_for_terminal(store: &dyn Store, id: DbId) -> Migration {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let migration = store.get_migration(id).await.unwrap();
            if migration.state.is_terminal() {
                return migration;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("migration did not finish in time")
}
