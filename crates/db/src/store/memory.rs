//! Process-local [`Store`](super::Store) implementation.
//!
//! All state lives behind a single `tokio::sync::RwLock`; every write
//! (including the compare-and-set and the mount point replacement) happens
//! under one write guard, which gives the same atomicity the PostgreSQL
//! implementation gets from transactions. Cascading deletes mirror the
//! foreign keys in `db/migrations`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use migrator_core::error::CoreError;
use migrator_core::inventory::{
    ensure_ip_unchanged, normalize_ip_address, validate_mount_point, validate_workload_name,
};
use migrator_core::migration::{validate_transition, MigrationState};
use migrator_core::types::{new_id, DbId};
use tokio::sync::RwLock;

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

#[derive(Default)]
struct Inner {
    workloads: HashMap<DbId, Workload>,
    mount_points: HashMap<DbId, MountPoint>,
    targets: HashMap<DbId, MigrationTarget>,
    migrations: HashMap<DbId, Migration>,
}

impl Inner {
    fn workload(&self, id: DbId) -> StoreResult<&Workload> {
        self.workloads
            .get(&id)
            .ok_or_else(|| StoreError::not_found("Workload", id))
    }

    fn mount_points_of(&self, workload_id: DbId) -> Vec<MountPoint> {
        let mut out: Vec<MountPoint> = self
            .mount_points
            .values()
            .filter(|mp| mp.workload_id == workload_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn target(&self, id: DbId) -> StoreResult<&MigrationTarget> {
        self.targets
            .get(&id)
            .ok_or_else(|| StoreError::not_found("MigrationTarget", id))
    }

    /// Swap a workload's mount points for `items`. The set must already be
    /// validated.
    fn replace_mount_points(&mut self, workload_id: DbId, items: &[CreateMountPoint]) {
        let existing: Vec<DbId> = self
            .mount_points_of(workload_id)
            .iter()
            .map(|mp| mp.id)
            .collect();
        self.remove_mount_points(&existing);

        let now = Utc::now();
        for item in items {
            let mount_point = MountPoint {
                id: new_id(),
                workload_id,
                name: item.name.clone(),
                size_gb: item.size_gb,
                created_at: now,
                updated_at: now,
            };
            self.mount_points.insert(mount_point.id, mount_point);
        }
    }

    /// Drop mount points and null out snapshot references to them.
    fn remove_mount_points(&mut self, ids: &[DbId]) {
        for id in ids {
            self.mount_points.remove(id);
        }
        for migration in self.migrations.values_mut() {
            for selected in &mut migration.selected_mount_points {
                if selected.mount_point_id.is_some_and(|mp_id| ids.contains(&mp_id)) {
                    selected.mount_point_id = None;
                }
            }
        }
    }
}

/// In-memory store. Share it as `Arc<MemoryStore>`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn create_workload(&self, input: &CreateWorkload) -> StoreResult<Workload> {
        validate_workload_name(&input.name)?;
        let ip = normalize_ip_address(&input.ip_address)?;
        validate_mount_point_set(&input.mount_points)?;

        let mut inner = self.inner.write().await;
        if inner.workloads.values().any(|w| w.ip_address == ip) {
            return Err(CoreError::Conflict(format!(
                "A workload with IP address {ip} already exists"
            ))
            .into());
        }

        let now = Utc::now();
        let workload = Workload {
            id: new_id(),
            name: input.name.trim().to_string(),
            ip_address: ip,
            created_at: now,
            updated_at: now,
        };
        inner.workloads.insert(workload.id, workload.clone());
        inner.replace_mount_points(workload.id, &input.mount_points);
        Ok(workload)
    }

    async fn get_workload(&self, id: DbId) -> StoreResult<Workload> {
        self.inner.read().await.workload(id).cloned()
    }

    async fn list_workloads(&self) -> StoreResult<Vec<Workload>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Workload> = inner.workloads.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_workload(&self, id: DbId, input: &UpdateWorkload) -> StoreResult<Workload> {
        let mut inner = self.inner.write().await;
        let current = inner.workload(id)?;
        ensure_ip_unchanged(&current.ip_address, input.ip_address.as_deref())?;
        if let Some(name) = input.name.as_deref() {
            validate_workload_name(name)?;
        }
        if let Some(items) = &input.mount_points {
            validate_mount_point_set(items)?;
            inner.replace_mount_points(id, items);
        }

        let workload = inner
            .workloads
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Workload", id))?;
        if let Some(name) = input.name.as_deref() {
            workload.name = name.trim().to_string();
            workload.updated_at = Utc::now();
        }
        Ok(workload.clone())
    }

    async fn delete_workload(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.workloads.remove(&id).is_none() {
            return Err(StoreError::not_found("Workload", id));
        }

        let owned: Vec<DbId> = inner.mount_points_of(id).iter().map(|mp| mp.id).collect();
        inner.remove_mount_points(&owned);

        inner.targets.retain(|_, t| t.target_workload_id != id);
        let Inner {
            targets,
            migrations,
            ..
        } = &mut *inner;
        migrations.retain(|_, m| m.source_workload_id != id && targets.contains_key(&m.target_id));
        Ok(())
    }

    async fn add_mount_point(
        &self,
        workload_id: DbId,
        input: &CreateMountPoint,
    ) -> StoreResult<MountPoint> {
        validate_mount_point(&input.name, input.size_gb)?;

        let mut inner = self.inner.write().await;
        inner.workload(workload_id)?;
        if inner
            .mount_points
            .values()
            .any(|mp| mp.workload_id == workload_id && mp.name == input.name)
        {
            return Err(CoreError::Conflict(format!(
                "Mount point \"{}\" already exists on this workload",
                input.name
            ))
            .into());
        }

        let now = Utc::now();
        let mount_point = MountPoint {
            id: new_id(),
            workload_id,
            name: input.name.clone(),
            size_gb: input.size_gb,
            created_at: now,
            updated_at: now,
        };
        inner.mount_points.insert(mount_point.id, mount_point.clone());
        Ok(mount_point)
    }

    async fn list_mount_points(&self, workload_id: DbId) -> StoreResult<Vec<MountPoint>> {
        let inner = self.inner.read().await;
        inner.workload(workload_id)?;
        Ok(inner.mount_points_of(workload_id))
    }

    async fn delete_mount_point(&self, workload_id: DbId, mount_point_id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .mount_points
            .get(&mount_point_id)
            .is_some_and(|mp| mp.workload_id == workload_id);
        if !owned {
            return Err(StoreError::not_found("MountPoint", mount_point_id));
        }
        inner.remove_mount_points(&[mount_point_id]);
        Ok(())
    }

    async fn replace_mount_points(
        &self,
        workload_id: DbId,
        items: &[CreateMountPoint],
    ) -> StoreResult<Vec<MountPoint>> {
        validate_mount_point_set(items)?;

        let mut inner = self.inner.write().await;
        inner.workload(workload_id)?;
        inner.replace_mount_points(workload_id, items);
        Ok(inner.mount_points_of(workload_id))
    }

    async fn create_target(&self, input: &CreateMigrationTarget) -> StoreResult<MigrationTarget> {
        let mut inner = self.inner.write().await;
        inner.workload(input.target_workload_id)?;
        if inner
            .targets
            .values()
            .any(|t| t.target_workload_id == input.target_workload_id)
        {
            return Err(CoreError::Conflict(
                "The workload is already used by another migration target".to_string(),
            )
            .into());
        }

        let now = Utc::now();
        let target = MigrationTarget {
            id: new_id(),
            cloud_type: input.cloud_type,
            target_workload_id: input.target_workload_id,
            created_at: now,
            updated_at: now,
        };
        inner.targets.insert(target.id, target.clone());
        Ok(target)
    }

    async fn get_target(&self, id: DbId) -> StoreResult<MigrationTarget> {
        self.inner.read().await.target(id).cloned()
    }

    async fn list_targets(&self) -> StoreResult<Vec<MigrationTarget>> {
        let inner = self.inner.read().await;
        let mut out: Vec<MigrationTarget> = inner.targets.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update_target(
        &self,
        id: DbId,
        input: &UpdateMigrationTarget,
    ) -> StoreResult<MigrationTarget> {
        let mut inner = self.inner.write().await;
        let current = inner.target(id)?.clone();

        if let Some(workload_id) = input
            .target_workload_id
            .filter(|w| *w != current.target_workload_id)
        {
            inner.workload(workload_id)?;
            if inner
                .targets
                .values()
                .any(|t| t.target_workload_id == workload_id)
            {
                return Err(CoreError::Conflict(
                    "The workload is already used by another migration target".to_string(),
                )
                .into());
            }
            let moved = MigrationTarget {
                target_workload_id: workload_id,
                ..current
            };
            for migration in inner.migrations.values().filter(|m| m.target_id == id) {
                ensure_distinct_workloads(migration.source_workload_id, &moved)?;
            }
        }

        let target = inner
            .targets
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("MigrationTarget", id))?;
        if let Some(cloud_type) = input.cloud_type {
            target.cloud_type = cloud_type;
        }
        if let Some(workload_id) = input.target_workload_id {
            target.target_workload_id = workload_id;
        }
        target.updated_at = Utc::now();
        Ok(target.clone())
    }

    async fn delete_target(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.targets.remove(&id).is_none() {
            return Err(StoreError::not_found("MigrationTarget", id));
        }
        inner.migrations.retain(|_, m| m.target_id != id);
        Ok(())
    }
}

#[async_trait]
impl MigrationStore for MemoryStore {
    async fn create_migration(&self, input: &CreateMigration) -> StoreResult<Migration> {
        let mut inner = self.inner.write().await;
        inner.workload(input.source_workload_id)?;
        let target = inner.target(input.target_id)?;
        ensure_distinct_workloads(input.source_workload_id, target)?;

        let owned = inner.mount_points_of(input.source_workload_id);
        let selection = select_mount_points(&owned, &input.mount_point_ids)?;

        let now = Utc::now();
        let migration = Migration {
            id: new_id(),
            source_workload_id: input.source_workload_id,
            target_id: input.target_id,
            state: MigrationState::NotStarted,
            error_detail: None,
            selected_mount_points: selection,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.migrations.insert(migration.id, migration.clone());
        Ok(migration)
    }

    async fn get_migration(&self, id: DbId) -> StoreResult<Migration> {
        self.inner
            .read()
            .await
            .migrations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Migration", id))
    }

    async fn list_migrations(&self, query: &MigrationListQuery) -> StoreResult<Vec<Migration>> {
        let (limit, offset) = query.page();
        let inner = self.inner.read().await;

        let mut out: Vec<Migration> = inner
            .migrations
            .values()
            .filter(|m| query.state.map_or(true, |s| m.state == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(out
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_state(
        &self,
        id: DbId,
        expected: MigrationState,
        new_state: MigrationState,
        error_detail: Option<&str>,
    ) -> StoreResult<Migration> {
        validate_transition(expected, new_state)?;

        let mut inner = self.inner.write().await;
        let migration = inner
            .migrations
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Migration", id))?;

        if migration.state != expected {
            return Err(CoreError::Conflict(format!(
                "Migration {id} is {}, expected {expected}",
                migration.state
            ))
            .into());
        }

        let now = Utc::now();
        migration.state = new_state;
        migration.error_detail = error_detail
            .filter(|_| new_state == MigrationState::Error)
            .map(str::to_string);
        if new_state == MigrationState::Running {
            migration.started_at = Some(now);
        }
        if new_state.is_terminal() {
            migration.completed_at = Some(now);
        }
        migration.updated_at = now;

        Ok(migration.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
