//! Runs one delivered migration task to a terminal state.
//!
//! Protocol per delivery:
//!
//! 1. Re-read the job. Anything but `running` means this delivery is a
//!    duplicate and is skipped.
//! 2. Transfer, re-read the job again, then replace the target workload's
//!    mount points with copies of the job's selection (one transaction).
//!    A job that left `running` during the transfer is skipped before the
//!    copy.
//! 3. CAS `running -> success`, or `running -> error` with the failure
//!    detail if step 2 failed. If the success CAS cannot be written the
//!    job is moved to `error` instead, so a later delivery never repeats
//!    the copy.
//!
//! Only infrastructure failures while reading the job, or while writing
//! both terminal states, escape as `Err`; the worker hands those back to
//! the queue for another delivery, which starts again at step 1.

use std::sync::Arc;

use migrator_core::error::CoreError;
use migrator_core::migration::MigrationState;
use migrator_core::types::DbId;
use migrator_db::models::migration::Migration;
use migrator_db::store::{copies_of, Store, StoreError, StoreResult};
use migrator_events::{EventBus, MigrationEvent};

use crate::transfer::MigrationTransfer;

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The job reached `success` in this delivery.
    Succeeded,
    /// The job reached `error` in this delivery.
    Failed { detail: String },
    /// The job was not `running` (duplicate delivery, or another delivery
    /// won the final CAS). Nothing was written.
    Skipped { state: MigrationState },
    /// The job no longer exists.
    Missing,
}

pub struct Executor {
    store: Arc<dyn Store>,
    transfer: Arc<dyn MigrationTransfer>,
    events: Arc<EventBus>,
}

impl Executor {
    pub fn new(
        store: Arc<dyn Store>,
        transfer: Arc<dyn MigrationTransfer>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            transfer,
            events,
        }
    }

    pub async fn execute(&self, migration_id: DbId) -> StoreResult<ExecutionOutcome> {
        let migration = match self.store.get_migration(migration_id).await {
            Ok(m) => m,
            Err(StoreError::Core(CoreError::NotFound { .. })) => {
                tracing::warn!(migration_id = %migration_id, "Migration vanished before execution");
                return Ok(ExecutionOutcome::Missing);
            }
            Err(e) => return Err(e),
        };

        if migration.state != MigrationState::Running {
            tracing::debug!(
                migration_id = %migration_id,
                state = %migration.state,
                "Duplicate delivery, skipping",
            );
            return Ok(ExecutionOutcome::Skipped {
                state: migration.state,
            });
        }

        if let Err(err) = self.transfer_data(&migration).await {
            return self.fail(migration_id, err).await;
        }

        if let Some(outcome) = self.ensure_still_running(migration_id).await? {
            return Ok(outcome);
        }

        match self.copy_selection(&migration).await {
            Ok(()) => self.succeed(migration_id).await,
            Err(err) => self.fail(migration_id, err).await,
        }
    }

    /// Move a `running` job to `error` without doing any work. Used when the
    /// queue gives up on its task.
    pub async fn abandon(
        &self,
        migration_id: DbId,
        detail: String,
    ) -> StoreResult<ExecutionOutcome> {
        self.record(migration_id, MigrationState::Error, Some(detail))
            .await
    }

    async fn transfer_data(&self, migration: &Migration) -> Result<(), CoreError> {
        self.transfer
            .transfer(migration)
            .await
            .map_err(|e| CoreError::Execution(format!("Transfer failed: {e}")))
    }

    /// `None` while the job is still `running`. Another delivery may have
    /// finished it, or the queue may have given up on it, while the
    /// transfer ran.
    async fn ensure_still_running(
        &self,
        migration_id: DbId,
    ) -> StoreResult<Option<ExecutionOutcome>> {
        match self.store.get_migration(migration_id).await {
            Ok(current) if current.state == MigrationState::Running => Ok(None),
            Ok(current) => {
                tracing::info!(
                    migration_id = %migration_id,
                    state = %current.state,
                    "Job left running during transfer, not copying",
                );
                Ok(Some(ExecutionOutcome::Skipped {
                    state: current.state,
                }))
            }
            Err(StoreError::Core(CoreError::NotFound { .. })) => Ok(Some(ExecutionOutcome::Missing)),
            Err(e) => Err(e),
        }
    }

    /// Any failure here, storage faults included, becomes the job's error
    /// detail.
    async fn copy_selection(&self, migration: &Migration) -> Result<(), CoreError> {
        let target = self
            .store
            .get_target(migration.target_id)
            .await
            .map_err(|e| {
                CoreError::Execution(format!("Failed to resolve migration target: {e}"))
            })?;

        self.store
            .replace_mount_points(
                target.target_workload_id,
                &copies_of(&migration.selected_mount_points),
            )
            .await
            .map_err(|e| {
                CoreError::Execution(format!("Failed to copy mount points to target: {e}"))
            })?;

        Ok(())
    }

    async fn succeed(&self, migration_id: DbId) -> StoreResult<ExecutionOutcome> {
        match self.record(migration_id, MigrationState::Success, None).await {
            Err(e) => {
                // The copy has run; the job must not stay `running`.
                tracing::error!(
                    migration_id = %migration_id,
                    error = %e,
                    "Could not record success, marking migration as failed",
                );
                self.record(
                    migration_id,
                    MigrationState::Error,
                    Some(format!("Failed to record success: {e}")),
                )
                .await
            }
            outcome => outcome,
        }
    }

    async fn fail(&self, migration_id: DbId, err: CoreError) -> StoreResult<ExecutionOutcome> {
        let detail = match err {
            CoreError::Execution(detail) => detail,
            other => other.to_string(),
        };
        tracing::warn!(migration_id = %migration_id, error = %detail, "Migration failed");
        self.record(migration_id, MigrationState::Error, Some(detail))
            .await
    }

    /// Step 3. A lost CAS means another delivery already finished the job.
    async fn record(
        &self,
        migration_id: DbId,
        state: MigrationState,
        detail: Option<String>,
    ) -> StoreResult<ExecutionOutcome> {
        let result = self
            .store
            .update_state(migration_id, MigrationState::Running, state, detail.as_deref())
            .await;

        match result {
            Ok(_) => {}
            Err(StoreError::Core(CoreError::Conflict(_))) => {
                let current = self.store.get_migration(migration_id).await?;
                tracing::info!(
                    migration_id = %migration_id,
                    state = %current.state,
                    "Lost final state update to another delivery",
                );
                return Ok(ExecutionOutcome::Skipped {
                    state: current.state,
                });
            }
            Err(StoreError::Core(CoreError::NotFound { .. })) => {
                return Ok(ExecutionOutcome::Missing);
            }
            Err(e) => return Err(e),
        }

        tracing::info!(migration_id = %migration_id, state = %state, "Migration finished");

        Ok(match detail {
            None => {
                self.events.publish(MigrationEvent::succeeded(migration_id));
                ExecutionOutcome::Succeeded
            }
            Some(detail) => {
                self.events
                    .publish(MigrationEvent::failed(migration_id, detail.clone()));
                ExecutionOutcome::Failed { detail }
            }
        })
    }
}
