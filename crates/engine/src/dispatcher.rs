//! Submits migration jobs for execution.
//!
//! [`Dispatcher::submit`] runs synchronously in the caller's request: it
//! re-reads the job, runs pre-flight, and moves the job to `running` with a
//! compare-and-set. That CAS is the only concurrency guard; of two
//! simultaneous submitters exactly one wins and only the winner enqueues a
//! task.

use std::sync::Arc;

use migrator_core::error::CoreError;
use migrator_core::migration::{preflight, MigrationState};
use migrator_core::types::DbId;
use migrator_db::models::migration::Migration;
use migrator_db::store::{Store, StoreError};
use migrator_events::{EventBus, MigrationEvent};

use crate::queue::{QueueError, TaskQueue};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Lookup, pre-flight or CAS failed. Carries the domain error when
    /// there is one (`NotFound`, `Validation`, `Conflict`,
    /// `InvalidTransition`).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job was moved to `running` but no task could be enqueued. The
    /// job has been recorded as `error`.
    #[error("Failed to enqueue migration {migration_id}: {source}")]
    Enqueue {
        migration_id: DbId,
        source: QueueError,
    },
}

impl DispatchError {
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            DispatchError::Store(err) => err.as_core(),
            DispatchError::Enqueue { .. } => None,
        }
    }
}

impl From<CoreError> for DispatchError {
    fn from(err: CoreError) -> Self {
        DispatchError::Store(StoreError::Core(err))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    queue: Arc<dyn TaskQueue>,
    events: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn TaskQueue>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            queue,
            events,
        }
    }

    /// Validate and start a job. Returns the job in `running` as soon as
    /// its task is enqueued; completion is observed by polling or on the
    /// event bus.
    ///
    /// On a validation failure the job is left in `not_started`.
    pub async fn submit(&self, migration_id: DbId) -> Result<Migration, DispatchError> {
        let migration = self.store.get_migration(migration_id).await?;
        preflight(migration.state, migration.selected_names())?;

        let running = self
            .store
            .update_state(
                migration_id,
                MigrationState::NotStarted,
                MigrationState::Running,
                None,
            )
            .await?;

        tracing::info!(migration_id = %migration_id, "Migration started");
        self.events.publish(MigrationEvent::started(migration_id));

        match self.queue.enqueue(migration_id).await {
            Ok(task) => {
                tracing::debug!(
                    migration_id = %migration_id,
                    task_id = %task.id,
                    "Migration task enqueued",
                );
                Ok(running)
            }
            Err(source) => {
                self.abandon(migration_id, &source).await;
                Err(DispatchError::Enqueue {
                    migration_id,
                    source,
                })
            }
        }
    }

    /// Record a job whose task could not be enqueued as `error`.
    async fn abandon(&self, migration_id: DbId, err: &QueueError) {
        let detail = format!("Failed to enqueue migration: {err}");
        tracing::error!(migration_id = %migration_id, error = %err, "Failed to enqueue migration");

        match self
            .store
            .update_state(
                migration_id,
                MigrationState::Running,
                MigrationState::Error,
                Some(&detail),
            )
            .await
        {
            Ok(_) => self
                .events
                .publish(MigrationEvent::failed(migration_id, detail)),
            Err(e) => tracing::error!(
                migration_id = %migration_id,
                error = %e,
                "Failed to record enqueue failure, job left running",
            ),
        }
    }
}
