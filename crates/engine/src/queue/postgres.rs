//! [`TaskQueue`] over the `migration_tasks` table.
//!
//! Claims go through [`TaskRepo::claim_next`] (`FOR UPDATE SKIP LOCKED`),
//! so any number of worker processes can share one table. A task whose
//! worker disappears becomes claimable again after the visibility timeout.

use std::time::Duration;

use async_trait::async_trait;
use migrator_core::types::DbId;
use migrator_db::models::task::TaskRow;
use migrator_db::repositories::TaskRepo;
use sqlx::PgPool;

use super::{FailDisposition, MigrationTask, QueueError, TaskQueue};

#[derive(Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
    max_attempts: u32,
    retry_delay: Duration,
    visibility_timeout: Duration,
}

impl PgTaskQueue {
    pub fn new(
        pool: PgPool,
        max_attempts: u32,
        retry_delay: Duration,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
            retry_delay,
            visibility_timeout,
        }
    }
}

impl From<TaskRow> for MigrationTask {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            migration_id: row.migration_id,
            attempt: u32::try_from(row.attempts).unwrap_or(0),
            max_attempts: u32::try_from(row.max_attempts).unwrap_or(1),
        }
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, migration_id: DbId) -> Result<MigrationTask, QueueError> {
        let max_attempts = i32::try_from(self.max_attempts).unwrap_or(i32::MAX);
        let row = TaskRepo::enqueue(&self.pool, migration_id, max_attempts).await?;
        Ok(row.into())
    }

    async fn claim(&self) -> Result<Option<MigrationTask>, QueueError> {
        let row =
            TaskRepo::claim_next(&self.pool, self.visibility_timeout.as_secs_f64()).await?;
        Ok(row.map(MigrationTask::from))
    }

    async fn complete(&self, task: &MigrationTask) -> Result<(), QueueError> {
        TaskRepo::complete(&self.pool, task.id).await?;
        Ok(())
    }

    async fn fail(
        &self,
        task: &MigrationTask,
        error: &str,
    ) -> Result<FailDisposition, QueueError> {
        if task.can_retry() {
            TaskRepo::requeue(&self.pool, task.id, error, self.retry_delay.as_secs_f64()).await?;
            Ok(FailDisposition::Requeued)
        } else {
            TaskRepo::mark_dead(&self.pool, task.id, error).await?;
            Ok(FailDisposition::Dead)
        }
    }

    async fn reap_expired(&self) -> Result<Vec<MigrationTask>, QueueError> {
        let rows =
            TaskRepo::reap_exhausted(&self.pool, self.visibility_timeout.as_secs_f64()).await?;
        Ok(rows.into_iter().map(MigrationTask::from).collect())
    }
}
