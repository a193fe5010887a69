//! At-least-once work queue between the dispatcher and the executors.
//!
//! A task is delivered by [`TaskQueue::claim`] and must then be either
//! acknowledged with [`TaskQueue::complete`] or handed back with
//! [`TaskQueue::fail`]. A failed task is redelivered after the retry delay
//! until it has been delivered `max_attempts` times, after which it is
//! dead. Any delivery may be a duplicate; consumers must be idempotent.

use async_trait::async_trait;
use migrator_core::types::DbId;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryQueue;
pub use postgres::PgTaskQueue;

/// A delivered unit of work: "run migration `migration_id`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    pub id: DbId,
    pub migration_id: DbId,
    /// 1-based delivery count, including this one.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl MigrationTask {
    /// Whether another delivery is allowed after this one fails.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// What happened to a task handed back with [`TaskQueue::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailDisposition {
    /// Will be redelivered after the retry delay.
    Requeued,
    /// Attempts exhausted; never delivered again.
    Dead,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Add a task for `migration_id`, immediately deliverable.
    async fn enqueue(&self, migration_id: DbId) -> Result<MigrationTask, QueueError>;

    /// Take the next deliverable task, if any.
    async fn claim(&self) -> Result<Option<MigrationTask>, QueueError>;

    /// Acknowledge a delivered task. It will not be delivered again.
    async fn complete(&self, task: &MigrationTask) -> Result<(), QueueError>;

    /// Hand a delivered task back after an infrastructure failure.
    async fn fail(&self, task: &MigrationTask, error: &str)
        -> Result<FailDisposition, QueueError>;

    /// Collect tasks that died without being handed back (e.g. their
    /// worker crashed on the last attempt). Empty for queues without a
    /// visibility timeout.
    async fn reap_expired(&self) -> Result<Vec<MigrationTask>, QueueError> {
        Ok(Vec::new())
    }
}
