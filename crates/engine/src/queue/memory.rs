//! Process-local [`TaskQueue`].
//!
//! Tasks live in a `VecDeque` behind a `tokio::sync::Mutex`. A claimed task
//! is held in flight until it is completed or failed; there is no
//! visibility timeout because a crashed process loses the whole queue
//! anyway. Dead tasks are kept for inspection up to a fixed capacity; the
//! oldest are dropped first.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use migrator_core::types::{new_id, DbId};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{FailDisposition, MigrationTask, QueueError, TaskQueue};

/// Default number of dead tasks retained.
pub const DEAD_LETTER_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Pending {
    task: MigrationTask,
    available_at: Instant,
}

#[derive(Default)]
struct Inner {
    pending: VecDeque<Pending>,
    in_flight: HashMap<DbId, MigrationTask>,
    dead: VecDeque<MigrationTask>,
    enqueued: usize,
}

pub struct InMemoryQueue {
    inner: Mutex<Inner>,
    max_attempts: u32,
    retry_delay: Duration,
    dead_capacity: usize,
}

impl InMemoryQueue {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_attempts: max_attempts.max(1),
            retry_delay,
            dead_capacity: DEAD_LETTER_CAPACITY,
        }
    }

    /// Retain at most `capacity` dead tasks.
    pub fn with_dead_capacity(mut self, capacity: usize) -> Self {
        self.dead_capacity = capacity;
        self
    }

    /// Tasks waiting for delivery (including delayed retries).
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Tasks delivered but not yet completed or failed.
    pub async fn in_flight_len(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    /// Tasks whose attempts are exhausted, oldest first.
    pub async fn dead_tasks(&self) -> Vec<MigrationTask> {
        self.inner.lock().await.dead.iter().cloned().collect()
    }

    /// Number of successful `enqueue` calls since creation.
    pub async fn enqueued_total(&self) -> usize {
        self.inner.lock().await.enqueued
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, migration_id: DbId) -> Result<MigrationTask, QueueError> {
        let task = MigrationTask {
            id: new_id(),
            migration_id,
            attempt: 0,
            max_attempts: self.max_attempts,
        };

        let mut inner = self.inner.lock().await;
        inner.pending.push_back(Pending {
            task: task.clone(),
            available_at: Instant::now(),
        });
        inner.enqueued += 1;
        Ok(task)
    }

    async fn claim(&self) -> Result<Option<MigrationTask>, QueueError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let Some(pos) = inner.pending.iter().position(|p| p.available_at <= now) else {
            return Ok(None);
        };
        let Some(Pending { mut task, .. }) = inner.pending.remove(pos) else {
            return Ok(None);
        };

        task.attempt += 1;
        inner.in_flight.insert(task.id, task.clone());
        Ok(Some(task))
    }

    async fn complete(&self, task: &MigrationTask) -> Result<(), QueueError> {
        self.inner.lock().await.in_flight.remove(&task.id);
        Ok(())
    }

    async fn fail(
        &self,
        task: &MigrationTask,
        _error: &str,
    ) -> Result<FailDisposition, QueueError> {
        let mut inner = self.inner.lock().await;
        let task = inner.in_flight.remove(&task.id).unwrap_or_else(|| task.clone());

        if task.can_retry() {
            inner.pending.push_back(Pending {
                task,
                available_at: Instant::now() + self.retry_delay,
            });
            Ok(FailDisposition::Requeued)
        } else {
            inner.dead.push_back(task);
            while inner.dead.len() > self.dead_capacity {
                inner.dead.pop_front();
            }
            Ok(FailDisposition::Dead)
        }
    }
}
