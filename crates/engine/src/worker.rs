//! Worker pool draining the task queue into the [`Executor`].
//!
//! Each worker is a long-lived Tokio task that wakes every
//! `poll_interval`, claims tasks until the queue is empty, and runs each
//! one through the executor. Infrastructure failures are handed back to
//! the queue; once a task's attempts are exhausted the job is moved to
//! `error` so it does not stay `running` forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecutionOutcome, Executor};
use crate::queue::{FailDisposition, MigrationTask, TaskQueue};

#[derive(Clone)]
pub struct WorkerPool {
    executor: Arc<Executor>,
    queue: Arc<dyn TaskQueue>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        executor: Arc<Executor>,
        queue: Arc<dyn TaskQueue>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            executor,
            queue,
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }

    /// Run all workers until the cancellation token is triggered.
    ///
    /// A task being executed when cancellation arrives is finished first.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            concurrency = self.concurrency,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker pool started",
        );

        let mut workers = JoinSet::new();
        for worker in 0..self.concurrency {
            let pool = self.clone();
            let cancel = cancel.clone();
            workers.spawn(async move { pool.worker_loop(worker, cancel).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!("Worker pool stopped");
    }

    /// Run the pool on a background task.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn worker_loop(&self, worker: usize, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(worker, "Worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if worker == 0 {
                        self.reap_expired().await;
                    }
                    self.drain(worker, &cancel).await;
                }
            }
        }
    }

    /// Claim and process tasks until none are deliverable.
    async fn drain(&self, worker: usize, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            match self.queue.claim().await {
                Ok(Some(task)) => self.process(worker, task).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(worker, error = %e, "Failed to claim task");
                    break;
                }
            }
        }
    }

    /// Execute one delivered task and settle it with the queue.
    pub async fn process(&self, worker: usize, task: MigrationTask) {
        tracing::debug!(
            worker,
            task_id = %task.id,
            migration_id = %task.migration_id,
            attempt = task.attempt,
            "Task claimed",
        );

        match self.executor.execute(task.migration_id).await {
            Ok(outcome) => {
                if let ExecutionOutcome::Skipped { state } = &outcome {
                    tracing::debug!(migration_id = %task.migration_id, state = %state, "Task skipped");
                }
                self.complete(&task).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    migration_id = %task.migration_id,
                    attempt = task.attempt,
                    max_attempts = task.max_attempts,
                    error = %e,
                    "Task failed, handing back to queue",
                );
                let reason = e.to_string();
                match self.queue.fail(&task, &reason).await {
                    Ok(FailDisposition::Requeued) => {}
                    Ok(FailDisposition::Dead) => self.give_up(&task, &reason).await,
                    Err(qe) => tracing::error!(
                        task_id = %task.id,
                        error = %qe,
                        "Failed to hand task back to queue",
                    ),
                }
            }
            Err(e) => {
                tracing::error!(
                    migration_id = %task.migration_id,
                    error = %e,
                    "Task failed permanently",
                );
                self.complete(&task).await;
                self.give_up(&task, &e.to_string()).await;
            }
        }
    }

    async fn complete(&self, task: &MigrationTask) {
        if let Err(e) = self.queue.complete(task).await {
            tracing::error!(task_id = %task.id, error = %e, "Failed to acknowledge task");
        }
    }

    /// Tasks that died on the queue side (visibility timeout on their last
    /// attempt) still need their job closed out.
    async fn reap_expired(&self) {
        match self.queue.reap_expired().await {
            Ok(tasks) => {
                for task in tasks {
                    self.give_up(&task, "worker did not finish within the visibility timeout")
                        .await;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to reap expired tasks"),
        }
    }

    async fn give_up(&self, task: &MigrationTask, reason: &str) {
        let detail = format!("Gave up after {} attempt(s): {reason}", task.attempt);
        if let Err(e) = self.executor.abandon(task.migration_id, detail).await {
            tracing::error!(
                migration_id = %task.migration_id,
                error = %e,
                "Failed to record abandoned migration, job left running",
            );
        }
    }
}
