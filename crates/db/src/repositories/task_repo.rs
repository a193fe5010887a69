//! Repository for the `migration_tasks` work queue table.
//!
//! Claiming uses `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent workers
//! never receive the same task from one claim. A task left `claimed` past
//! the visibility timeout (worker crashed mid-run) becomes claimable again,
//! which makes delivery at-least-once rather than at-most-once.

use migrator_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::models::task::{TaskRow, TaskStatus};

/// Column list for `migration_tasks` queries.
const COLUMNS: &str = "\
    id, migration_id, status, attempts, max_attempts, available_at, \
    claimed_at, last_error, created_at, updated_at";

/// Provides queue operations over `migration_tasks`.
pub struct TaskRepo;

impl TaskRepo {
    /// Enqueue a task for a migration, immediately available.
    pub async fn enqueue(
        pool: &PgPool,
        migration_id: DbId,
        max_attempts: i32,
    ) -> Result<TaskRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO migration_tasks (id, migration_id, status, max_attempts) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(new_id())
            .bind(migration_id)
            .bind(TaskStatus::Queued.as_str())
            .bind(max_attempts)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next available task, incrementing `attempts`.
    ///
    /// Eligible: queued tasks whose `available_at` has passed, and claimed
    /// tasks older than `visibility_timeout_secs` that still have attempts
    /// left.
    pub async fn claim_next(
        pool: &PgPool,
        visibility_timeout_secs: f64,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_tasks \
             SET status = $1, claimed_at = NOW(), attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM migration_tasks \
                 WHERE (status = $2 AND available_at <= NOW()) \
                    OR (status = $1 \
                        AND claimed_at < NOW() - make_interval(secs => $3) \
                        AND attempts < max_attempts) \
                 ORDER BY available_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Claimed.as_str())
            .bind(TaskStatus::Queued.as_str())
            .bind(visibility_timeout_secs)
            .fetch_optional(pool)
            .await
    }

    /// Mark stale claimed tasks with no attempts left as dead, returning them.
    pub async fn reap_exhausted(
        pool: &PgPool,
        visibility_timeout_secs: f64,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE migration_tasks \
             SET status = $1, \
                 last_error = COALESCE(last_error, 'visibility timeout exceeded'), \
                 updated_at = NOW() \
             WHERE status = $2 \
               AND claimed_at < NOW() - make_interval(secs => $3) \
               AND attempts >= max_attempts \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Dead.as_str())
            .bind(TaskStatus::Claimed.as_str())
            .bind(visibility_timeout_secs)
            .fetch_all(pool)
            .await
    }

    /// Acknowledge a delivered task.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE migration_tasks SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(TaskStatus::Done.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Put a failed task back in the queue after `delay_secs`.
    pub async fn requeue(
        pool: &PgPool,
        id: DbId,
        error: &str,
        delay_secs: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE migration_tasks \
             SET status = $2, last_error = $3, claimed_at = NULL, \
                 available_at = NOW() + make_interval(secs => $4), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Queued.as_str())
        .bind(error)
        .bind(delay_secs)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Give up on a task after its last allowed attempt.
    pub async fn mark_dead(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE migration_tasks SET status = $2, last_error = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Dead.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All tasks ever enqueued for a migration, oldest first.
    pub async fn list_by_migration(
        pool: &PgPool,
        migration_id: DbId,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_tasks WHERE migration_id = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(migration_id)
            .fetch_all(pool)
            .await
    }
}
