//! Rows of the `migration_tasks` work queue table.

use std::fmt;

use migrator_core::error::CoreError;
use migrator_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Queue status of a migration task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a worker (possibly delayed until `available_at`).
    Queued,
    /// Handed to a worker; re-claimable after the visibility timeout.
    Claimed,
    Done,
    /// Retries exhausted.
    Dead,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Done => "done",
            TaskStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "queued" => Ok(TaskStatus::Queued),
            "claimed" => Ok(TaskStatus::Claimed),
            "done" => Ok(TaskStatus::Done),
            "dead" => Ok(TaskStatus::Dead),
            other => Err(CoreError::Internal(format!("Unknown task status: \"{other}\""))),
        }
    }
}

/// A row from the `migration_tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskRow {
    pub id: DbId,
    pub migration_id: DbId,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    /// Number of deliveries so far, including the current one once claimed.
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
