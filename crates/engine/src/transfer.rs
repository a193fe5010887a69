//! The data-moving step of a migration.
//!
//! Real disk or VM transfer is out of scope; [`SimulatedTransfer`] stands
//! in for it by sleeping. The executor only depends on the
//! [`MigrationTransfer`] trait so tests can inject failures.

use std::time::Duration;

use async_trait::async_trait;
use migrator_db::models::migration::Migration;

use crate::config::EngineConfig;

/// Failure of the transfer step. Recorded on the job as its error detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransferError(pub String);

#[async_trait]
pub trait MigrationTransfer: Send + Sync {
    /// Move the selected mount points of `migration` to its target.
    ///
    /// Must not touch the store; the executor copies the inventory after
    /// this returns.
    async fn transfer(&self, migration: &Migration) -> Result<(), TransferError>;
}

/// Sleeps for a fixed, bounded delay and succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedTransfer {
    delay: Duration,
}

impl SimulatedTransfer {
    /// `delay` is clamped to `max_delay`.
    pub fn new(delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay: delay.min(max_delay),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.transfer_delay, config.max_transfer_delay)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl MigrationTransfer for SimulatedTransfer {
    async fn transfer(&self, migration: &Migration) -> Result<(), TransferError> {
        tracing::debug!(
            migration_id = %migration.id,
            mount_points = migration.selected_mount_points.len(),
            delay_ms = self.delay.as_millis() as u64,
            "Simulating transfer",
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
