//! Structured-log sink for migration events.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one `tracing` record per event. It runs as a long-lived
//! background task and exits when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::{MigrationEvent, MigrationEventKind};

pub struct EventLogger;

impl EventLogger {
    /// Run the logging loop until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<MigrationEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &MigrationEvent) {
        match event.kind {
            MigrationEventKind::Failed => tracing::warn!(
                event_type = event.kind.event_type(),
                migration_id = %event.migration_id,
                error_detail = event.error_detail.as_deref().unwrap_or_default(),
                "Migration failed"
            ),
            kind => tracing::info!(
                event_type = kind.event_type(),
                migration_id = %event.migration_id,
                state = %kind.state(),
                "Migration event"
            ),
        }
    }
}
