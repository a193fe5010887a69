//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`MigrationEvent`]s. Share
//! it via `Arc<EventBus>` between the dispatcher, the executor and whatever
//! wants to observe job progress.

use chrono::{DateTime, Utc};
use migrator_core::migration::MigrationState;
use migrator_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// MigrationEvent
// ---------------------------------------------------------------------------

/// What happened to a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationEventKind {
    /// Accepted by the dispatcher and moved to `running`.
    Started,
    /// Finished in `success`.
    Succeeded,
    /// Finished in `error`.
    Failed,
}

impl MigrationEventKind {
    /// Dot-separated event name, e.g. `"migration.started"`.
    pub fn event_type(self) -> &'static str {
        match self {
            MigrationEventKind::Started => "migration.started",
            MigrationEventKind::Succeeded => "migration.succeeded",
            MigrationEventKind::Failed => "migration.failed",
        }
    }

    /// The job state this event reports.
    pub fn state(self) -> MigrationState {
        match self {
            MigrationEventKind::Started => MigrationState::Running,
            MigrationEventKind::Succeeded => MigrationState::Success,
            MigrationEventKind::Failed => MigrationState::Error,
        }
    }
}

/// A state change of a migration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationEvent {
    pub kind: MigrationEventKind,
    pub migration_id: DbId,
    /// Failure message, only for [`MigrationEventKind::Failed`].
    pub error_detail: Option<String>,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl MigrationEvent {
    pub fn started(migration_id: DbId) -> Self {
        Self::new(MigrationEventKind::Started, migration_id)
    }

    pub fn succeeded(migration_id: DbId) -> Self {
        Self::new(MigrationEventKind::Succeeded, migration_id)
    }

    pub fn failed(migration_id: DbId, detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::new(MigrationEventKind::Failed, migration_id)
        }
    }

    fn new(kind: MigrationEventKind, migration_id: DbId) -> Self {
        Self {
            kind,
            migration_id,
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn state(&self) -> MigrationState {
        self.kind.state()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use migrator_events::bus::{EventBus, MigrationEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(MigrationEvent::started(uuid::Uuid::new_v4()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MigrationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: MigrationEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MigrationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish(MigrationEvent::failed(id, "disk full"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, MigrationEventKind::Failed);
        assert_eq!(received.migration_id, id);
        assert_eq!(received.error_detail.as_deref(), Some("disk full"));
        assert_eq!(received.state(), MigrationState::Error);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish(MigrationEvent::started(id));
        bus.publish(MigrationEvent::succeeded(id));

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap().kind, MigrationEventKind::Started);
            assert_eq!(rx.recv().await.unwrap().kind, MigrationEventKind::Succeeded);
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(4);
        bus.publish(MigrationEvent::started(Uuid::new_v4()));
    }

    #[test]
    fn event_serializes_with_snake_case_kind() {
        let event = MigrationEvent::succeeded(Uuid::nil());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "succeeded");
        assert!(json["error_detail"].is_null());
        assert_eq!(MigrationEventKind::Succeeded.event_type(), "migration.succeeded");
    }
}
