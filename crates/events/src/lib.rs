//! Migration lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MigrationEvent`]: emitted whenever a job changes state.
//! - [`EventLogger`]: background subscriber that writes every event to the
//!   structured log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, MigrationEvent, MigrationEventKind};
pub use logger::EventLogger;
