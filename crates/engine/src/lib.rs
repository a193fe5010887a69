//! Migration execution engine.
//!
//! - [`Dispatcher`]: pre-flight, compare-and-set to `running`, enqueue.
//! - [`TaskQueue`]: at-least-once work queue (in-memory or PostgreSQL).
//! - [`Executor`]: runs one delivered task to a terminal state.
//! - [`WorkerPool`]: long-lived tasks draining the queue into the executor.

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod queue;
pub mod transfer;
pub mod worker;

pub use config::EngineConfig;
pub use dispatcher::{DispatchError, Dispatcher};
pub use executor::{ExecutionOutcome, Executor};
pub use queue::{
    FailDisposition, InMemoryQueue, MigrationTask, PgTaskQueue, QueueError, TaskQueue,
};
pub use transfer::{MigrationTransfer, SimulatedTransfer, TransferError};
pub use worker::WorkerPool;
