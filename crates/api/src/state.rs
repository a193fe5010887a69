use std::sync::Arc;

use migrator_db::store::Store;
use migrator_engine::{Dispatcher, TaskQueue};
use migrator_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone (everything is behind `Arc` or already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Persistence for inventory and migration jobs.
    pub store: Arc<dyn Store>,
    /// Submits jobs for execution.
    pub dispatcher: Dispatcher,
    /// Database pool, when running on the PostgreSQL backend.
    pub pool: Option<migrator_db::DbPool>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire a dispatcher over `store` and `queue` that publishes to
    /// `event_bus`.
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn TaskQueue>,
        pool: Option<migrator_db::DbPool>,
        config: Arc<ServerConfig>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), queue, event_bus);
        Self {
            store,
            dispatcher,
            pool,
            config,
        }
    }
}
