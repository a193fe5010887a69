//! Standalone migration worker.
//!
//! Claims tasks from the PostgreSQL `migration_tasks` queue and executes
//! them against the shared store. Run as many instances as needed; the
//! queue hands each task to one worker at a time.

use std::sync::Arc;
use std::time::Duration;

use migrator_db::store::{PgStore, Store};
use migrator_engine::{
    EngineConfig, Executor, PgTaskQueue, SimulatedTransfer, TaskQueue, WorkerPool,
};
use migrator_events::{EventBus, EventLogger};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "migrator_worker=debug,migrator_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    tracing::info!(
        concurrency = config.worker_concurrency,
        max_task_attempts = config.max_task_attempts,
        transfer_delay_ms = config.effective_transfer_delay().as_millis() as u64,
        "Loaded engine configuration",
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = migrator_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    migrator_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let queue: Arc<dyn TaskQueue> = Arc::new(PgTaskQueue::new(
        pool,
        config.max_task_attempts,
        config.retry_delay,
        config.visibility_timeout,
    ));

    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    let executor = Arc::new(Executor::new(
        store,
        Arc::new(SimulatedTransfer::from_config(&config)),
        Arc::clone(&event_bus),
    ));

    let cancel = CancellationToken::new();
    let pool_handle = WorkerPool::new(
        executor,
        queue,
        config.worker_concurrency,
        config.poll_interval,
    )
    .spawn(cancel.clone());

    shutdown_signal().await;
    cancel.cancel();

    if pool_handle.await.is_err() {
        tracing::error!("Worker pool task panicked");
    }

    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    tracing::info!("Worker stopped");
}

/// Wait for SIGINT or SIGTERM (Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, finishing in-flight tasks"),
        () = terminate => tracing::info!("Received SIGTERM, finishing in-flight tasks"),
    }
}
