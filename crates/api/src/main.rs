use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use migrator_db::store::{MemoryStore, PgStore, Store};
use migrator_engine::{
    Executor, InMemoryQueue, PgTaskQueue, SimulatedTransfer, TaskQueue, WorkerPool,
};
use migrator_events::{EventBus, EventLogger};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use migrator_api::config::{ServerConfig, StoreBackend};
use migrator_api::router::build_app_router;
use migrator_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "migrator_api=debug,migrator_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.store_backend,
        embedded_workers = config.embedded_workers,
        "Loaded server configuration",
    );

    // --- Store and queue ---
    let (store, queue, pool) = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = migrator_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            migrator_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            migrator_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let queue = PgTaskQueue::new(
                pool.clone(),
                config.engine.max_task_attempts,
                config.engine.retry_delay,
                config.engine.visibility_timeout,
            );
            (
                Arc::new(PgStore::new(pool.clone())) as Arc<dyn Store>,
                Arc::new(queue) as Arc<dyn TaskQueue>,
                Some(pool),
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, all data is lost on shutdown");
            let queue =
                InMemoryQueue::new(config.engine.max_task_attempts, config.engine.retry_delay);
            (
                Arc::new(MemoryStore::new()) as Arc<dyn Store>,
                Arc::new(queue) as Arc<dyn TaskQueue>,
                None,
            )
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    // --- Embedded workers ---
    let workers_cancel = CancellationToken::new();
    let workers_handle = (config.embedded_workers > 0).then(|| {
        let transfer = SimulatedTransfer::from_config(&config.engine);
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            Arc::new(transfer),
            Arc::clone(&event_bus),
        ));
        WorkerPool::new(
            executor,
            Arc::clone(&queue),
            config.embedded_workers,
            config.engine.poll_interval,
        )
        .spawn(workers_cancel.clone())
    });

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState::new(
        store,
        queue,
        pool,
        Arc::clone(&config),
        Arc::clone(&event_bus),
    );

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    workers_cancel.cancel();
    if let Some(handle) = workers_handle {
        let timeout = Duration::from_secs(config.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, handle).await.is_err() {
            tracing::warn!("Embedded workers did not stop in time");
        }
    }

    // Dropping the last sender closes the channel and stops the logger.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (Unix) to start graceful shutdown.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
