//! Shared helpers for API integration tests.
//!
//! Requests go straight to the router with `tower::ServiceExt::oneshot`;
//! no TCP listener is involved. The app runs on the in-memory store and
//! queue, so these tests need no database.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use migrator_db::store::{MemoryStore, Store};
use migrator_engine::{
    EngineConfig, Executor, InMemoryQueue, SimulatedTransfer, TaskQueue, WorkerPool,
};
use migrator_events::EventBus;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use migrator_api::config::{ServerConfig, StoreBackend};
use migrator_api::router::build_app_router;
use migrator_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        embedded_workers: 0,
        engine: EngineConfig::default(),
    }
}

/// The router plus handles on the backing store and queue.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<InMemoryQueue>,
    pub events: Arc<EventBus>,
}

impl TestApp {
    /// Start a worker pool over this app's store and queue with an instant
    /// transfer. The pool stops when the returned token is cancelled.
    pub fn start_workers(&self) -> CancellationToken {
        let transfer = SimulatedTransfer::new(Duration::ZERO, Duration::ZERO);
        let executor = Arc::new(Executor::new(
            Arc::clone(&self.store) as Arc<dyn Store>,
            Arc::new(transfer),
            Arc::clone(&self.events),
        ));
        let cancel = CancellationToken::new();
        WorkerPool::new(
            executor,
            Arc::clone(&self.queue) as Arc<dyn TaskQueue>,
            2,
            Duration::from_millis(5),
        )
        .spawn(cancel.clone());
        cancel
    }
}

/// Build the full application router (same middleware stack as `main.rs`)
/// on a fresh in-memory store. No workers run unless started explicitly.
pub fn build_test_app() -> TestApp {
    let config = Arc::new(test_config());
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new(
        config.engine.max_task_attempts,
        Duration::ZERO,
    ));
    let events = Arc::new(EventBus::default());

    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
        None,
        Arc::clone(&config),
        Arc::clone(&events),
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        queue,
        events,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::POST, uri, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::PUT, uri, body).await
}

pub async fn post_empty(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn json_request(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Collect the body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the `data` field of the envelope.
pub async fn expect_data(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_workload(app: &TestApp, name: &str, ip: &str) -> serde_json::Value {
    let response = post_json(
        app,
        "/api/v1/workloads",
        serde_json::json!({"name": name, "ip_address": ip}),
    )
    .await;
    expect_data(response, StatusCode::CREATED).await
}

pub async fn add_mount_point(
    app: &TestApp,
    workload_id: &str,
    name: &str,
    size_gb: i64,
) -> serde_json::Value {
    let response = post_json(
        app,
        &format!("/api/v1/workloads/{workload_id}/mount-points"),
        serde_json::json!({"name": name, "size_gb": size_gb}),
    )
    .await;
    expect_data(response, StatusCode::CREATED).await
}

/// Source workload with `C:\` and `D:\`, plus an AWS target.
pub struct Seeded {
    pub source_id: String,
    pub target_workload_id: String,
    pub target_id: String,
    pub c_drive_id: String,
    pub d_drive_id: String,
}

pub async fn seed(app: &TestApp) -> Seeded {
    let source = create_workload(app, "app-server", "10.0.0.10").await;
    let target_workload = create_workload(app, "app-server-aws", "172.16.0.10").await;
    let source_id = id_of(&source);
    let target_workload_id = id_of(&target_workload);

    let c_drive = add_mount_point(app, &source_id, "C:\\", 100).await;
    let d_drive = add_mount_point(app, &source_id, "D:\\", 500).await;

    let response = post_json(
        app,
        "/api/v1/migration-targets",
        serde_json::json!({"cloud_type": "aws", "target_workload_id": target_workload_id}),
    )
    .await;
    let target = expect_data(response, StatusCode::CREATED).await;

    Seeded {
        source_id,
        target_workload_id,
        target_id: id_of(&target),
        c_drive_id: id_of(&c_drive),
        d_drive_id: id_of(&d_drive),
    }
}

pub async fn create_migration(
    app: &TestApp,
    seeded: &Seeded,
    mount_point_ids: &[&str],
) -> serde_json::Value {
    let response = post_json(
        app,
        "/api/v1/migrations",
        serde_json::json!({
            "source_workload_id": seeded.source_id,
            "target_id": seeded.target_id,
            "mount_point_ids": mount_point_ids,
        }),
    )
    .await;
    expect_data(response, StatusCode::CREATED).await
}

pub fn id_of(value: &serde_json::Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

/// Poll the status endpoint until the job leaves `running`.
pub async fn wait_for_terminal(app: &TestApp, migration_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/migrations/{migration_id}/status");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = expect_data(get(app, &uri).await, StatusCode::OK).await;
            if status["state"] != "running" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("migration did not finish in time")
}
