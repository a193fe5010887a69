pub mod health;
pub mod migration_targets;
pub mod migrations;
pub mod workloads;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /workloads                                 list, create
/// /workloads/{id}                            get, update, delete
/// /workloads/{id}/mount-points               list, add
/// /workloads/{id}/mount-points/{mp_id}       delete
///
/// /migration-targets                         list, create
/// /migration-targets/{id}                    get, update, delete
///
/// /migrations                                list (?state, limit, offset), create
/// /migrations/{id}                           get
/// /migrations/{id}/status                    status projection
/// /migrations/{id}/run                       submit for execution
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/workloads", workloads::router())
        .nest("/migration-targets", migration_targets::router())
        .nest("/migrations", migrations::router())
}
