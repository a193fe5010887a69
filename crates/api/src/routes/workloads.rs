//! Route definitions for the `/workloads` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::{mount_point, workload};
use crate::state::AppState;

/// Routes mounted at `/workloads`.
///
/// ```text
/// GET    /                               -> list
/// POST   /                               -> create
/// GET    /{id}                           -> get_by_id
/// PUT    /{id}                           -> update
/// DELETE /{id}                           -> delete
///
/// GET    /{id}/mount-points              -> list_by_workload
/// POST   /{id}/mount-points              -> create
/// DELETE /{id}/mount-points/{mp_id}      -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(workload::list).post(workload::create))
        .route(
            "/{id}",
            get(workload::get_by_id)
                .put(workload::update)
                .delete(workload::delete),
        )
        .route(
            "/{id}/mount-points",
            get(mount_point::list_by_workload).post(mount_point::create),
        )
        .route("/{id}/mount-points/{mp_id}", delete(mount_point::delete))
}
