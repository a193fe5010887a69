//! Handlers for `/workloads/{id}/mount-points`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use migrator_core::types::DbId;
use migrator_db::models::mount_point::CreateMountPoint;
use migrator_db::store::InventoryStore;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workloads/{id}/mount-points
pub async fn create(
    State(state): State<AppState>,
    Path(workload_id): Path<DbId>,
    Json(input): Json<CreateMountPoint>,
) -> AppResult<impl IntoResponse> {
    let mount_point = state.store.add_mount_point(workload_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: mount_point })))
}

/// GET /api/v1/workloads/{id}/mount-points
pub async fn list_by_workload(
    State(state): State<AppState>,
    Path(workload_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let mount_points = state.store.list_mount_points(workload_id).await?;
    Ok(Json(DataResponse { data: mount_points }))
}

/// DELETE /api/v1/workloads/{id}/mount-points/{mp_id}
pub async fn delete(
    State(state): State<AppState>,
    Path((workload_id, mount_point_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    state
        .store
        .delete_mount_point(workload_id, mount_point_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
