//! Handlers for the `/workloads` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use migrator_core::types::DbId;
use migrator_db::models::workload::{CreateWorkload, UpdateWorkload};
use migrator_db::store::InventoryStore;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workloads
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateWorkload>,
) -> AppResult<impl IntoResponse> {
    let workload = state.store.create_workload(&input).await?;
    tracing::info!(workload_id = %workload.id, ip_address = %workload.ip_address, "Workload created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: workload })))
}

/// GET /api/v1/workloads
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let workloads = state.store.list_workloads().await?;
    Ok(Json(DataResponse { data: workloads }))
}

/// GET /api/v1/workloads/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workload = state.store.get_workload(id).await?;
    Ok(Json(DataResponse { data: workload }))
}

/// PUT /api/v1/workloads/{id}
///
/// Renames the workload and, when `mount_points` is present, replaces its
/// mount points. A different `ip_address` is a 400.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateWorkload>,
) -> AppResult<impl IntoResponse> {
    let workload = state.store.update_workload(id, &input).await?;
    Ok(Json(DataResponse { data: workload }))
}

/// DELETE /api/v1/workloads/{id}
///
/// Cascades to the workload's mount points, the targets pointing at it and
/// the migrations that reference either.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.store.delete_workload(id).await?;
    tracing::info!(workload_id = %id, "Workload deleted");
    Ok(StatusCode::NO_CONTENT)
}
