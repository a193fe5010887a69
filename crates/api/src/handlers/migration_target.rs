//! Handlers for the `/migration-targets` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use migrator_core::types::DbId;
use migrator_db::models::migration_target::{CreateMigrationTarget, UpdateMigrationTarget};
use migrator_db::store::InventoryStore;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/migration-targets
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateMigrationTarget>,
) -> AppResult<impl IntoResponse> {
    let target = state.store.create_target(&input).await?;
    tracing::info!(
        target_id = %target.id,
        cloud_type = %target.cloud_type,
        "Migration target created",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: target })))
}

/// GET /api/v1/migration-targets
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let targets = state.store.list_targets().await?;
    Ok(Json(DataResponse { data: targets }))
}

/// GET /api/v1/migration-targets/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let target = state.store.get_target(id).await?;
    Ok(Json(DataResponse { data: target }))
}

/// PUT /api/v1/migration-targets/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateMigrationTarget>,
) -> AppResult<impl IntoResponse> {
    let target = state.store.update_target(id, &input).await?;
    tracing::info!(target_id = %id, cloud_type = %target.cloud_type, "Migration target updated");
    Ok(Json(DataResponse { data: target }))
}

/// DELETE /api/v1/migration-targets/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.store.delete_target(id).await?;
    tracing::info!(target_id = %id, "Migration target deleted");
    Ok(StatusCode::NO_CONTENT)
}
