//! Handlers for the `/migrations` resource.
//!
//! Creating a migration only records it (`not_started`). `POST .../run`
//! goes through the [`Dispatcher`](migrator_engine::Dispatcher): it answers
//! 202 with the job in `running` as soon as the task is queued, and the
//! outcome is observed by polling `GET .../status`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use migrator_core::types::DbId;
use migrator_db::models::migration::{CreateMigration, MigrationListQuery};
use migrator_db::store::MigrationStore;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/migrations
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateMigration>,
) -> AppResult<impl IntoResponse> {
    let migration = state.store.create_migration(&input).await?;

    tracing::info!(
        migration_id = %migration.id,
        source_workload_id = %migration.source_workload_id,
        target_id = %migration.target_id,
        mount_points = migration.selected_mount_points.len(),
        "Migration created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: migration })))
}

/// GET /api/v1/migrations
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<MigrationListQuery>,
) -> AppResult<impl IntoResponse> {
    let migrations = state.store.list_migrations(&params).await?;
    Ok(Json(DataResponse { data: migrations }))
}

/// GET /api/v1/migrations/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let migration = state.store.get_migration(id).await?;
    Ok(Json(DataResponse { data: migration }))
}

/// GET /api/v1/migrations/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let migration = state.store.get_migration(id).await?;
    Ok(Json(DataResponse {
        data: migration.status(),
    }))
}

/// POST /api/v1/migrations/{id}/run
///
/// - 202 with the job in `running` once it is queued.
/// - 400 if pre-flight fails (job stays `not_started`).
/// - 409 if the job already left `not_started` or a concurrent run won.
pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let migration = state.dispatcher.submit(id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: migration })))
}
