//! Route definitions for the `/migration-targets` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::migration_target;
use crate::state::AppState;

/// Routes mounted at `/migration-targets`.
///
/// ```text
/// GET    /        -> list
/// POST   /        -> create
/// GET    /{id}    -> get_by_id
/// PUT    /{id}    -> update
/// DELETE /{id}    -> delete (cascades to migrations)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(migration_target::list).post(migration_target::create))
        .route(
            "/{id}",
            get(migration_target::get_by_id)
                .put(migration_target::update)
                .delete(migration_target::delete),
        )
}
