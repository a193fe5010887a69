//! Route definitions for the `/migrations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::migration;
use crate::state::AppState;

/// Routes mounted at `/migrations`.
///
/// ```text
/// GET    /               -> list (?state, limit, offset)
/// POST   /               -> create
/// GET    /{id}           -> get_by_id
/// GET    /{id}/status    -> get_status
/// POST   /{id}/run       -> run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(migration::list).post(migration::create))
        .route("/{id}", get(migration::get_by_id))
        .route("/{id}/status", get(migration::get_status))
        .route("/{id}/run", post(migration::run))
}
