//! Backend admin routes.

use crate::handlers::backends::{active_summary, get_active, list_backends, set_active};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn backend_routes(state: AppState) -> Router {
    Router::new()
        .route("/backends", get(list_backends))
        .route("/backends/active", get(get_active).put(set_active))
        .route("/backends/active/summary", get(active_summary))
        .with_state(state)
}

/// Common routes at the root and backend routes under `/api/v1`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::routes::common_routes(state.clone()))
        .nest("/api/v1", backend_routes(state))
}
