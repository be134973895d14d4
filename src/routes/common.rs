//! Liveness, readiness of the active backend, and build info.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    backend: String,
    selected: String,
    reachable: bool,
}

/// 200 when the active backend answers a ping, 503 otherwise.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let active = state.selector.active();
    let selected = state.selector.selected();
    let reachable = match state.factory.ping(&active).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(backend = %active.name, error = %e, "readiness probe failed");
            false
        }
    };
    let (code, status) = if reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = Readiness {
        status,
        backend: active.name.clone(),
        selected: selected.name.clone(),
        reachable,
    };
    (code, Json(body))
}

pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/ready", get(ready))
        .route(
            "/version",
            get(|| async {
                Json::<Value>(json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }))
            }),
        )
        .with_state(state)
}
