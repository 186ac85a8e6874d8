//! HTTP surface of the assignment service.
//!
//! Thin request/response plumbing around the store and the trigger loop:
//! - `POST /api/detections` - ingest a classified detection as a task
//! - `GET  /api/tasks`, `GET /api/tasks/:id`, `PUT /api/tasks/:id/status`
//! - `GET  /api/workers`, `POST /api/workers`,
//!   `PUT /api/workers/:id/availability`
//! - `GET  /health`, `POST /api/reset-dedup`
//!
//! All scheduling logic lives in [`crate::engine`]; handlers only read and
//! write the store and signal the trigger loop.

pub mod detections;
pub mod tasks;
pub mod workers;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::TriggerHandle;
use crate::store::TaskStore;

/// Shared application state.
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub trigger: TriggerHandle,
    /// Grid-cell keys of already-ingested detection sites. In-memory only,
    /// cleared on restart or via `/api/reset-dedup`.
    dedup: Mutex<HashSet<(i64, i64)>>,
}

impl AppState {
    pub fn new(store: Arc<TaskStore>, trigger: TriggerHandle) -> Self {
        Self {
            store,
            trigger,
            dedup: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn dedup(&self) -> MutexGuard<'_, HashSet<(i64, i64)>> {
        self.dedup.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/reset-dedup", post(reset_dedup))
        .nest("/api/detections", detections::routes())
        .nest("/api/tasks", tasks::routes())
        .nest("/api/workers", workers::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness check.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/reset-dedup - Clear the in-memory detection dedup tracker.
async fn reset_dedup(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.dedup().clear();
    Json(serde_json::json!({ "status": "dedup cache cleared" }))
}

/// Map a store failure to a 500 response.
pub(crate) fn internal_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
