//! Worker directory endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::store::{NewWorker, Worker};

use super::{internal_error, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_workers).post(create_worker))
        .route("/:id/availability", put(set_availability))
}

/// GET /api/workers - List all workers.
async fn list_workers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Worker>>, (StatusCode, String)> {
    let workers = state.store.list_workers().await.map_err(internal_error)?;
    Ok(Json(workers))
}

/// POST /api/workers - Register a new worker.
async fn create_worker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewWorker>,
) -> Result<(StatusCode, Json<Worker>), (StatusCode, String)> {
    let worker = state.store.insert_worker(req).await.map_err(internal_error)?;
    info!(worker = %worker.id, department = %worker.department, "worker registered");
    Ok((StatusCode::CREATED, Json(worker)))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// PUT /api/workers/:id/availability - Mark a worker (un)available.
async fn set_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let updated = state
        .store
        .set_worker_availability(id, req.available)
        .await
        .map_err(internal_error)?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, format!("worker {id} not found")));
    }
    Ok(Json(serde_json::json!({ "id": id, "available": req.available })))
}
