//! Task read and admin endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::store::{Task, TaskStatus};

use super::{internal_error, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/:id", get(get_task))
        .route("/:id/status", put(update_status))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// GET /api/tasks - List tasks, newest first, optionally filtered by status.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let status = match query.status {
        Some(raw) => Some(TaskStatus::parse(&raw).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("unknown status {raw:?}"))
        })?),
        None => None,
    };
    let tasks = state.store.list_tasks(status).await.map_err(internal_error)?;
    Ok(Json(tasks))
}

/// GET /api/tasks/:id - Fetch a single task.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .store
        .get_task(id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("task {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

/// PUT /api/tasks/:id/status - Complete, cancel, or reopen a task.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let updated = state
        .store
        .set_task_status(id, req.status)
        .await
        .map_err(internal_error)?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, format!("task {id} not found")));
    }

    // A reopened task re-enters the assignable pool without a new insert, so
    // the poll cursor will not see it; wake the engine directly.
    if req.status == TaskStatus::Incomplete {
        state.trigger.signal_insert();
    }

    state
        .store
        .get_task(id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("task {id} not found")))
}
