//! Detection ingestion endpoint.
//!
//! Accepts an already-classified detection (class, bounding box, confidence,
//! optional GPS) and persists it as an Incomplete task. Severity, priority,
//! and department derivation plus the grid-based site dedup mirror the
//! capture pipeline this service replaced; inference itself stays external.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{Department, GeoPoint, Level, LocationDetails, NewTask, Task};

use super::{internal_error, AppState};

/// Classes persisted as tasks; anything else is acknowledged but dropped.
const ACCEPTED_CLASSES: [&str; 4] = ["bin", "garbage", "spills", "trash"];

/// Grid cell size in pixels for the duplicate-site tracker.
const DEDUP_GRID_PX: f64 = 50.0;

const DEFAULT_FRAME_WIDTH: f64 = 640.0;
const DEFAULT_FRAME_HEIGHT: f64 = 480.0;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(ingest_detection))
}

/// Axis-aligned bounding box in frame pixels.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub class: String,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    pub bbox: BoundingBox,
    #[serde(default = "default_frame_width")]
    pub frame_width: f64,
    #[serde(default = "default_frame_height")]
    pub frame_height: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn default_frame_width() -> f64 {
    DEFAULT_FRAME_WIDTH
}

fn default_frame_height() -> f64 {
    DEFAULT_FRAME_HEIGHT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResponse {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
}

/// POST /api/detections - Ingest one classified detection.
async fn ingest_detection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectionRequest>,
) -> Result<(StatusCode, Json<DetectionResponse>), (StatusCode, String)> {
    let class = req.class.to_lowercase();
    if !ACCEPTED_CLASSES.contains(&class.as_str()) {
        return Ok((
            StatusCode::OK,
            Json(DetectionResponse {
                saved: false,
                reason: Some("unsupported class"),
                task: None,
            }),
        ));
    }

    if req.bbox.x2 <= req.bbox.x1 || req.bbox.y2 <= req.bbox.y1 {
        return Err((StatusCode::BAD_REQUEST, "empty bounding box".to_string()));
    }
    if req.frame_width <= 0.0 || req.frame_height <= 0.0 {
        return Err((StatusCode::BAD_REQUEST, "invalid frame dimensions".to_string()));
    }

    let center_x = (req.bbox.x1 + req.bbox.x2) / 2.0;
    let center_y = (req.bbox.y1 + req.bbox.y2) / 2.0;
    let key = dedup_key(center_x, center_y);
    if !state.dedup().insert(key) {
        return Ok((
            StatusCode::OK,
            Json(DetectionResponse {
                saved: false,
                reason: Some("duplicate"),
                task: None,
            }),
        ));
    }

    let task = state
        .store
        .insert_task(derive_task(&class, &req))
        .await
        .map_err(internal_error)?;
    state.trigger.signal_insert();

    info!(
        task = %task.id,
        class = %task.detected_class,
        severity = %task.severity,
        priority = %task.priority,
        "new detection ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(DetectionResponse {
            saved: true,
            reason: None,
            task: Some(task),
        }),
    ))
}

/// Grid cell containing a detection center; detections sharing a cell count
/// as the same site.
fn dedup_key(center_x: f64, center_y: f64) -> (i64, i64) {
    (
        (center_x / DEDUP_GRID_PX) as i64,
        (center_y / DEDUP_GRID_PX) as i64,
    )
}

/// Derive the persisted task fields from a raw detection.
fn derive_task(class: &str, req: &DetectionRequest) -> NewTask {
    let width = req.bbox.x2 - req.bbox.x1;
    let height = req.bbox.y2 - req.bbox.y1;
    let size = width * height;
    let coverage = size / (req.frame_width * req.frame_height) * 100.0;
    let center_x = (req.bbox.x1 + req.bbox.x2) / 2.0;
    let center_y = (req.bbox.y1 + req.bbox.y2) / 2.0;

    let severity = severity_for_coverage(coverage);
    let priority = severity.max(base_priority(class));
    let department = if class == "spills" {
        Department::Spill
    } else {
        Department::Cleaning
    };

    let position = match (req.latitude, req.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    NewTask {
        detected_class: class.to_string(),
        department,
        severity,
        priority,
        location: format!("CAM1-{center_x:.0}-{center_y:.0}"),
        position,
        description: format!("Detected {class} with {:.2} confidence.", req.confidence),
        size,
        location_details: LocationDetails {
            x: center_x,
            y: center_y,
            width,
            height,
            coverage_percentage: coverage,
        },
        confidence_score: req.confidence,
    }
}

/// Severity from the share of the frame the detection covers.
fn severity_for_coverage(coverage_pct: f64) -> Level {
    if coverage_pct >= 20.0 {
        Level::High
    } else if coverage_pct >= 10.0 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Baseline priority per detected class; the final priority is the higher of
/// this and the severity.
fn base_priority(class: &str) -> Level {
    match class {
        "spills" => Level::High,
        "garbage" => Level::Medium,
        _ => Level::Low,
    }
}
