//! Task assignment engine.
//!
//! One pipeline run flows strictly downward:
//! snapshot → compatibility matrix → seeded population → genetic optimizer →
//! conditional commit. The [`watcher::TriggerLoop`] orchestrates runs in
//! response to task inserts, coalescing signals that arrive mid-run.

pub mod codec;
pub mod committer;
pub mod fitness;
pub mod matrix;
pub mod optimizer;
pub mod watcher;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::store::{StoreError, TaskStore};

pub use codec::Chromosome;
pub use committer::CommitSummary;
pub use fitness::FitnessWeights;
pub use matrix::CompatibilityMatrix;
pub use optimizer::{GaParams, OptimizerOutcome, Termination};
pub use watcher::{Pipeline, TriggerHandle, TriggerLoop};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("snapshot read failed: {0}")]
    Snapshot(#[source] StoreError),

    #[error("assignment commit failed: {0}")]
    Commit(#[source] StoreError),

    #[error("optimizer task aborted: {0}")]
    Optimizer(String),
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Incomplete tasks in the snapshot.
    pub tasks: usize,
    /// Available workers in the snapshot.
    pub workers: usize,
    pub committed: usize,
    pub conflicts: usize,
    pub unassigned: usize,
    pub generations: u32,
    pub best_fitness: f64,
}

/// The assignment pipeline over a shared task store.
pub struct Engine {
    store: Arc<TaskStore>,
    params: GaParams,
}

impl Engine {
    pub fn new(store: Arc<TaskStore>, params: GaParams) -> Self {
        Self { store, params }
    }

    /// Execute one full pipeline run.
    ///
    /// The optimizer is CPU-bound and runs on the blocking pool; once the
    /// commit phase starts the run cannot be cancelled. The watcher's insert
    /// cursor advances to the newest sequence observed before the snapshot,
    /// so inserts racing the snapshot are covered again by the next poll.
    pub async fn run_once(&self) -> Result<RunSummary, EngineError> {
        let cursor_target = self
            .store
            .last_task_seq()
            .await
            .map_err(EngineError::Snapshot)?;
        let snapshot = self.store.snapshot().await.map_err(EngineError::Snapshot)?;

        if snapshot.is_empty() {
            debug!("no incomplete tasks, skipping optimization");
            self.store
                .set_cursor(cursor_target)
                .await
                .map_err(EngineError::Commit)?;
            return Ok(RunSummary {
                workers: snapshot.workers.len(),
                ..RunSummary::default()
            });
        }

        let params = self.params.clone();
        let (snapshot, outcome) = tokio::task::spawn_blocking(move || {
            let matrix = CompatibilityMatrix::build(&snapshot);
            let outcome = optimizer::optimize(&snapshot, &matrix, &params);
            (snapshot, outcome)
        })
        .await
        .map_err(|e| EngineError::Optimizer(e.to_string()))?;

        let commit = committer::commit(&self.store, &snapshot, &outcome.best)
            .await
            .map_err(EngineError::Commit)?;
        self.store
            .set_cursor(cursor_target)
            .await
            .map_err(EngineError::Commit)?;

        Ok(RunSummary {
            tasks: snapshot.tasks.len(),
            workers: snapshot.workers.len(),
            committed: commit.committed,
            conflicts: commit.conflicts,
            unassigned: commit.unassigned,
            generations: outcome.generations,
            best_fitness: outcome.best_fitness,
        })
    }
}

#[async_trait]
impl Pipeline for Engine {
    async fn run(&self) -> Result<RunSummary, EngineError> {
        self.run_once().await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use crate::store::{
        Department, GeoPoint, Level, LocationDetails, Shift, Task, TaskStatus, Worker,
    };

    pub fn task_at(
        department: Department,
        priority: Level,
        hour: u32,
        position: Option<GeoPoint>,
    ) -> Task {
        Task {
            id: Uuid::new_v4(),
            seq: 1,
            detected_class: "garbage".to_string(),
            department,
            severity: Level::Medium,
            priority,
            location: "CAM1-320-240".to_string(),
            position,
            description: "Detected garbage with 0.90 confidence.".to_string(),
            size: 9600.0,
            location_details: LocationDetails {
                x: 320.0,
                y: 240.0,
                width: 120.0,
                height: 80.0,
                coverage_percentage: 3.1,
            },
            confidence_score: 0.9,
            status: TaskStatus::Incomplete,
            assigned: false,
            assigned_worker: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap(),
        }
    }

    pub fn worker_with(
        department: Department,
        shift: Shift,
        emergency_responder: bool,
        position: Option<GeoPoint>,
    ) -> Worker {
        Worker {
            id: Uuid::new_v4(),
            name: "Ravi".to_string(),
            department,
            shift,
            location: "Depot 2".to_string(),
            position,
            available: true,
            emergency_responder,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        }
    }
}
