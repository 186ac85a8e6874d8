//! Compatibility matrix builder.
//!
//! Computes, once per pipeline run, an eligibility flag and a scalar cost for
//! every (task, worker) pair in the snapshot. The matrix depends only on the
//! snapshot, so every fitness evaluation of the run reuses it.

use chrono::Timelike;
use rayon::prelude::*;

use crate::store::{GeoPoint, Level, Shift, Snapshot, Task, Worker};

/// Cost added when the worker's shift does not cover the task's window.
const SHIFT_PENALTY: f64 = 25.0;

/// Cost subtracted when a High-priority task meets an emergency responder.
const EMERGENCY_BONUS: f64 = 15.0;

/// Cost per kilometer of distance between task and worker positions.
const DISTANCE_WEIGHT_PER_KM: f64 = 1.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Per-run eligibility and cost table over (task, worker) pairs.
///
/// Ineligible pairs carry a cost of `f64::INFINITY` and never appear in the
/// per-task eligible lists used for seeding and repair.
pub struct CompatibilityMatrix {
    n_workers: usize,
    cost: Vec<f64>,
    eligible_workers: Vec<Vec<usize>>,
}

impl CompatibilityMatrix {
    /// Build the matrix for a snapshot. Task rows are computed in parallel.
    pub fn build(snapshot: &Snapshot) -> Self {
        let n_workers = snapshot.workers.len();

        let rows: Vec<Vec<f64>> = snapshot
            .tasks
            .par_iter()
            .map(|task| {
                snapshot
                    .workers
                    .iter()
                    .map(|worker| pair_cost(task, worker))
                    .collect()
            })
            .collect();

        let eligible_workers = rows
            .iter()
            .map(|row| {
                let mut workers: Vec<usize> =
                    (0..n_workers).filter(|&w| row[w].is_finite()).collect();
                workers.sort_by(|&a, &b| {
                    row[a].partial_cmp(&row[b]).unwrap_or(std::cmp::Ordering::Equal)
                });
                workers
            })
            .collect();

        let cost = rows.into_iter().flatten().collect();

        Self {
            n_workers,
            cost,
            eligible_workers,
        }
    }

    pub fn is_eligible(&self, task: usize, worker: usize) -> bool {
        self.cost(task, worker).is_finite()
    }

    pub fn cost(&self, task: usize, worker: usize) -> f64 {
        self.cost[task * self.n_workers + worker]
    }

    /// Workers eligible for a task, cheapest first.
    pub fn eligible_workers(&self, task: usize) -> &[usize] {
        &self.eligible_workers[task]
    }
}

/// Cost of assigning `worker` to `task`; infinite when departments differ.
fn pair_cost(task: &Task, worker: &Worker) -> f64 {
    if task.department != worker.department {
        return f64::INFINITY;
    }

    let mut cost = distance_cost(task.position, worker.position);
    if !shift_covers_task(task, worker) {
        cost += SHIFT_PENALTY;
    }
    if task.priority == Level::High && worker.emergency_responder {
        // May push the cost negative, which is what makes the responder win
        // ties against otherwise identical workers.
        cost -= EMERGENCY_BONUS;
    }
    cost
}

/// Distance contribution; zero when either side lacks coordinates so missing
/// data never penalizes a pair.
fn distance_cost(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => equirectangular_km(a, b) * DISTANCE_WEIGHT_PER_KM,
        _ => 0.0,
    }
}

/// Whether the worker's shift covers the task's urgency window (the shift
/// window containing the task's creation hour).
fn shift_covers_task(task: &Task, worker: &Worker) -> bool {
    Shift::of_hour(task.created_at.hour()) == worker.shift
}

/// Equirectangular distance approximation, adequate at city scale.
fn equirectangular_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let mean_lat = ((a.latitude + b.latitude) / 2.0).to_radians();
    let x = d_lon * mean_lat.cos();
    EARTH_RADIUS_KM * (x * x + d_lat * d_lat).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{task_at, worker_with};
    use crate::store::Department;

    #[test]
    fn test_department_mismatch_is_ineligible() {
        let task = task_at(Department::Spill, Level::High, 9, None);
        let worker = worker_with(Department::Cleaning, Shift::Morning, false, None);
        assert!(pair_cost(&task, &worker).is_infinite());
    }

    #[test]
    fn test_missing_coordinates_cost_zero_distance() {
        let task = task_at(Department::Cleaning, Level::Low, 9, None);
        let worker = worker_with(Department::Cleaning, Shift::Morning, false, None);
        assert_eq!(pair_cost(&task, &worker), 0.0);
    }

    #[test]
    fn test_shift_mismatch_adds_penalty() {
        let task = task_at(Department::Cleaning, Level::Low, 9, None);
        let night = worker_with(Department::Cleaning, Shift::Night, false, None);
        assert_eq!(pair_cost(&task, &night), SHIFT_PENALTY);
    }

    #[test]
    fn test_emergency_bonus_applies_to_high_priority_only() {
        let responder = worker_with(Department::Cleaning, Shift::Night, true, None);
        let high = task_at(Department::Cleaning, Level::High, 9, None);
        let low = task_at(Department::Cleaning, Level::Low, 9, None);
        assert_eq!(pair_cost(&high, &responder), SHIFT_PENALTY - EMERGENCY_BONUS);
        assert_eq!(pair_cost(&low, &responder), SHIFT_PENALTY);
    }

    #[test]
    fn test_responder_beats_equal_cost_worker() {
        let task = task_at(Department::Cleaning, Level::High, 9, None);
        let responder = worker_with(Department::Cleaning, Shift::Morning, true, None);
        let regular = worker_with(Department::Cleaning, Shift::Morning, false, None);
        assert_eq!(pair_cost(&task, &responder), -EMERGENCY_BONUS);
        assert!(pair_cost(&task, &responder) < pair_cost(&task, &regular));
    }

    #[test]
    fn test_distance_is_monotonic() {
        let origin = GeoPoint {
            latitude: 12.97,
            longitude: 77.59,
        };
        let near = GeoPoint {
            latitude: 12.98,
            longitude: 77.60,
        };
        let far = GeoPoint {
            latitude: 13.20,
            longitude: 77.80,
        };
        let task = task_at(Department::Cleaning, Level::Low, 9, Some(origin));
        let near_worker = worker_with(Department::Cleaning, Shift::Morning, false, Some(near));
        let far_worker = worker_with(Department::Cleaning, Shift::Morning, false, Some(far));
        assert!(pair_cost(&task, &near_worker) < pair_cost(&task, &far_worker));
    }

    #[test]
    fn test_eligible_workers_sorted_by_cost() {
        let origin = GeoPoint {
            latitude: 12.97,
            longitude: 77.59,
        };
        let snapshot = Snapshot {
            tasks: vec![task_at(Department::Cleaning, Level::Low, 9, Some(origin))],
            workers: vec![
                worker_with(
                    Department::Cleaning,
                    Shift::Morning,
                    false,
                    Some(GeoPoint {
                        latitude: 13.20,
                        longitude: 77.80,
                    }),
                ),
                worker_with(Department::Spill, Shift::Morning, false, None),
                worker_with(
                    Department::Cleaning,
                    Shift::Morning,
                    false,
                    Some(GeoPoint {
                        latitude: 12.98,
                        longitude: 77.60,
                    }),
                ),
            ],
        };

        let matrix = CompatibilityMatrix::build(&snapshot);
        assert_eq!(matrix.eligible_workers(0), &[2, 0]);
        assert!(!matrix.is_eligible(0, 1));
        assert!(matrix.cost(0, 2) < matrix.cost(0, 0));
    }
}
