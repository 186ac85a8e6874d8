//! Fitness evaluation for candidate assignments.

use crate::store::Snapshot;

use super::codec::Chromosome;
use super::matrix::CompatibilityMatrix;

/// Objective weights for the fitness function.
///
/// The conflict penalty must dominate the other terms so an infeasible
/// candidate always scores below any feasible one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessWeights {
    pub w_priority: f64,
    pub w_cost: f64,
    pub w_balance: f64,
    pub penalty_conflict: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            w_priority: 10.0,
            w_cost: 1.0,
            w_balance: 2.0,
            penalty_conflict: 10_000.0,
        }
    }
}

/// Score a candidate: priority coverage minus compatibility cost, load
/// imbalance, and constraint violations.
///
/// Unassigned genes contribute nothing; leaving a task without an eligible
/// worker unassigned is encouraged, never punished as a conflict.
pub fn evaluate(
    genes: &Chromosome,
    snapshot: &Snapshot,
    matrix: &CompatibilityMatrix,
    weights: &FitnessWeights,
) -> f64 {
    let mut coverage = 0.0;
    let mut cost = 0.0;
    let mut conflicts = 0u32;
    let mut loads = vec![0u32; snapshot.workers.len()];

    for (t, gene) in genes.iter().enumerate() {
        let Some(w) = *gene else { continue };

        if !matrix.is_eligible(t, w) {
            conflicts += 1;
            continue;
        }

        coverage += snapshot.tasks[t].priority.weight() as f64;
        cost += matrix.cost(t, w);
        loads[w] += 1;
    }

    // A worker taken by k tasks in one run yields k-1 uniqueness violations.
    conflicts += loads.iter().filter(|&&l| l > 1).map(|l| l - 1).sum::<u32>();

    weights.w_priority * coverage
        - weights.w_cost * cost
        - weights.w_balance * load_variance(&loads)
        - weights.penalty_conflict * conflicts as f64
}

/// Population variance of per-worker load.
fn load_variance(loads: &[u32]) -> f64 {
    if loads.is_empty() {
        return 0.0;
    }
    let n = loads.len() as f64;
    let mean = loads.iter().sum::<u32>() as f64 / n;
    loads
        .iter()
        .map(|&l| {
            let d = l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{task_at, worker_with};
    use crate::store::{Department, Level, Shift};

    fn cleaning_snapshot(n_tasks: usize, n_workers: usize) -> Snapshot {
        Snapshot {
            tasks: (0..n_tasks)
                .map(|_| task_at(Department::Cleaning, Level::Medium, 9, None))
                .collect(),
            workers: (0..n_workers)
                .map(|_| worker_with(Department::Cleaning, Shift::Morning, false, None))
                .collect(),
        }
    }

    #[test]
    fn test_assigning_more_priority_scores_higher() {
        let snapshot = cleaning_snapshot(2, 2);
        let matrix = CompatibilityMatrix::build(&snapshot);
        let weights = FitnessWeights::default();

        let both = evaluate(&vec![Some(0), Some(1)], &snapshot, &matrix, &weights);
        let one = evaluate(&vec![Some(0), None], &snapshot, &matrix, &weights);
        let none = evaluate(&vec![None, None], &snapshot, &matrix, &weights);
        assert!(both > one);
        assert!(one > none);
    }

    #[test]
    fn test_duplicate_worker_counts_as_conflict() {
        let snapshot = cleaning_snapshot(2, 2);
        let matrix = CompatibilityMatrix::build(&snapshot);
        let weights = FitnessWeights::default();

        let feasible = evaluate(&vec![Some(0), Some(1)], &snapshot, &matrix, &weights);
        let duplicated = evaluate(&vec![Some(0), Some(0)], &snapshot, &matrix, &weights);
        assert!(duplicated < feasible - weights.penalty_conflict / 2.0);
    }

    #[test]
    fn test_ineligible_gene_counts_as_conflict() {
        let snapshot = Snapshot {
            tasks: vec![task_at(Department::Spill, Level::High, 9, None)],
            workers: vec![worker_with(Department::Cleaning, Shift::Morning, false, None)],
        };
        let matrix = CompatibilityMatrix::build(&snapshot);
        let weights = FitnessWeights::default();

        let infeasible = evaluate(&vec![Some(0)], &snapshot, &matrix, &weights);
        let unassigned = evaluate(&vec![None], &snapshot, &matrix, &weights);
        assert!(infeasible < unassigned);
        // Leaving it unassigned is neutral, not a conflict.
        assert_eq!(unassigned, 0.0);
    }

    #[test]
    fn test_balance_prefers_spreading_load() {
        // One worker per department would force concentration; here both
        // workers are interchangeable, so spreading must win.
        let snapshot = cleaning_snapshot(2, 2);
        let matrix = CompatibilityMatrix::build(&snapshot);
        let weights = FitnessWeights {
            penalty_conflict: 0.0, // isolate the balance term
            ..FitnessWeights::default()
        };

        let spread = evaluate(&vec![Some(0), Some(1)], &snapshot, &matrix, &weights);
        let piled = evaluate(&vec![Some(0), Some(0)], &snapshot, &matrix, &weights);
        assert!(spread > piled);
    }

    #[test]
    fn test_load_variance() {
        assert_eq!(load_variance(&[]), 0.0);
        assert_eq!(load_variance(&[1, 1]), 0.0);
        assert_eq!(load_variance(&[2, 0]), 1.0);
    }
}
