//! Candidate assignment encoding and population seeding.
//!
//! A chromosome is an array indexed by snapshot task position, each gene
//! holding a worker index or `None` for unassigned. The initial population
//! mixes one greedy individual with randomized eligible individuals so the
//! optimizer starts from a good solution without converging prematurely.

use rand::Rng;

use crate::store::Snapshot;

use super::matrix::CompatibilityMatrix;

/// One full task→worker mapping proposal.
pub type Chromosome = Vec<Option<usize>>;

/// Seed the initial population: one greedy assignment, the rest randomized.
pub fn seed_population<R: Rng>(
    snapshot: &Snapshot,
    matrix: &CompatibilityMatrix,
    population_size: usize,
    rng: &mut R,
) -> Vec<Chromosome> {
    let mut population = Vec::with_capacity(population_size);
    population.push(greedy_assignment(snapshot, matrix));
    while population.len() < population_size {
        population.push(random_assignment(snapshot.tasks.len(), matrix, rng));
    }
    population
}

/// Greedy seed: walk tasks in descending priority (insertion order breaking
/// ties) and give each the cheapest eligible worker not yet taken.
pub fn greedy_assignment(snapshot: &Snapshot, matrix: &CompatibilityMatrix) -> Chromosome {
    let mut order: Vec<usize> = (0..snapshot.tasks.len()).collect();
    order.sort_by_key(|&t| std::cmp::Reverse(snapshot.tasks[t].priority.weight()));

    let mut genes: Chromosome = vec![None; snapshot.tasks.len()];
    let mut taken = vec![false; snapshot.workers.len()];

    for t in order {
        genes[t] = matrix
            .eligible_workers(t)
            .iter()
            .copied()
            .find(|&w| !taken[w]);
        if let Some(w) = genes[t] {
            taken[w] = true;
        }
    }
    genes
}

/// Random seed: each gene drawn uniformly from the task's eligible workers
/// plus the unassigned sentinel. Duplicate workers are allowed here; the
/// conflict penalty and crossover repair weed them out.
fn random_assignment<R: Rng>(
    n_tasks: usize,
    matrix: &CompatibilityMatrix,
    rng: &mut R,
) -> Chromosome {
    (0..n_tasks)
        .map(|t| {
            let eligible = matrix.eligible_workers(t);
            if eligible.is_empty() {
                return None;
            }
            let pick = rng.gen_range(0..=eligible.len());
            eligible.get(pick).copied()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{task_at, worker_with};
    use crate::store::{Department, Level, Shift};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot_three_tasks_two_workers() -> Snapshot {
        Snapshot {
            tasks: vec![
                task_at(Department::Cleaning, Level::Low, 9, None),
                task_at(Department::Cleaning, Level::High, 9, None),
                task_at(Department::Cleaning, Level::Medium, 9, None),
            ],
            workers: vec![
                worker_with(Department::Cleaning, Shift::Morning, false, None),
                worker_with(Department::Cleaning, Shift::Morning, false, None),
            ],
        }
    }

    #[test]
    fn test_greedy_assigns_high_priority_first() {
        let snapshot = snapshot_three_tasks_two_workers();
        let matrix = CompatibilityMatrix::build(&snapshot);
        let genes = greedy_assignment(&snapshot, &matrix);

        // High (index 1) and Medium (index 2) get the two workers; Low misses out.
        assert!(genes[1].is_some());
        assert!(genes[2].is_some());
        assert_eq!(genes[0], None);
        assert_ne!(genes[1], genes[2]);
    }

    #[test]
    fn test_greedy_leaves_ineligible_task_unassigned() {
        let snapshot = Snapshot {
            tasks: vec![task_at(Department::Spill, Level::High, 9, None)],
            workers: vec![worker_with(Department::Cleaning, Shift::Morning, false, None)],
        };
        let matrix = CompatibilityMatrix::build(&snapshot);
        assert_eq!(greedy_assignment(&snapshot, &matrix), vec![None]);
    }

    #[test]
    fn test_random_genes_are_eligible_or_unassigned() {
        let snapshot = snapshot_three_tasks_two_workers();
        let matrix = CompatibilityMatrix::build(&snapshot);
        let mut rng = StdRng::seed_from_u64(7);

        for genes in seed_population(&snapshot, &matrix, 20, &mut rng) {
            assert_eq!(genes.len(), snapshot.tasks.len());
            for (t, gene) in genes.iter().enumerate() {
                if let Some(w) = gene {
                    assert!(matrix.is_eligible(t, *w));
                }
            }
        }
    }

    #[test]
    fn test_population_size_respected() {
        let snapshot = snapshot_three_tasks_two_workers();
        let matrix = CompatibilityMatrix::build(&snapshot);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(seed_population(&snapshot, &matrix, 50, &mut rng).len(), 50);
    }
}
