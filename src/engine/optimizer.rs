//! Genetic optimizer over candidate assignments.
//!
//! Evolves a population of chromosomes with tournament selection, uniform
//! crossover (repaired for duplicate workers), decaying per-gene mutation,
//! and single-candidate elitism. The loop is terminal: it stops on the
//! generation budget, the stagnation limit, or the wall-clock budget,
//! whichever comes first, and always returns the best candidate seen.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::store::Snapshot;

use super::codec::{self, Chromosome};
use super::fitness::{evaluate, FitnessWeights};
use super::matrix::CompatibilityMatrix;

/// Multiplicative mutation-rate decay per generation.
const MUTATION_DECAY: f64 = 0.995;

/// Tunable optimizer parameters. Defaults match the service configuration.
#[derive(Debug, Clone)]
pub struct GaParams {
    pub population_size: usize,
    pub max_generations: u32,
    pub max_wall_clock: Duration,
    /// Initial per-gene mutation probability; decays across generations.
    pub mutation_rate: f64,
    pub tournament_size: usize,
    /// Generations without improvement before the run stops early.
    pub stagnation_limit: u32,
    /// Fixed RNG seed for reproducible runs; entropy when unset.
    pub seed: Option<u64>,
    pub weights: FitnessWeights,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 200,
            max_wall_clock: Duration::from_millis(5000),
            mutation_rate: 0.05,
            tournament_size: 3,
            stagnation_limit: 25,
            seed: None,
            weights: FitnessWeights::default(),
        }
    }
}

/// Why the generation loop stopped. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    MaxGenerations,
    Stagnated,
    WallClock,
}

/// Result of one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    pub best: Chromosome,
    pub best_fitness: f64,
    pub generations: u32,
    pub termination: Termination,
}

/// Evolve candidate assignments for the snapshot and return the best found.
pub fn optimize(
    snapshot: &Snapshot,
    matrix: &CompatibilityMatrix,
    params: &GaParams,
) -> OptimizerOutcome {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let started = Instant::now();

    let mut population = codec::seed_population(snapshot, matrix, params.population_size, &mut rng);
    let mut scores = score_all(&population, snapshot, matrix, &params.weights);
    let seed_best = fittest(&scores);
    let mut best = population[seed_best].clone();
    let mut best_fitness = scores[seed_best];

    let mut generation = 0u32;
    let mut stagnant = 0u32;

    let termination = loop {
        if generation >= params.max_generations {
            break Termination::MaxGenerations;
        }
        if started.elapsed() >= params.max_wall_clock {
            break Termination::WallClock;
        }
        if stagnant >= params.stagnation_limit {
            break Termination::Stagnated;
        }

        let mutation_rate = params.mutation_rate * MUTATION_DECAY.powi(generation as i32);

        let mut next = Vec::with_capacity(params.population_size);
        // Elitism: the best candidate survives unchanged, so the best fitness
        // never regresses between generations.
        next.push(best.clone());
        while next.len() < params.population_size {
            let a = tournament(&scores, params.tournament_size, &mut rng);
            let b = tournament(&scores, params.tournament_size, &mut rng);
            let mut child = crossover(&population[a], &population[b], &mut rng);
            repair(&mut child, snapshot, matrix);
            mutate(&mut child, matrix, mutation_rate, &mut rng);
            next.push(child);
        }

        population = next;
        scores = score_all(&population, snapshot, matrix, &params.weights);

        let gen_best = fittest(&scores);
        if scores[gen_best] > best_fitness {
            best = population[gen_best].clone();
            best_fitness = scores[gen_best];
            stagnant = 0;
        } else {
            stagnant += 1;
        }

        generation += 1;
        debug!(generation, best_fitness, "generation complete");
    };

    OptimizerOutcome {
        best,
        best_fitness,
        generations: generation,
        termination,
    }
}

fn score_all(
    population: &[Chromosome],
    snapshot: &Snapshot,
    matrix: &CompatibilityMatrix,
    weights: &FitnessWeights,
) -> Vec<f64> {
    population
        .par_iter()
        .map(|genes| evaluate(genes, snapshot, matrix, weights))
        .collect()
}

fn fittest(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

/// Tournament selection: sample k candidates, keep the fittest.
fn tournament<R: Rng>(scores: &[f64], k: usize, rng: &mut R) -> usize {
    let mut winner = rng.gen_range(0..scores.len());
    for _ in 1..k {
        let challenger = rng.gen_range(0..scores.len());
        if scores[challenger] > scores[winner] {
            winner = challenger;
        }
    }
    winner
}

/// Uniform crossover: each gene inherited from either parent with equal odds.
fn crossover<R: Rng>(a: &Chromosome, b: &Chromosome, rng: &mut R) -> Chromosome {
    a.iter()
        .zip(b)
        .map(|(&ga, &gb)| if rng.gen_bool(0.5) { ga } else { gb })
        .collect()
}

/// Resolve worker-assigned-twice conflicts after crossover.
///
/// The higher-priority task keeps the worker; the displaced task moves to its
/// next-cheapest eligible worker still free, or to unassigned.
fn repair(genes: &mut Chromosome, snapshot: &Snapshot, matrix: &CompatibilityMatrix) {
    let mut holder: Vec<Option<usize>> = vec![None; snapshot.workers.len()];
    let mut displaced = Vec::new();

    for t in 0..genes.len() {
        let Some(w) = genes[t] else { continue };
        if !matrix.is_eligible(t, w) {
            genes[t] = None;
            displaced.push(t);
            continue;
        }
        match holder[w] {
            None => holder[w] = Some(t),
            Some(current) => {
                let loser = if snapshot.tasks[t].priority.weight()
                    > snapshot.tasks[current].priority.weight()
                {
                    holder[w] = Some(t);
                    current
                } else {
                    t
                };
                genes[loser] = None;
                displaced.push(loser);
            }
        }
    }

    for t in displaced {
        genes[t] = matrix
            .eligible_workers(t)
            .iter()
            .copied()
            .find(|&w| holder[w].is_none());
        if let Some(w) = genes[t] {
            holder[w] = Some(t);
        }
    }
}

/// With probability `rate` per gene, move the task to a different eligible
/// worker or to unassigned.
fn mutate<R: Rng>(genes: &mut Chromosome, matrix: &CompatibilityMatrix, rate: f64, rng: &mut R) {
    for t in 0..genes.len() {
        if rng.gen::<f64>() >= rate {
            continue;
        }
        let eligible = matrix.eligible_workers(t);
        if eligible.is_empty() {
            genes[t] = None;
            continue;
        }
        let pick = eligible.get(rng.gen_range(0..=eligible.len())).copied();
        // Drawing the current worker again degenerates to unassigning, so the
        // mutation always changes the gene.
        genes[t] = if pick == genes[t] { None } else { pick };
    }
}
