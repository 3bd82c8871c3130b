//! Local search over bounded-integer genomes.
//!
//! [`HillClimbing`] is a pull-based state machine: every call to
//! [`HillClimbing::next_state`] evaluates at most one neighbor. Greedy
//! descent accepts a neighbor only when its fitness is strictly lower.

use crate::genome::Genome;
use crate::neighbor::NeighborOperator;
use anyhow::{Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Scalar fitness of a genome, lower is better.
///
/// Implementations must not keep state between calls, so that external
/// optimizers can use them as a plain objective function.
pub trait Evaluator {
    fn evaluate(&self, genome: &Genome) -> Result<f64>;
}

/// Evaluate a genome and store its fitness.
fn evaluate_into<E: Evaluator>(evaluator: &E, genome: &mut Genome) -> Result<()> {
    let fitness = evaluator
        .evaluate(genome)
        .with_context(|| format!("failed to evaluate {:?}", genome.genes()))?;
    if fitness.is_nan() {
        log::warn!("fitness of {:?} is undefined", genome.genes());
    }
    genome.fitness = Some(fitness);
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SearchState {
    /// More neighbors remain to be evaluated.
    Stepping,
    /// No neighbor of the incumbent improves on it.
    LocalOptimum,
    /// The evaluation budget is spent.
    BudgetExhausted,
}

/// Result of a local search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: Genome,
    /// Number of neighbor evaluations.
    pub evaluations: usize,
    pub local_optimum: bool,
    /// Fitness of the incumbent after each accepted move, starting with the initial genome.
    pub accepted: Vec<f64>,
}

pub struct HillClimbing<'a, E> {
    evaluator: &'a E,
    neighbors: NeighborOperator,
    max_evaluations: usize,
    evaluations: usize,
    accepted: Vec<f64>,
}

impl<'a, E: Evaluator> HillClimbing<'a, E> {
    /// Install the starting genome, evaluating it if needed.
    pub fn new(evaluator: &'a E, mut start: Genome, max_evaluations: usize) -> Result<Self> {
        start.check_bounds().context("starting genome is out of bounds")?;
        if start.fitness.is_none() {
            evaluate_into(evaluator, &mut start).context("failed to evaluate starting genome")?;
        }
        let accepted = start.fitness.into_iter().collect();
        Ok(Self {
            evaluator,
            neighbors: NeighborOperator::new(start),
            max_evaluations,
            evaluations: 0,
            accepted,
        })
    }

    pub fn incumbent(&self) -> &Genome {
        self.neighbors.origin()
    }

    pub fn state(&self) -> SearchState {
        if self.evaluations >= self.max_evaluations {
            SearchState::BudgetExhausted
        } else if self.neighbors.finished() {
            SearchState::LocalOptimum
        } else {
            SearchState::Stepping
        }
    }

    /// Evaluate the next neighbor and accept it if it improves the incumbent.
    pub fn next_state(&mut self) -> Result<SearchState> {
        if self.state() != SearchState::Stepping {
            return Ok(self.state());
        }
        let Some(mut neighbor) = self.neighbors.generate_neighbor() else {
            return Ok(SearchState::LocalOptimum);
        };

        evaluate_into(self.evaluator, &mut neighbor)?;
        self.evaluations += 1;

        if neighbor.is_better_than(self.incumbent()) {
            log::info!(
                "evaluation {}: accepted {:?} with fitness {:?}",
                self.evaluations,
                neighbor.genes(),
                neighbor.fitness
            );
            self.accepted.extend(neighbor.fitness);
            self.neighbors.reset(neighbor);
        } else {
            log::debug!(
                "evaluation {}: rejected {:?} with fitness {:?}",
                self.evaluations,
                neighbor.genes(),
                neighbor.fitness
            );
            self.neighbors.advance();
        }

        Ok(self.state())
    }

    pub fn run(mut self) -> Result<SearchOutcome> {
        let state = loop {
            let state = self.next_state()?;
            if state != SearchState::Stepping {
                break state;
            }
        };
        log::info!(
            "hill climbing stopped ({state:?}) after {} evaluations with fitness {:?}",
            self.evaluations,
            self.incumbent().fitness
        );
        Ok(SearchOutcome {
            best: self.neighbors.origin().clone(),
            evaluations: self.evaluations,
            local_optimum: state == SearchState::LocalOptimum,
            accepted: self.accepted,
        })
    }
}

/// Perturbation moving `floor(probability * n)` distinct genes by one step.
pub struct OneStepMutation {
    probability: f64,
}

impl OneStepMutation {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }

    pub fn mutate<R: Rng + ?Sized>(&self, genome: &Genome, rng: &mut R) -> Genome {
        let n_genes = genome.len();
        let n_mut = (self.probability * n_genes as f64) as usize;
        let idxs: Vec<_> = (0..n_genes).collect();

        let mut mutated = genome.clone();
        for &idx in idxs.choose_multiple(rng, n_mut) {
            let moves: Vec<_> = [-1, 1]
                .into_iter()
                .filter_map(|delta| mutated.shifted(idx, delta))
                .collect();
            if let Some(next) = moves.choose(rng) {
                mutated = next.clone();
            }
        }
        mutated.fitness = None;
        mutated
    }
}

/// Repeated hill climbing from perturbed copies of the incumbent.
pub struct IteratedLocalSearch<'a, E> {
    evaluator: &'a E,
    mutation: OneStepMutation,
    local_evaluations: usize,
    max_iterations: usize,
}

impl<'a, E: Evaluator> IteratedLocalSearch<'a, E> {
    pub fn new(
        evaluator: &'a E,
        mutation: OneStepMutation,
        local_evaluations: usize,
        max_iterations: usize,
    ) -> Self {
        Self {
            evaluator,
            mutation,
            local_evaluations,
            max_iterations,
        }
    }

    pub fn run<R: Rng + ?Sized>(&self, start: Genome, rng: &mut R) -> Result<SearchOutcome> {
        let first = HillClimbing::new(self.evaluator, start, self.local_evaluations)?.run()?;

        let mut evaluations = first.evaluations;
        let mut local_optimum = first.local_optimum;
        let mut best = first.best;
        let mut accepted: Vec<_> = best.fitness.into_iter().collect();

        for iteration in 1..self.max_iterations {
            let perturbed = self.mutation.mutate(&best, rng);
            let outcome =
                HillClimbing::new(self.evaluator, perturbed, self.local_evaluations)?.run()?;
            evaluations += outcome.evaluations;

            if outcome.best.is_better_than(&best) {
                log::info!(
                    "iteration {iteration}: improved fitness to {:?}",
                    outcome.best.fitness
                );
                best = outcome.best;
                local_optimum = outcome.local_optimum;
                accepted.extend(best.fitness);
            }
        }

        Ok(SearchOutcome {
            best,
            evaluations,
            local_optimum,
            accepted,
        })
    }
}
