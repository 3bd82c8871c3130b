use crate::choice::{AvailabilitySampler, choose_destination};
use crate::config::Activation;
use crate::model::{Destination, Tourist};
use crate::params::ParameterSet;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Record of one replicate at a single step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step whose destination states drove the choices.
    pub step: usize,
    /// Number of tourists that chose each destination.
    pub arrivals: Vec<usize>,
    /// Choice of every tourist, by tourist id (only when tracking agents).
    pub choices: Option<Vec<usize>>,
}

/// Simulation engine.
///
/// One engine runs one Monte-Carlo replicate: it owns the tourists, the
/// random number generator and the step counter.
pub struct Engine {
    destinations: Vec<Destination>,
    tourists: Vec<Tourist>,
    sampler: AvailabilitySampler,
    rng: ChaCha12Rng,
    activation: Activation,
    order: Vec<usize>,
    track_agents: bool,
    num_steps: usize,
    current_step: usize,
}

impl Engine {
    /// Create a new `Engine` for the replicate identified by `seed`.
    pub fn new(
        params: &ParameterSet,
        seed: u64,
        activation: Activation,
        track_agents: bool,
    ) -> Result<Self> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);

        let destinations = Destination::from_params(params);
        let sampler =
            AvailabilitySampler::new(&destinations).context("failed to build availabilities")?;

        let mut tourists = Vec::with_capacity(params.num_tourists);
        for id in 0..params.num_tourists {
            tourists.push(Tourist::sample(id, params, &mut rng).context("failed to sample tourist")?);
        }

        Ok(Self {
            destinations,
            tourists,
            sampler,
            rng,
            activation,
            order: (0..params.num_tourists).collect(),
            track_agents,
            num_steps: params.num_steps,
            current_step: 0,
        })
    }

    /// Replace the activation order with an explicit permutation of tourist ids.
    ///
    /// With random activation the order is still reshuffled every step.
    #[cfg(test)]
    pub fn with_order(mut self, order: Vec<usize>) -> Result<Self> {
        let mut sorted = order.clone();
        sorted.sort_unstable();
        if !sorted.iter().copied().eq(0..self.tourists.len()) {
            bail!("order must be a permutation of the tourist ids");
        }
        self.order = order;
        Ok(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.current_step == self.num_steps
    }

    /// Let every tourist choose a destination and advance one step.
    pub fn step(&mut self) -> Result<StepRecord> {
        if self.is_terminal() {
            bail!("simulation already reached step {}", self.num_steps);
        }

        if self.activation == Activation::Random {
            self.order.shuffle(&mut self.rng);
        }

        let step = self.current_step;
        let mut open = Vec::with_capacity(self.destinations.len());
        let mut arrivals = vec![0; self.destinations.len()];
        for &idx in &self.order {
            let tourist = &mut self.tourists[idx];
            let i_dst = choose_destination(
                tourist,
                &self.destinations,
                &self.sampler,
                step,
                &mut self.rng,
                &mut open,
            )
            .with_context(|| {
                format!("failed to choose destination of tourist {}", tourist.id())
            })?;
            tourist.travel_to(i_dst);
            arrivals[i_dst] += 1;
        }

        let choices = self.track_agents.then(|| {
            self.tourists
                .iter()
                .filter_map(|tourist| tourist.current_destination())
                .collect()
        });

        self.current_step += 1;

        Ok(StepRecord {
            step,
            arrivals,
            choices,
        })
    }

    /// Run the replicate until the last step and return every step record.
    pub fn run_to_completion(&mut self) -> Result<Vec<StepRecord>> {
        let mut records = Vec::with_capacity(self.num_steps - self.current_step);
        while !self.is_terminal() {
            let record = self
                .step()
                .with_context(|| format!("failed to perform step {}", self.current_step))?;
            records.push(record);
        }
        Ok(records)
    }
}
