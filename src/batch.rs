//! Monte-Carlo batch execution.
//!
//! Every replicate is seeded with its index and runs to completion on its own
//! engine, so replicates share no mutable state. Results are merged by seed,
//! independently of the order in which workers finish.

use crate::config::{Activation, SimulationConfig};
use crate::engine::{Engine, StepRecord};
use crate::params::ParameterSet;
use anyhow::{Context, Result};
use rayon::prelude::*;

/// Step records of one replicate.
#[derive(Debug, PartialEq, Clone)]
pub struct ReplicateResult {
    pub seed: u64,
    pub records: Vec<StepRecord>,
}

/// Everything a worker needs to run a replicate.
#[derive(Clone, Copy)]
pub struct Job<'a> {
    pub params: &'a ParameterSet,
    pub activation: Activation,
    pub track_agents: bool,
}

impl Job<'_> {
    pub fn run(&self, seed: u64) -> Result<ReplicateResult> {
        let mut engine = Engine::new(self.params, seed, self.activation, self.track_agents)
            .with_context(|| format!("failed to create engine {seed}"))?;
        let records = engine
            .run_to_completion()
            .with_context(|| format!("failed to run replicate {seed}"))?;
        log::debug!("finished replicate {seed}");
        Ok(ReplicateResult { seed, records })
    }
}

/// Executes replicates and hands back their results.
pub trait WorkerPool {
    fn submit(&mut self, seed: u64);

    /// Wait for every submitted replicate; results are sorted by seed.
    fn join_all(self) -> Result<Vec<ReplicateResult>>;
}

/// Runs each replicate on the calling thread as soon as it is submitted.
pub struct SerialPool<'a> {
    job: Job<'a>,
    results: Vec<Result<ReplicateResult>>,
}

impl<'a> SerialPool<'a> {
    pub fn new(job: Job<'a>) -> Self {
        Self {
            job,
            results: Vec::new(),
        }
    }
}

impl WorkerPool for SerialPool<'_> {
    fn submit(&mut self, seed: u64) {
        self.results.push(self.job.run(seed));
    }

    fn join_all(self) -> Result<Vec<ReplicateResult>> {
        let results: Result<Vec<_>> = self.results.into_iter().collect();
        Ok(merge(results?))
    }
}

/// Runs the submitted replicates on a rayon thread pool when joined.
pub struct RayonPool<'a> {
    job: Job<'a>,
    pool: rayon::ThreadPool,
    seeds: Vec<u64>,
}

impl<'a> RayonPool<'a> {
    pub fn new(job: Job<'a>, num_workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build()
            .context("failed to create thread pool")?;
        Ok(Self {
            job,
            pool,
            seeds: Vec::new(),
        })
    }
}

impl WorkerPool for RayonPool<'_> {
    fn submit(&mut self, seed: u64) {
        self.seeds.push(seed);
    }

    fn join_all(self) -> Result<Vec<ReplicateResult>> {
        let job = self.job;
        let seeds = self.seeds;
        let results: Result<Vec<_>> = self
            .pool
            .install(|| seeds.par_iter().map(|&seed| job.run(seed)).collect());
        Ok(merge(results?))
    }
}

fn merge(mut results: Vec<ReplicateResult>) -> Vec<ReplicateResult> {
    results.sort_by_key(|result| result.seed);
    results
}

fn run_pool<P: WorkerPool>(mut pool: P, mc: usize) -> Result<Vec<ReplicateResult>> {
    for seed in 0..mc as u64 {
        pool.submit(seed);
    }
    pool.join_all()
}

/// Run `mc` replicates, seeded `0..mc`, with the given parameters.
pub fn run_batch(params: &ParameterSet, cfg: &SimulationConfig) -> Result<Vec<ReplicateResult>> {
    let job = Job {
        params,
        activation: cfg.activation,
        track_agents: cfg.track_agents,
    };

    log::debug!(
        "running {} replicates on {} workers",
        cfg.mc,
        cfg.num_workers
    );

    if cfg.num_workers <= 1 {
        run_pool(SerialPool::new(job), cfg.mc)
    } else {
        run_pool(RayonPool::new(job, cfg.num_workers)?, cfg.mc)
    }
}
