use crate::batch::run_batch;
use crate::chromosome::ChromosomeMap;
use crate::config::SimulationConfig;
use crate::genome::Genome;
use crate::instance::History;
use crate::metrics::{Metric, r2};
use crate::params::{ParamAddr, ParameterSet};
use crate::search::{Evaluator, SearchOutcome};
use crate::stats::{SimulationStatistics, share_column};
use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Calibration of a parameter set against historical arrival shares.
pub struct CalibrationProblem {
    base: ParameterSet,
    map: ChromosomeMap,
    history: History,
    sim: SimulationConfig,
    metric: Metric,
}

/// Best genome found by a calibration run and what it decodes to.
#[derive(Debug, Serialize)]
pub struct CalibrationResult {
    pub genes: Vec<i64>,
    pub reals: Vec<f64>,
    pub addrs: Vec<ParamAddr>,
    pub fitness: f64,
    pub evaluations: usize,
    pub local_optimum: bool,
    /// Coefficient of determination of the mean simulated shares, per destination.
    pub r2: Vec<f64>,
    pub params: ParameterSet,
}

impl CalibrationProblem {
    pub fn new(
        base: ParameterSet,
        map: ChromosomeMap,
        history: History,
        sim: SimulationConfig,
        metric: Metric,
    ) -> Result<Self> {
        base.validate().context("invalid base parameters")?;
        history
            .validate(&base)
            .context("history does not match the parameters")?;
        if map.addrs().iter().any(|addr| match *addr {
            ParamAddr::State { destination, .. } | ParamAddr::Availability { destination } => {
                destination >= base.num_destinations
            }
            ParamAddr::Preference { factor } => factor >= base.num_factors(),
            ParamAddr::PreferenceDeviation => false,
        }) {
            bail!("chromosome map addresses parameters outside of the model");
        }

        let sim = SimulationConfig {
            track_agents: false,
            ..sim
        };

        Ok(Self {
            base,
            map,
            history,
            sim,
            metric,
        })
    }

    /// Mean over replicates of the mean over destinations of the metric.
    pub fn compute_fitness(&self, stats: &SimulationStatistics) -> f64 {
        let seeds = stats.seeds();
        let n_dst = self.history.num_destinations();

        let mc_fitness: Vec<f64> = seeds
            .iter()
            .map(|&seed| {
                let dst_fitness: f64 = (0..n_dst)
                    .map(|i_dst| {
                        let predicted = stats.share_series(seed, i_dst, &self.history.steps);
                        self.metric.compute(&self.history.shares[i_dst], &predicted)
                    })
                    .sum();
                dst_fitness / n_dst as f64
            })
            .collect();

        mc_fitness.iter().sum::<f64>() / mc_fitness.len() as f64
    }

    fn simulate(&self, params: &ParameterSet) -> Result<SimulationStatistics> {
        let results = run_batch(params, &self.sim).context("failed to run batch")?;
        Ok(SimulationStatistics::new(&results, params.num_destinations))
    }

    /// Decode the best genome of a search and describe it.
    pub fn report(&self, outcome: &SearchOutcome) -> Result<CalibrationResult> {
        let genome = &outcome.best;
        let params = self.map.decode(&self.base, genome)?;
        let stats = self.simulate(&params)?;

        let r2 = (0..self.history.num_destinations())
            .map(|i_dst| {
                let predicted: Vec<_> = self
                    .history
                    .steps
                    .iter()
                    .map(|&step| {
                        stats
                            .summary
                            .get(&share_column(i_dst), step)
                            .map_or(f64::NAN, |report| report.mean)
                    })
                    .collect();
                r2(&self.history.shares[i_dst], &predicted)
            })
            .collect();

        Ok(CalibrationResult {
            genes: genome.genes().to_vec(),
            reals: self.map.to_reals(genome.genes()),
            addrs: self.map.addrs().to_vec(),
            fitness: genome.fitness.unwrap_or(f64::NAN),
            evaluations: outcome.evaluations,
            local_optimum: outcome.local_optimum,
            r2,
            params,
        })
    }
}

impl Evaluator for CalibrationProblem {
    fn evaluate(&self, genome: &Genome) -> Result<f64> {
        let params = self
            .map
            .decode(&self.base, genome)
            .context("failed to decode genome")?;
        let stats = self.simulate(&params)?;
        let fitness = self.compute_fitness(&stats);
        log::debug!("evaluated {:?}: {fitness}", genome.genes());
        Ok(fitness)
    }
}
