use crate::batch::run_batch;
use crate::chromosome::ChromosomeMap;
use crate::config::{Config, Strategy};
use crate::instance::{History, Instance};
use crate::policy::ClimaticPolicy;
use crate::problem::CalibrationProblem;
use crate::search::{HillClimbing, IteratedLocalSearch, OneStepMutation};
use crate::stats::{SimulationStatistics, share_column};
use anyhow::{Context, Result};
use glob::glob;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
    instance: Instance,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        let instance_file = sim_dir.join(&cfg.input.instance);
        let instance = Instance::from_file(&instance_file)
            .with_context(|| format!("failed to load {instance_file:?}"))?;
        log::info!(
            "loaded instance with {} destinations, {} factors and {} steps",
            instance.params.num_destinations,
            instance.params.num_factors(),
            instance.params.num_steps
        );

        Ok(Self {
            sim_dir,
            cfg,
            instance,
        })
    }

    /// Run a Monte-Carlo batch of the instance and save raw and summary results.
    pub fn simulate(&self) -> Result<()> {
        let run_dir = self.create_run_dir()?;

        let results =
            run_batch(&self.instance.params, &self.cfg.simulation).context("failed to run batch")?;
        let stats = SimulationStatistics::new(&results, self.instance.params.num_destinations);
        log::info!("simulated {} replicates", results.len());
        for (i_dst, name) in self.instance.destinations.iter().enumerate() {
            if let Some(share) = stats.summary.aggregate("mean", &share_column(i_dst)) {
                log::info!("mean share of {name}: {:.4}", share.mean);
            }
        }

        let raw_file = run_dir.join("raw.msgpack");
        let file = File::create(&raw_file).with_context(|| format!("failed to create {raw_file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &stats.raw).context("failed to serialize raw results")?;
        writer.flush().context("failed to flush writer stream")?;

        write_json(run_dir.join("summary.json"), &stats.summary)?;

        Ok(())
    }

    /// Calibrate the instance against the history and save the calibrated instance.
    pub fn calibrate(&self) -> Result<()> {
        let cal = self.cfg.calibration()?;
        let history_file = self
            .cfg
            .input
            .history
            .as_ref()
            .map(|history| self.sim_dir.join(history))
            .context("config has no history file")?;
        let history = History::from_file(&history_file, cal.base_year)
            .with_context(|| format!("failed to load {history_file:?}"))?;

        let mut params = self.instance.params.clone();
        if let Some(num_steps) = cal.num_steps {
            params = params.truncated(num_steps)?;
        }
        if let Some(num_tourists) = cal.num_tourists {
            params = params.with_num_tourists(num_tourists);
        }

        let map = ChromosomeMap::from_config(&params, cal).context("failed to build map")?;
        log::info!("calibrating {} parameters", map.len());

        let genes = match &cal.initial_reals {
            Some(reals) => map.encode(reals).context("failed to encode initial values")?,
            None => vec![cal.initial_gene; map.len()],
        };
        let start = map.genome(genes)?;
        let problem = CalibrationProblem::new(
            params,
            map.clone(),
            history,
            self.cfg.simulation.clone(),
            cal.metric,
        )
        .context("failed to construct calibration problem")?;

        let run_dir = self.create_run_dir()?;

        let outcome = match cal.strategy {
            Strategy::HillClimbing => {
                HillClimbing::new(&problem, start, cal.max_evaluations)?.run()?
            }
            Strategy::IteratedLocalSearch => {
                let mut rng = ChaCha12Rng::seed_from_u64(cal.seed);
                let mutation = OneStepMutation::new(cal.mutation_probability);
                IteratedLocalSearch::new(&problem, mutation, cal.max_evaluations, cal.ils_iterations)
                    .run(start, &mut rng)?
            }
        };
        log::info!(
            "best fitness {:?} after {} evaluations",
            outcome.best.fitness,
            outcome.evaluations
        );

        let report = problem.report(&outcome).context("failed to report result")?;
        write_json(run_dir.join("calibration.json"), &report)?;

        // The genome also applies to the full-horizon instance.
        let calibrated = Instance {
            params: map
                .decode(&self.instance.params, &outcome.best)
                .context("failed to decode best genome")?,
            ..self.instance.clone()
        };
        calibrated.save(run_dir.join("calibrated_instance.json"))?;

        Ok(())
    }

    /// Evaluate a climatic policy for one destination and save the final share.
    pub fn evaluate_policy(
        &self,
        destination: usize,
        start: usize,
        end: usize,
        levels: &[f64],
    ) -> Result<()> {
        let policy = ClimaticPolicy::new(
            self.instance.params.clone(),
            destination,
            start,
            end,
            self.cfg.simulation.clone(),
        )
        .context("failed to construct policy")?;

        let run_dir = self.create_run_dir()?;

        let evaluation = policy.evaluate(levels).context("failed to evaluate policy")?;
        log::info!(
            "final share of {}: {}",
            self.instance.destinations[destination],
            evaluation.final_share
        );
        write_json(run_dir.join("policy.json"), &evaluation)?;

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn create_run_dir(&self) -> Result<PathBuf> {
        let run_idx = self.run_dirs().context("failed to count run dirs")?.len();
        let run_dir = self.sim_dir.join(format!("run-{run_idx:04}"));
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");
        Ok(run_dir)
    }
}

fn write_json<P: AsRef<Path>, T: Serialize>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let writer = BufWriter::new(
        File::create(file).with_context(|| format!("failed to create {file:?}"))?,
    );
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("failed to serialize {file:?}"))?;
    Ok(())
}
