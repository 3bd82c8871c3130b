use crate::metrics::Metric;
use crate::utils::check_num;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

/// Input file locations, relative to the simulation directory.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Model instance (JSON).
    pub instance: PathBuf,
    /// Historical arrival shares (CSV), required for calibration.
    pub history: Option<PathBuf>,
}

/// Order in which tourists are activated within a step.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Reshuffle the tourists every step.
    #[default]
    Random,
    /// Activate tourists by increasing id.
    Sequential,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of Monte-Carlo replicates.
    pub mc: usize,
    /// Number of worker threads used to run replicates.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Record every tourist's choice and the resulting flow matrices.
    #[serde(default)]
    pub track_agents: bool,
    #[serde(default)]
    pub activation: Activation,
}

/// Local-search strategy used by the calibration command.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    HillClimbing,
    IteratedLocalSearch,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub metric: Metric,
    /// Year mapped to simulation step 0.
    #[serde(default = "default_base_year")]
    pub base_year: i64,
    /// Truncate the simulated horizon to this many steps.
    pub num_steps: Option<usize>,
    /// Override the number of tourists while calibrating.
    pub num_tourists: Option<usize>,

    pub calibrate_states: bool,
    pub calibrate_preferences: bool,
    /// Relative (preferences) or absolute (states) half-width of the search interval.
    pub variation_range: f64,
    /// Destinations whose states are calibrated, in chromosome order.
    #[serde(default)]
    pub destinations: Vec<usize>,

    #[serde(default = "default_int_upper")]
    pub int_upper: i64,
    /// Value assigned to every gene of the starting genome.
    #[serde(default = "default_initial_gene")]
    pub initial_gene: i64,
    /// Real values of the starting genome, in chromosome order; overrides `initial_gene`.
    pub initial_reals: Option<Vec<f64>>,
    pub max_evaluations: usize,

    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_ils_iterations")]
    pub ils_iterations: usize,
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Configuration of a simulation directory.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    pub simulation: SimulationConfig,
    pub calibration: Option<CalibrationConfig>,
}

fn default_num_workers() -> usize {
    1
}

fn default_base_year() -> i64 {
    2000
}

fn default_int_upper() -> i64 {
    1000
}

fn default_initial_gene() -> i64 {
    500
}

fn default_ils_iterations() -> usize {
    10
}

fn default_mutation_probability() -> f64 {
    0.1
}

fn default_seed() -> u64 {
    1024
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Calibration section, which only some commands require.
    pub fn calibration(&self) -> Result<&CalibrationConfig> {
        self.calibration
            .as_ref()
            .context("config has no [calibration] section")
    }

    fn validate(&self) -> Result<()> {
        check_num(self.simulation.mc, 1..10_000).context("invalid number of replicates")?;
        check_num(self.simulation.num_workers, 1..1_024).context("invalid number of workers")?;

        if let Some(cal) = &self.calibration {
            cal.validate().context("invalid calibration section")?;
        }

        Ok(())
    }
}

impl CalibrationConfig {
    fn validate(&self) -> Result<()> {
        if !self.calibrate_states && !self.calibrate_preferences {
            bail!("at least one of states or preferences must be calibrated");
        }
        if self.calibrate_states && self.destinations.is_empty() {
            bail!("state calibration requires at least one destination");
        }
        let mut destinations = self.destinations.clone();
        destinations.sort_unstable();
        if destinations.windows(2).any(|pair| pair[0] == pair[1]) {
            bail!("calibrated destinations must be distinct");
        }
        if let Some(num_steps) = self.num_steps {
            check_num(num_steps, 1..100_000).context("invalid number of steps")?;
        }
        if let Some(num_tourists) = self.num_tourists {
            check_num(num_tourists, 1..10_000_000).context("invalid number of tourists")?;
        }
        check_num(self.variation_range, 0.0..=1.0).context("invalid variation range")?;
        check_num(self.int_upper, 1..=1_000_000).context("invalid integer upper bound")?;
        check_num(self.initial_gene, 0..=self.int_upper).context("invalid initial gene")?;
        check_num(self.max_evaluations, 1..10_000_000).context("invalid maximum evaluations")?;
        check_num(self.ils_iterations, 1..100_000).context("invalid number of ILS iterations")?;
        check_num(self.mutation_probability, 0.0..=1.0)
            .context("invalid mutation probability")?;
        Ok(())
    }
}
