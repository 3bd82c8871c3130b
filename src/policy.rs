use crate::batch::run_batch;
use crate::config::SimulationConfig;
use crate::params::ParameterSet;
use crate::stats::{SimulationStatistics, share_column};
use crate::utils::{check_num, check_vec};
use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Climate mitigation policy applied to one destination over a window of steps.
///
/// A policy level `x[f]` in `[0, 1]` keeps the fraction `x[f]` of the
/// deterioration of factor `f` between the start and the end of the window;
/// `0` freezes the factor at its starting value and `1` leaves it unchanged.
pub struct ClimaticPolicy {
    destination: usize,
    start: usize,
    end: usize,
    base: ParameterSet,
    sim: SimulationConfig,
}

#[derive(Debug, Serialize)]
pub struct PolicyEvaluation {
    pub destination: usize,
    pub start: usize,
    pub end: usize,
    pub levels: Vec<f64>,
    /// Mean share of the destination at the last step of the window.
    pub final_share: f64,
}

impl ClimaticPolicy {
    pub fn new(
        base: ParameterSet,
        destination: usize,
        start: usize,
        end: usize,
        sim: SimulationConfig,
    ) -> Result<Self> {
        check_num(destination, 0..base.num_destinations).context("invalid destination")?;
        if start >= end || end > base.num_steps {
            bail!(
                "policy window [{start}, {end}) does not fit in {} steps",
                base.num_steps
            );
        }
        Ok(Self {
            destination,
            start,
            end,
            base,
            sim,
        })
    }

    /// Parameters with the destination's states ramped towards the mitigated end state.
    pub fn apply(&self, levels: &[f64]) -> Result<ParameterSet> {
        check_vec(levels, self.base.num_factors(), true).context("invalid policy levels")?;

        let mut params = self.base.clone();
        let trajectory = &mut params.states[self.destination];
        let start_state = trajectory[self.start].clone();
        let end_state = self.base.state(self.destination, self.end - 1);

        let n_steps = self.end - self.start;
        for (i_fac, &level) in levels.iter().enumerate() {
            let deterioration = (end_state[i_fac] - start_state[i_fac]).max(0.0);
            let target = start_state[i_fac] + level * deterioration;
            for (offset, state) in trajectory[self.start..self.end].iter_mut().enumerate() {
                let frac = if n_steps > 1 {
                    offset as f64 / (n_steps - 1) as f64
                } else {
                    0.0
                };
                state[i_fac] = start_state[i_fac] + frac * (target - start_state[i_fac]);
            }
        }

        Ok(params)
    }

    /// Mean final share of the destination under the given policy levels.
    pub fn evaluate(&self, levels: &[f64]) -> Result<PolicyEvaluation> {
        let params = self.apply(levels)?;
        let results = run_batch(&params, &self.sim).context("failed to run batch")?;
        let stats = SimulationStatistics::new(&results, params.num_destinations);

        let final_share = stats
            .summary
            .get(&share_column(self.destination), self.end - 1)
            .context("missing final share")?
            .mean;

        Ok(PolicyEvaluation {
            destination: self.destination,
            start: self.start,
            end: self.end,
            levels: levels.to_vec(),
            final_share,
        })
    }
}
