use crate::utils::{check_num, check_tensor, check_vec};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Free parameters of the tourism model.
///
/// Treated as a value: every modification goes through a constructor
/// that returns a new set and leaves the original untouched.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Destination states (tensor `n_dst x n_step x n_fac`), values in `[0, 1]`.
    #[serde(rename = "state_by_destination_step_factor")]
    pub states: Vec<Vec<Vec<f64>>>,
    /// Mean tourist preference for each climate factor.
    #[serde(rename = "mean_tourist_preferences_by_factor")]
    pub mean_preferences: Vec<f64>,
    /// Standard deviation of the tourist preferences.
    #[serde(rename = "tourist_preferences_deviation")]
    pub preference_deviation: f64,
    /// Probability of each destination being open in any step.
    #[serde(rename = "availability_by_destination")]
    pub availability: Vec<f64>,

    pub num_destinations: usize,
    pub num_tourists: usize,
    pub num_steps: usize,
}

/// Location of a single calibrated value inside a [`ParameterSet`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "parameter", rename_all = "snake_case")]
pub enum ParamAddr {
    /// Whole trajectory of one factor of one destination; patched with a clipped delta.
    State { destination: usize, factor: usize },
    /// One entry of the mean preference vector; overwritten.
    Preference { factor: usize },
    /// Availability of one destination; overwritten.
    Availability { destination: usize },
    /// Preference deviation; overwritten.
    PreferenceDeviation,
}

impl ParameterSet {
    /// Number of climate factors describing each destination state.
    pub fn num_factors(&self) -> usize {
        self.mean_preferences.len()
    }

    /// State vector of a destination at a given step.
    pub fn state(&self, destination: usize, step: usize) -> &[f64] {
        &self.states[destination][step]
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.num_destinations, 1..10_000).context("invalid number of destinations")?;
        check_num(self.num_tourists, 1..10_000_000).context("invalid number of tourists")?;
        check_num(self.num_steps, 1..100_000).context("invalid number of steps")?;
        check_num(self.num_factors(), 1..1_000).context("invalid number of factors")?;

        check_tensor(
            &self.states,
            (self.num_destinations, self.num_steps, self.num_factors()),
        )
        .context("invalid destination states")?;
        check_vec(&self.mean_preferences, self.num_factors(), false)
            .context("invalid mean preferences")?;
        check_num(self.preference_deviation, 0.0..f64::INFINITY)
            .context("invalid preference deviation")?;
        check_vec(&self.availability, self.num_destinations, true)
            .context("invalid availabilities")?;

        // Tourists resample availabilities until some destination is open.
        if self.availability.iter().sum::<f64>() <= 0.0 {
            bail!("at least one destination must have nonzero availability");
        }

        Ok(())
    }

    /// Return a copy restricted to the first `num_steps` steps.
    pub fn truncated(&self, num_steps: usize) -> Result<Self> {
        if num_steps > self.num_steps {
            bail!(
                "cannot truncate {} steps to {num_steps} steps",
                self.num_steps
            );
        }
        let mut params = self.clone();
        params.num_steps = num_steps;
        for trajectory in &mut params.states {
            trajectory.truncate(num_steps);
        }
        Ok(params)
    }

    /// Return a copy with another number of tourists.
    pub fn with_num_tourists(&self, num_tourists: usize) -> Self {
        Self {
            num_tourists,
            ..self.clone()
        }
    }

    /// Return a copy with every addressed value patched by the matching real value.
    ///
    /// State addresses add the value to the whole trajectory of the factor and
    /// clip to `[0, 1]`; all other addresses overwrite the target directly.
    pub fn with_patch(&self, addrs: &[ParamAddr], vals: &[f64]) -> Result<Self> {
        if addrs.len() != vals.len() {
            bail!(
                "patch has {} addresses but {} values",
                addrs.len(),
                vals.len()
            );
        }

        let mut params = self.clone();
        for (&addr, &val) in addrs.iter().zip(vals) {
            params
                .apply(addr, val)
                .with_context(|| format!("failed to apply {addr:?}"))?;
        }
        params.validate().context("patched parameters are invalid")?;

        Ok(params)
    }

    fn apply(&mut self, addr: ParamAddr, val: f64) -> Result<()> {
        match addr {
            ParamAddr::State {
                destination,
                factor,
            } => {
                check_num(destination, 0..self.num_destinations).context("invalid destination")?;
                check_num(factor, 0..self.num_factors()).context("invalid factor")?;
                for state in &mut self.states[destination] {
                    state[factor] = (state[factor] + val).clamp(0.0, 1.0);
                }
            }
            ParamAddr::Preference { factor } => {
                check_num(factor, 0..self.num_factors()).context("invalid factor")?;
                self.mean_preferences[factor] = val;
            }
            ParamAddr::Availability { destination } => {
                check_num(destination, 0..self.num_destinations).context("invalid destination")?;
                self.availability[destination] = val;
            }
            ParamAddr::PreferenceDeviation => {
                self.preference_deviation = val;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Small parameter set with uniform states, used across the test suite.
    pub fn uniform_params(
        num_destinations: usize,
        num_steps: usize,
        num_tourists: usize,
        state: f64,
    ) -> ParameterSet {
        ParameterSet {
            states: vec![vec![vec![state; 2]; num_steps]; num_destinations],
            mean_preferences: vec![-0.5, -0.5],
            preference_deviation: 0.0,
            availability: vec![1.0; num_destinations],
            num_destinations,
            num_tourists,
            num_steps,
        }
    }

    #[test]
    fn validate_rejects_out_of_range_states() {
        let mut params = uniform_params(2, 3, 10, 0.5);
        assert!(params.validate().is_ok());

        params.states[0][1][1] = -0.1;
        assert!(params.validate().is_err());
    }

    #[test]
    fn validate_rejects_infeasible_availability() {
        let mut params = uniform_params(2, 3, 10, 0.5);
        params.availability = vec![0.0, 0.0];
        assert!(params.validate().is_err());
    }

    #[test]
    fn with_patch_clips_states_and_keeps_base() {
        let base = uniform_params(2, 3, 10, 0.5);
        let addrs = [
            ParamAddr::State {
                destination: 1,
                factor: 0,
            },
            ParamAddr::Preference { factor: 1 },
        ];

        let patched = base.with_patch(&addrs, &[0.8, -0.25]).unwrap();

        for step in 0..3 {
            assert_eq!(patched.state(1, step), &[1.0, 0.5]);
            assert_eq!(patched.state(0, step), &[0.5, 0.5]);
        }
        assert_eq!(patched.mean_preferences, vec![-0.5, -0.25]);
        assert_eq!(base, uniform_params(2, 3, 10, 0.5));

        let again = base.with_patch(&addrs, &[0.8, -0.25]).unwrap();
        assert_eq!(patched, again);
    }

    #[test]
    fn with_patch_rejects_bad_address() {
        let base = uniform_params(2, 3, 10, 0.5);
        let addrs = [ParamAddr::Availability { destination: 5 }];
        assert!(base.with_patch(&addrs, &[0.5]).is_err());
    }

    #[test]
    fn truncated_drops_trailing_steps() {
        let base = uniform_params(2, 5, 10, 0.5);
        let params = base.truncated(2).unwrap();
        assert_eq!(params.num_steps, 2);
        assert!(params.states.iter().all(|trajectory| trajectory.len() == 2));
        assert!(base.truncated(6).is_err());
    }
}
