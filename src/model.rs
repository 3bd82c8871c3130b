use crate::params::ParameterSet;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Tourist destination.
///
/// Holds the state of every climate factor at every step and the probability
/// of being open for booking in any step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    id: usize,
    states: Vec<Vec<f64>>,
    availability: f64,
}

impl Destination {
    pub fn new(id: usize, states: Vec<Vec<f64>>, availability: f64) -> Self {
        Self {
            id,
            states,
            availability,
        }
    }

    /// Build every destination described by a parameter set.
    pub fn from_params(params: &ParameterSet) -> Vec<Self> {
        params
            .states
            .iter()
            .zip(&params.availability)
            .enumerate()
            .map(|(id, (states, &availability))| Self::new(id, states.clone(), availability))
            .collect()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self, step: usize) -> &[f64] {
        &self.states[step]
    }

    pub fn availability(&self) -> f64 {
        self.availability
    }
}

/// Tourist agent.
///
/// Preferences are non-positive and their absolute values sum to one, so the
/// dot product with a destination state penalizes degraded factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tourist {
    id: usize,
    preferences: Vec<f64>,
    current_destination: Option<usize>,
}

impl Tourist {
    /// Create a tourist from raw preferences, normalizing them.
    ///
    /// Positive components are clipped to zero. A vector without negative
    /// components becomes uniform.
    pub fn new(id: usize, raw_preferences: &[f64]) -> Self {
        let mut preferences: Vec<_> = raw_preferences.iter().map(|&ele| ele.min(0.0)).collect();
        let sum: f64 = preferences.iter().map(|ele| ele.abs()).sum();
        if sum > 0.0 {
            preferences.iter_mut().for_each(|ele| *ele /= sum);
        } else {
            let n_fac = preferences.len() as f64;
            preferences.iter_mut().for_each(|ele| *ele = -1.0 / n_fac);
        }
        Self {
            id,
            preferences,
            current_destination: None,
        }
    }

    /// Sample a tourist whose raw preferences follow a normal distribution per factor.
    pub fn sample<R: Rng + ?Sized>(id: usize, params: &ParameterSet, rng: &mut R) -> Result<Self> {
        let mut raw_preferences = Vec::with_capacity(params.num_factors());
        for &mean in &params.mean_preferences {
            let dist = Normal::new(mean, params.preference_deviation)?;
            raw_preferences.push(dist.sample(rng));
        }
        Ok(Self::new(id, &raw_preferences))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Destination chosen in the last step, `None` before the first step.
    pub fn current_destination(&self) -> Option<usize> {
        self.current_destination
    }

    pub fn travel_to(&mut self, destination: usize) {
        self.current_destination = Some(destination);
    }

    /// Preference score of a destination at a given step.
    pub fn score(&self, destination: &Destination, step: usize) -> f64 {
        self.preferences
            .iter()
            .zip(destination.state(step))
            .map(|(pref, state)| pref * state)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests::uniform_params;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn preferences_are_normalized() {
        let mut params = uniform_params(2, 3, 10, 0.0);
        params.mean_preferences = vec![-0.3, -0.1, -0.6, 0.2];
        params.states = vec![vec![vec![0.0; 4]; 3]; 2];
        params.preference_deviation = 0.2;

        let mut rng = ChaCha12Rng::seed_from_u64(7);
        for id in 0..200 {
            let tourist = Tourist::sample(id, &params, &mut rng).unwrap();
            let sum: f64 = tourist.preferences.iter().map(|ele| ele.abs()).sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(tourist.preferences.iter().all(|&ele| ele <= 0.0));
        }
    }

    #[test]
    fn all_positive_preferences_become_uniform() {
        let tourist = Tourist::new(0, &[0.5, 0.1]);
        assert_eq!(tourist.preferences, &[-0.5, -0.5]);
    }

    #[test]
    fn degraded_states_score_lower() {
        let tourist = Tourist::new(0, &[-1.0, -3.0]);
        let clean = Destination::new(0, vec![vec![0.0, 0.0]], 1.0);
        let degraded = Destination::new(1, vec![vec![0.2, 0.8]], 1.0);

        assert_eq!(tourist.score(&clean, 0), 0.0);
        assert!((tourist.score(&degraded, 0) + 0.65).abs() < 1e-12);
        assert_eq!(tourist.current_destination(), None);
    }
}
