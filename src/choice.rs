use crate::model::{Destination, Tourist};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::{Bernoulli, weighted::WeightedIndex};

/// Upper limit on availability resampling rounds for a single choice.
///
/// Only reachable when every availability is (almost) zero, which parameter
/// validation rules out.
pub const MAX_AVAILABILITY_DRAWS: usize = 100_000;

/// Availability distributions of a set of destinations, built once per replicate.
pub struct AvailabilitySampler {
    dist_vec: Vec<Bernoulli>,
}

impl AvailabilitySampler {
    pub fn new(destinations: &[Destination]) -> Result<Self> {
        let mut dist_vec = Vec::with_capacity(destinations.len());
        for dst in destinations {
            dist_vec.push(Bernoulli::new(dst.availability())?);
        }
        Ok(Self { dist_vec })
    }

    /// Sample which destinations are open, retrying until at least one is.
    pub fn sample_open<R: Rng + ?Sized>(&self, rng: &mut R, open: &mut Vec<usize>) -> Result<()> {
        for _ in 0..MAX_AVAILABILITY_DRAWS {
            open.clear();
            for (i_dst, dist) in self.dist_vec.iter().enumerate() {
                if dist.sample(rng) {
                    open.push(i_dst);
                }
            }
            if !open.is_empty() {
                return Ok(());
            }
        }
        bail!("no destination was available after {MAX_AVAILABILITY_DRAWS} draws");
    }
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<_> = scores.iter().map(|&score| (score - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|val| val / sum).collect()
}

/// Choose a destination for a tourist at the given step.
///
/// Samples the open destinations, scores each one with the tourist's
/// preferences and draws one from the softmax of the scores.
pub fn choose_destination<R: Rng + ?Sized>(
    tourist: &Tourist,
    destinations: &[Destination],
    sampler: &AvailabilitySampler,
    step: usize,
    rng: &mut R,
    open: &mut Vec<usize>,
) -> Result<usize> {
    sampler.sample_open(rng, open)?;

    let scores: Vec<_> = open
        .iter()
        .map(|&i_dst| tourist.score(&destinations[i_dst], step))
        .collect();
    let probs = softmax(&scores);

    let dist = WeightedIndex::new(&probs)?;
    Ok(destinations[open[dist.sample(rng)]].id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn softmax_is_stable_and_normalized() {
        let probs = softmax(&[1000.0, 1000.0, 999.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((probs[0] - probs[1]).abs() < 1e-12);
        assert!(probs[2] < probs[0]);
    }

    #[test]
    fn closed_destinations_are_never_chosen() {
        let destinations = vec![
            Destination::new(0, vec![vec![0.0]], 0.0),
            Destination::new(1, vec![vec![1.0]], 1.0),
        ];
        let sampler = AvailabilitySampler::new(&destinations).unwrap();
        let tourist = Tourist::new(0, &[-1.0]);

        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut open = Vec::new();
        for _ in 0..100 {
            let choice =
                choose_destination(&tourist, &destinations, &sampler, 0, &mut rng, &mut open)
                    .unwrap();
            assert_eq!(choice, 1);
        }
    }

    #[test]
    fn all_closed_destinations_fail() {
        let destinations = vec![Destination::new(0, vec![vec![0.0]], 0.0)];
        let sampler = AvailabilitySampler::new(&destinations).unwrap();

        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut open = Vec::new();
        assert!(sampler.sample_open(&mut rng, &mut open).is_err());
    }

    #[test]
    fn clean_destination_is_preferred() {
        let destinations = vec![
            Destination::new(0, vec![vec![0.0]], 1.0),
            Destination::new(1, vec![vec![1.0]], 1.0),
        ];
        let sampler = AvailabilitySampler::new(&destinations).unwrap();
        let tourist = Tourist::new(0, &[-1.0]);

        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut open = Vec::new();
        let n_draws = 20_000;
        let mut n_clean = 0;
        for _ in 0..n_draws {
            let choice =
                choose_destination(&tourist, &destinations, &sampler, 0, &mut rng, &mut open)
                    .unwrap();
            if choice == 0 {
                n_clean += 1;
            }
        }

        // softmax([0, -1])[0] = 1 / (1 + e^-1)
        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        let observed = n_clean as f64 / n_draws as f64;
        assert!((observed - expected).abs() < 0.02);
    }
}
