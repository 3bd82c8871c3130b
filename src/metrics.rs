//! Discrepancy metrics between historical and simulated share series.
//!
//! All metrics propagate NaN: an undefined simulated share or a zero
//! historical value under MAPE yields a NaN (or infinite) score.

use serde::{Deserialize, Serialize};

/// Fitness metric minimized by calibration.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean absolute percentage error.
    #[default]
    Mape,
    /// Mean absolute error.
    Mae,
    /// Root mean squared error.
    Rmse,
}

impl Metric {
    pub fn compute(self, actual: &[f64], predicted: &[f64]) -> f64 {
        match self {
            Metric::Mape => mape(actual, predicted),
            Metric::Mae => mae(actual, predicted),
            Metric::Rmse => rmse(actual, predicted),
        }
    }
}

fn mean<I: Iterator<Item = f64>>(vals: I) -> f64 {
    let (sum, n_vals) = vals.fold((0.0, 0usize), |(sum, n), val| (sum + val, n + 1));
    if n_vals == 0 {
        return f64::NAN;
    }
    sum / n_vals as f64
}

pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| ((a - p) / a).abs() * 100.0),
    )
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()))
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2))).sqrt()
}

/// Coefficient of determination, reported alongside the fitness.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let actual_mean = mean(actual.iter().copied());
    let res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let tot: f64 = actual.iter().map(|a| (a - actual_mean).powi(2)).sum();
    1.0 - res / tot
}
