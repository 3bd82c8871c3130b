use crate::batch::ReplicateResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running mean, sample standard deviation, minimum and maximum.
///
/// NaN values are skipped, so undefined shares do not poison the summary.
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        if val.is_nan() {
            return;
        }

        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn report(&self) -> AccumulatorReport {
        if self.n_vals == 0 {
            return AccumulatorReport {
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            min: self.min,
            max: self.max,
        }
    }
}

/// Arrivals and shares of one replicate at one step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub seed: u64,
    pub step: usize,
    /// Total number of arrivals.
    pub num_tourists: usize,
    pub arrivals: Vec<usize>,
    /// Fraction of arrivals per destination, NaN when there are no arrivals.
    pub shares: Vec<f64>,
    /// Origin-destination counts between the previous step and this one
    /// (row-major `n_dst x n_dst`), only when tracking agents.
    pub flows: Option<Vec<usize>>,
}

impl RawRecord {
    fn values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(1 + 2 * self.arrivals.len());
        values.push(self.num_tourists as f64);
        values.extend(self.arrivals.iter().map(|&val| val as f64));
        values.extend(&self.shares);
        if let Some(flows) = &self.flows {
            values.extend(flows.iter().map(|&val| val as f64));
        }
        values
    }
}

/// Summary statistics of every column for one step, or one aggregate row.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label: String,
    pub stats: Vec<AccumulatorReport>,
}

/// Cross-replicate summary.
///
/// One row per step with statistics across replicates, followed by the
/// `mean`, `std. dev.`, `min` and `max` of those per-step statistics across
/// all steps.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub columns: Vec<String>,
    pub steps: Vec<usize>,
    pub rows: Vec<SummaryRow>,
    pub aggregates: Vec<SummaryRow>,
}

impl Summary {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Statistics of a column at a step.
    pub fn get(&self, name: &str, step: usize) -> Option<AccumulatorReport> {
        let i_col = self.column(name)?;
        let i_row = self.steps.iter().position(|&val| val == step)?;
        Some(self.rows[i_row].stats[i_col])
    }

    pub fn aggregate(&self, label: &str, name: &str) -> Option<AccumulatorReport> {
        let i_col = self.column(name)?;
        let row = self.aggregates.iter().find(|row| row.label == label)?;
        Some(row.stats[i_col])
    }
}

/// Name of the share column of a destination.
pub fn share_column(destination: usize) -> String {
    format!("Share {destination}")
}

/// Raw per-(replicate, step) table and its summary.
pub struct SimulationStatistics {
    pub raw: Vec<RawRecord>,
    pub summary: Summary,
}

impl SimulationStatistics {
    pub fn new(results: &[ReplicateResult], num_destinations: usize) -> Self {
        let raw = compute_raw(results, num_destinations);
        let tracked = raw.iter().any(|record| record.flows.is_some());
        let columns = column_names(num_destinations, tracked);
        let summary = summarize(&raw, columns);
        Self { raw, summary }
    }

    /// Share series of a destination for one replicate at the given steps.
    pub fn share_series(&self, seed: u64, destination: usize, steps: &[usize]) -> Vec<f64> {
        steps
            .iter()
            .map(|&step| {
                self.raw
                    .binary_search_by_key(&(seed, step), |record| (record.seed, record.step))
                    .map_or(f64::NAN, |idx| self.raw[idx].shares[destination])
            })
            .collect()
    }

    pub fn seeds(&self) -> Vec<u64> {
        let mut seeds: Vec<_> = self.raw.iter().map(|record| record.seed).collect();
        seeds.dedup();
        seeds
    }
}

fn column_names(num_destinations: usize, tracked: bool) -> Vec<String> {
    let mut columns = vec!["Num tourists".to_string()];
    columns.extend((0..num_destinations).map(|i_dst| format!("Arrivals {i_dst}")));
    columns.extend((0..num_destinations).map(share_column));
    if tracked {
        for origin in 0..num_destinations {
            for destination in 0..num_destinations {
                columns.push(format!("{origin}to{destination}"));
            }
        }
    }
    columns
}

fn compute_raw(results: &[ReplicateResult], num_destinations: usize) -> Vec<RawRecord> {
    let mut raw = Vec::new();
    for result in results {
        let mut prev_choices: Option<&Vec<usize>> = None;
        for record in &result.records {
            let num_tourists: usize = record.arrivals.iter().sum();
            let shares = record
                .arrivals
                .iter()
                .map(|&val| val as f64 / num_tourists as f64)
                .collect();

            let flows = record.choices.as_ref().map(|choices| {
                let mut flows = vec![0; num_destinations * num_destinations];
                if let Some(prev_choices) = prev_choices {
                    for (&origin, &destination) in prev_choices.iter().zip(choices) {
                        flows[origin * num_destinations + destination] += 1;
                    }
                }
                flows
            });
            prev_choices = record.choices.as_ref();

            raw.push(RawRecord {
                seed: result.seed,
                step: record.step,
                num_tourists,
                arrivals: record.arrivals.clone(),
                shares,
                flows,
            });
        }
    }
    raw.sort_by_key(|record| (record.seed, record.step));
    raw
}

fn summarize(raw: &[RawRecord], columns: Vec<String>) -> Summary {
    let n_cols = columns.len();

    let mut by_step: BTreeMap<usize, Vec<Accumulator>> = BTreeMap::new();
    for record in raw {
        let acc_vec = by_step.entry(record.step).or_insert_with(|| {
            let mut acc_vec = Vec::new();
            acc_vec.resize_with(n_cols, Accumulator::new);
            acc_vec
        });
        for (acc, val) in acc_vec.iter_mut().zip(record.values()) {
            acc.add(val);
        }
    }

    let steps: Vec<_> = by_step.keys().copied().collect();
    let rows: Vec<_> = by_step
        .iter()
        .map(|(step, acc_vec)| SummaryRow {
            label: step.to_string(),
            stats: acc_vec.iter().map(Accumulator::report).collect(),
        })
        .collect();

    let aggregates = aggregate_rows(&rows, n_cols);

    Summary {
        columns,
        steps,
        rows,
        aggregates,
    }
}

fn aggregate_rows(rows: &[SummaryRow], n_cols: usize) -> Vec<SummaryRow> {
    // One accumulator per column and per-step statistic.
    let mut acc_vec: Vec<[Accumulator; 4]> = Vec::new();
    acc_vec.resize_with(n_cols, || std::array::from_fn(|_| Accumulator::new()));
    for row in rows {
        for (accs, stats) in acc_vec.iter_mut().zip(&row.stats) {
            accs[0].add(stats.mean);
            accs[1].add(stats.std_dev);
            accs[2].add(stats.min);
            accs[3].add(stats.max);
        }
    }

    let reports: Vec<[AccumulatorReport; 4]> = acc_vec
        .iter()
        .map(|accs| std::array::from_fn(|idx| accs[idx].report()))
        .collect();

    let pick = |label: &str, select: fn(&AccumulatorReport) -> f64| SummaryRow {
        label: label.to_string(),
        stats: reports
            .iter()
            .map(|reps| AccumulatorReport {
                mean: select(&reps[0]),
                std_dev: select(&reps[1]),
                min: select(&reps[2]),
                max: select(&reps[3]),
            })
            .collect(),
    };

    vec![
        pick("mean", |rep: &AccumulatorReport| rep.mean),
        pick("std. dev.", |rep: &AccumulatorReport| rep.std_dev),
        pick("min", |rep: &AccumulatorReport| rep.min),
        pick("max", |rep: &AccumulatorReport| rep.max),
    ]
}
