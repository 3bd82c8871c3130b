use crate::config::CalibrationConfig;
use crate::genome::Genome;
use crate::params::{ParamAddr, ParameterSet};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Mapping between genome positions and model parameters.
///
/// Gene `i` addresses `addrs[i]`; its integer range `int_ranges[i]` is mapped
/// affinely onto the real range `real_ranges[i]`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ChromosomeMap {
    addrs: Vec<ParamAddr>,
    real_ranges: Vec<(f64, f64)>,
    int_ranges: Vec<(i64, i64)>,
    scales: Vec<f64>,
}

impl ChromosomeMap {
    pub fn new(
        addrs: Vec<ParamAddr>,
        real_ranges: Vec<(f64, f64)>,
        int_ranges: Vec<(i64, i64)>,
    ) -> Result<Self> {
        let n_genes = addrs.len();
        if n_genes == 0 {
            bail!("chromosome map must have at least one gene");
        }
        if real_ranges.len() != n_genes || int_ranges.len() != n_genes {
            bail!(
                "chromosome map has {n_genes} addresses, {} real ranges and {} integer ranges",
                real_ranges.len(),
                int_ranges.len()
            );
        }
        for (idx, (&(lo_r, hi_r), &(lo_i, hi_i))) in real_ranges.iter().zip(&int_ranges).enumerate()
        {
            if !lo_r.is_finite() || !hi_r.is_finite() {
                bail!("real range of gene {idx} is not finite");
            }
            if hi_i <= lo_i {
                bail!("integer range of gene {idx} is empty: [{lo_i}, {hi_i}]");
            }
        }

        let scales = real_ranges
            .iter()
            .zip(&int_ranges)
            .map(|(&(lo_r, hi_r), &(lo_i, hi_i))| (hi_r - lo_r) / (hi_i - lo_i) as f64)
            .collect();

        Ok(Self {
            addrs,
            real_ranges,
            int_ranges,
            scales,
        })
    }

    /// Build the map calibrating destination states and/or mean preferences.
    ///
    /// Factors are visited in increasing order of mean preference. State genes
    /// come first (one per calibrated destination and factor, real range
    /// `±variation_range`), then preference genes (real range
    /// `[(1 - vr) p, (1 + vr) p]`).
    pub fn from_config(params: &ParameterSet, cfg: &CalibrationConfig) -> Result<Self> {
        let mut factor_order: Vec<_> = (0..params.num_factors()).collect();
        factor_order.sort_by(|&a, &b| {
            params.mean_preferences[a].total_cmp(&params.mean_preferences[b])
        });

        let vr = cfg.variation_range;
        let mut addrs = Vec::new();
        let mut real_ranges = Vec::new();

        if cfg.calibrate_states {
            for &destination in &cfg.destinations {
                if destination >= params.num_destinations {
                    bail!("cannot calibrate unknown destination {destination}");
                }
                for &factor in &factor_order {
                    addrs.push(ParamAddr::State {
                        destination,
                        factor,
                    });
                    real_ranges.push((-vr, vr));
                }
            }
        }

        if cfg.calibrate_preferences {
            for &factor in &factor_order {
                let pref = params.mean_preferences[factor];
                addrs.push(ParamAddr::Preference { factor });
                real_ranges.push(((1.0 - vr) * pref, (1.0 + vr) * pref));
            }
        }

        let int_ranges = vec![(0, cfg.int_upper); addrs.len()];
        Self::new(addrs, real_ranges, int_ranges)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn addrs(&self) -> &[ParamAddr] {
        &self.addrs
    }

    /// Create an unevaluated genome over this map's integer ranges.
    pub fn genome(&self, genes: Vec<i64>) -> Result<Genome> {
        Genome::new(genes, self.int_ranges.clone())
    }

    /// Quantize real values into integer genes.
    pub fn encode(&self, reals: &[f64]) -> Result<Vec<i64>> {
        if reals.len() != self.len() {
            bail!("expected {} real values, got {}", self.len(), reals.len());
        }
        let mut genes = Vec::with_capacity(self.len());
        for (idx, &real) in reals.iter().enumerate() {
            if !real.is_finite() {
                bail!("value of gene {idx} is not finite: {real}");
            }
            let (lo_r, _) = self.real_ranges[idx];
            let (lo_i, hi_i) = self.int_ranges[idx];
            let scale = self.scales[idx];
            let gene = if scale == 0.0 {
                lo_i
            } else {
                lo_i + ((real - lo_r) / scale).round() as i64
            };
            if gene < lo_i || gene > hi_i {
                bail!("value {real} of gene {idx} is outside of its real range");
            }
            genes.push(gene);
        }
        Ok(genes)
    }

    /// Map integer genes back to real values.
    pub fn to_reals(&self, genes: &[i64]) -> Vec<f64> {
        genes
            .iter()
            .enumerate()
            .map(|(idx, &gene)| {
                let (lo_r, _) = self.real_ranges[idx];
                let (lo_i, _) = self.int_ranges[idx];
                lo_r + (gene - lo_i) as f64 * self.scales[idx]
            })
            .collect()
    }

    /// Apply a genome onto a copy of `base`.
    pub fn decode(&self, base: &ParameterSet, genome: &Genome) -> Result<ParameterSet> {
        if genome.len() != self.len() {
            bail!("expected {} genes, got {}", self.len(), genome.len());
        }
        genome.check_bounds().context("genome is out of bounds")?;
        let reals = self.to_reals(genome.genes());
        base.with_patch(&self.addrs, &reals)
    }
}
