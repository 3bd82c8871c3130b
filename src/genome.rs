use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Bounded-integer encoding of a calibration candidate.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Genome {
    genes: Vec<i64>,
    bounds: Vec<(i64, i64)>,
    /// Fitness of the genome, once evaluated. Lower is better.
    pub fitness: Option<f64>,
}

impl Genome {
    /// Create an unevaluated genome, checking every gene against its inclusive bounds.
    pub fn new(genes: Vec<i64>, bounds: Vec<(i64, i64)>) -> Result<Self> {
        if genes.len() != bounds.len() {
            bail!(
                "genome has {} genes but {} bounds",
                genes.len(),
                bounds.len()
            );
        }
        if genes.is_empty() {
            bail!("genome must have at least one gene");
        }
        if let Some((idx, (lower, upper))) = bounds
            .iter()
            .enumerate()
            .find(|(_, (lower, upper))| lower > upper)
        {
            bail!("bounds of gene {idx} are empty: [{lower}, {upper}]");
        }
        let genome = Self {
            genes,
            bounds,
            fitness: None,
        };
        genome.check_bounds()?;
        Ok(genome)
    }

    pub fn genes(&self) -> &[i64] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn check_bounds(&self) -> Result<()> {
        for (idx, (&gene, &(lower, upper))) in self.genes.iter().zip(&self.bounds).enumerate() {
            if gene < lower || gene > upper {
                bail!("gene {idx} is {gene}, outside of [{lower}, {upper}]");
            }
        }
        Ok(())
    }

    /// Copy with one gene shifted by `delta`, or `None` if that leaves its bounds.
    pub fn shifted(&self, idx: usize, delta: i64) -> Option<Self> {
        let (lower, upper) = self.bounds[idx];
        let gene = self.genes[idx] + delta;
        if gene < lower || gene > upper {
            return None;
        }
        let mut genes = self.genes.clone();
        genes[idx] = gene;
        Some(Self {
            genes,
            bounds: self.bounds.clone(),
            fitness: None,
        })
    }

    /// Strictly lower fitness than `other`. Unevaluated and NaN fitnesses never win.
    pub fn is_better_than(&self, other: &Genome) -> bool {
        match (self.fitness, other.fitness) {
            (Some(own), Some(other)) => own < other || (!own.is_nan() && other.is_nan()),
            (Some(own), None) => !own.is_nan(),
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_out_of_bounds_genes() {
        assert!(Genome::new(vec![0, 11], vec![(0, 10), (0, 10)]).is_err());
        assert!(Genome::new(vec![0], vec![(0, 10), (0, 10)]).is_err());
        assert!(Genome::new(vec![5], vec![(6, 4)]).is_err());
        assert!(Genome::new(vec![10, 0], vec![(0, 10), (0, 10)]).is_ok());
    }

    #[test]
    fn shifted_respects_bounds() {
        let genome = Genome::new(vec![0, 10], vec![(0, 10), (0, 10)]).unwrap();
        assert!(genome.shifted(0, -1).is_none());
        assert!(genome.shifted(1, 1).is_none());
        assert_eq!(genome.shifted(0, 1).unwrap().genes(), &[1, 10]);
    }

    #[test]
    fn comparison_is_strict() {
        let mut a = Genome::new(vec![0], vec![(0, 1)]).unwrap();
        let mut b = a.clone();
        a.fitness = Some(1.0);
        b.fitness = Some(1.0);
        assert!(!a.is_better_than(&b));

        b.fitness = Some(f64::NAN);
        assert!(a.is_better_than(&b));
        assert!(!b.is_better_than(&a));
    }
}
