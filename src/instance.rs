use crate::params::ParameterSet;
use crate::utils::check_vec;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Model instance: named destinations and climate factors plus the model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub climate_factors: Vec<String>,
    pub destinations: Vec<String>,
    #[serde(rename = "abm_parameters")]
    pub params: ParameterSet,
}

impl Instance {
    /// Load an [`Instance`] from a JSON file and validate it.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);

        let instance: Instance =
            serde_json::from_reader(reader).context("failed to deserialize instance")?;

        instance.validate().context("failed to validate instance")?;

        Ok(instance)
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).context("failed to serialize instance")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate().context("invalid model parameters")?;

        let n_dst = self.destinations.len();
        if n_dst != self.params.num_destinations {
            bail!(
                "instance names {n_dst} destinations, but parameters have {}",
                self.params.num_destinations
            );
        }
        let n_fac = self.climate_factors.len();
        if n_fac != self.params.num_factors() {
            bail!(
                "instance names {n_fac} climate factors, but parameters have {}",
                self.params.num_factors()
            );
        }

        Ok(())
    }
}

/// Historical arrival shares, the calibration target.
#[derive(Debug, PartialEq, Clone)]
pub struct History {
    /// Simulation step of every observation, in increasing order.
    pub steps: Vec<usize>,
    /// Share series of every destination (`n_dst x steps.len()`).
    pub shares: Vec<Vec<f64>>,
}

impl History {
    /// Load a [`History`] from a CSV file.
    ///
    /// The file must have a `Year` column and one `Share ...` column per
    /// destination, in destination order. Years are mapped to steps by
    /// subtracting `base_year`.
    pub fn from_file<P: AsRef<Path>>(file: P, base_year: i64) -> Result<Self> {
        let file = file.as_ref();
        let reader = csv::Reader::from_path(file).with_context(|| format!("failed to open {file:?}"))?;
        Self::from_reader(reader, base_year)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>, base_year: i64) -> Result<Self> {
        let headers = reader.headers().context("failed to read header")?.clone();
        let i_year = headers
            .iter()
            .position(|name| name.trim() == "Year")
            .context("missing Year column")?;
        let i_shares: Vec<_> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| name.trim().starts_with("Share"))
            .map(|(idx, _)| idx)
            .collect();
        if i_shares.is_empty() {
            bail!("history has no Share columns");
        }

        let mut rows = Vec::new();
        for (i_row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("failed to read row {i_row}"))?;
            let year: i64 = record[i_year]
                .trim()
                .parse()
                .with_context(|| format!("invalid year in row {i_row}"))?;
            let step = year - base_year;
            if step < 0 {
                bail!("year {year} precedes base year {base_year}");
            }
            let mut shares = Vec::with_capacity(i_shares.len());
            for &idx in &i_shares {
                let share: f64 = record[idx]
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid share in row {i_row}"))?;
                shares.push(share);
            }
            rows.push((step as usize, shares));
        }

        rows.sort_by_key(|(step, _)| *step);
        if rows.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            bail!("history has duplicated years");
        }

        let steps = rows.iter().map(|(step, _)| *step).collect();
        let shares = (0..i_shares.len())
            .map(|i_dst| rows.iter().map(|(_, shares)| shares[i_dst]).collect())
            .collect();

        let history = Self { steps, shares };
        history.check_shares()?;
        Ok(history)
    }

    fn check_shares(&self) -> Result<()> {
        for (i_dst, series) in self.shares.iter().enumerate() {
            check_vec(series, self.steps.len(), true)
                .with_context(|| format!("invalid shares of destination {i_dst}"))?;
        }
        Ok(())
    }

    pub fn num_destinations(&self) -> usize {
        self.shares.len()
    }

    /// Check that the history matches a parameter set.
    pub fn validate(&self, params: &ParameterSet) -> Result<()> {
        if self.num_destinations() != params.num_destinations {
            bail!(
                "history has {} destinations, but parameters have {}",
                self.num_destinations(),
                params.num_destinations
            );
        }
        if let Some(&last) = self.steps.last() {
            if last >= params.num_steps {
                bail!(
                    "history reaches step {last}, but only {} steps are simulated",
                    params.num_steps
                );
            }
        } else {
            bail!("history is empty");
        }
        self.check_shares()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests::uniform_params;

    fn history(contents: &str) -> Result<History> {
        History::from_reader(csv::Reader::from_reader(contents.as_bytes()), 2000)
    }

    #[test]
    fn history_is_sorted_and_transposed() {
        let history =
            history("Year,Share A,Share B,Other\n2002,0.4,0.6,9\n2001,0.3,0.7,9\n").unwrap();

        assert_eq!(history.steps, vec![1, 2]);
        assert_eq!(history.shares, vec![vec![0.3, 0.4], vec![0.7, 0.6]]);
    }

    #[test]
    fn history_rejects_early_years_and_duplicates() {
        assert!(history("Year,Share A\n1999,1.0\n").is_err());
        assert!(history("Year,Share A\n2001,1.0\n2001,1.0\n").is_err());
        assert!(history("Year,Arrivals A\n2001,10\n").is_err());
    }

    #[test]
    fn history_validation_checks_counts() {
        let history = history("Year,Share A,Share B\n2001,0.3,0.7\n").unwrap();
        assert!(history.validate(&uniform_params(2, 3, 10, 0.0)).is_ok());
        assert!(history.validate(&uniform_params(3, 3, 10, 0.0)).is_err());
        assert!(history.validate(&uniform_params(2, 1, 10, 0.0)).is_err());
    }

    #[test]
    fn history_rejects_shares_outside_unit_interval() {
        assert!(history("Year,Share A,Share B\n2001,1.5,-0.5\n").is_err());
        assert!(history("Year,Share A,Share B\n2001,NaN,0.5\n").is_err());

        let history = History {
            steps: vec![1],
            shares: vec![vec![0.4], vec![1.2]],
        };
        assert!(history.validate(&uniform_params(2, 3, 10, 0.0)).is_err());
    }

    #[test]
    fn instance_checks_names() {
        let instance = Instance {
            climate_factors: vec!["heat".into(), "fires".into()],
            destinations: vec!["north".into()],
            params: uniform_params(2, 3, 10, 0.0),
        };
        assert!(instance.validate().is_err());
    }
}
