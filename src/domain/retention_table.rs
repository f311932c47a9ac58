use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Raw retention times: one row per peak, one column per separation condition.
///
/// The peak identifier is kept apart from the condition columns so that every
/// column in `columns` is a retention-time series.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RetentionTimeTable {
    pub peak_ids: Vec<String>,
    pub conditions: Vec<String>,
    /// `columns[c][p]` is the retention time of peak `p` under condition `c`.
    pub columns: Vec<Vec<Option<f64>>>,
}

impl RetentionTimeTable {
    pub fn new(
        peak_ids: Vec<String>,
        conditions: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        let table = Self {
            peak_ids,
            conditions,
            columns,
        };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from rows of `(peak id, retention time per condition)`.
    pub fn from_rows(conditions: Vec<String>, rows: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let mut columns = vec![Vec::with_capacity(rows.len()); conditions.len()];
        let mut peak_ids = Vec::with_capacity(rows.len());
        for (row_no, (peak_id, values)) in rows.into_iter().enumerate() {
            if values.len() != conditions.len() {
                bail!(
                    "Row {row_no} ({peak_id}) has {} values but there are {} conditions",
                    values.len(),
                    conditions.len()
                );
            }
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
            peak_ids.push(peak_id);
        }
        Self::new(peak_ids, conditions, columns)
    }

    /// Reject ragged tables, duplicated condition names and non-finite values.
    pub fn validate(&self) -> Result<()> {
        if self.columns.len() != self.conditions.len() {
            bail!(
                "{} condition names but {} retention time columns",
                self.conditions.len(),
                self.columns.len()
            );
        }
        for (name, column) in self.conditions.iter().zip(self.columns.iter()) {
            if column.len() != self.peak_ids.len() {
                bail!(
                    "Condition '{name}' has {} values but there are {} peaks",
                    column.len(),
                    self.peak_ids.len()
                );
            }
            if column.iter().flatten().any(|v| !v.is_finite()) {
                bail!("Condition '{name}' contains a non-finite retention time");
            }
        }
        for (i, name) in self.conditions.iter().enumerate() {
            if self.conditions[..i].contains(name) {
                bail!("Duplicate condition name '{name}'");
            }
        }
        Ok(())
    }

    pub fn nb_peaks(&self) -> usize {
        self.peak_ids.len()
    }

    pub fn nb_conditions(&self) -> usize {
        self.conditions.len()
    }

    pub fn column(&self, condition: &str) -> Option<&[Option<f64>]> {
        self.conditions
            .iter()
            .position(|c| c == condition)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn has_missing_values(&self) -> bool {
        self.columns.iter().any(|column| column.iter().any(Option::is_none))
    }

    /// Percentage (0-100) of conditions in which peak `row` is missing.
    pub fn missing_pct(&self, row: usize) -> f64 {
        if self.conditions.is_empty() {
            return 0.0;
        }
        let missing = self.columns.iter().filter(|column| column[row].is_none()).count();
        (missing as f64 * 100.0) / self.conditions.len() as f64
    }

    /// Copy of the table without the peaks whose missing percentage is strictly
    /// above `threshold_pct`. Returns the table and the number of peaks dropped.
    pub fn without_sparse_peaks(&self, threshold_pct: f64) -> (Self, usize) {
        let keep: Vec<usize> = (0..self.nb_peaks())
            .filter(|&row| self.missing_pct(row) <= threshold_pct)
            .collect();
        let dropped = self.nb_peaks() - keep.len();

        let table = Self {
            peak_ids: keep.iter().map(|&row| self.peak_ids[row].clone()).collect(),
            conditions: self.conditions.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| keep.iter().map(|&row| column[row]).collect())
                .collect(),
        };
        (table, dropped)
    }
}

/// Retention times rescaled to [0, 1]; `None` marks an invalid or missing entry.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NormalizedRetentionTimeTable {
    pub peak_ids: Vec<String>,
    pub conditions: Vec<String>,
    pub columns: Vec<Vec<Option<f64>>>,
}

impl NormalizedRetentionTimeTable {
    pub fn column(&self, condition: &str) -> Option<&[Option<f64>]> {
        self.conditions
            .iter()
            .position(|c| c == condition)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn nb_peaks(&self) -> usize {
        self.peak_ids.len()
    }
}

/// One scalar per condition: void time, gradient end time or 1D peak capacity.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ConditionValues(pub BTreeMap<String, f64>);

impl ConditionValues {
    pub fn get(&self, condition: &str) -> Option<f64> {
        self.0.get(condition).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ConditionValues {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
