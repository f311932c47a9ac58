use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::config::{ANALYSIS, PRINT_NORMALIZATION};
use crate::domain::{ConditionValues, NormalizedRetentionTimeTable, RetentionTimeTable, enumerate_pairs};
use crate::models::Pair;
use crate::utils::maths_utils::{get_min_max, normalize_min_max};

/// How raw retention times are mapped onto [0, 1].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize, strum_macros::EnumIter)]
pub enum NormalizationMethod {
    /// (t - min) / (max - min)
    MinMax,
    /// (t - t0) / (max - t0)
    VoidMax,
    /// (t - t0) / (t_end - t0)
    Wosel,
}

impl NormalizationMethod {
    pub fn key(self) -> &'static str {
        match self {
            NormalizationMethod::MinMax => "min_max",
            NormalizationMethod::VoidMax => "void_max",
            NormalizationMethod::Wosel => "wosel",
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for NormalizationMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        NormalizationMethod::iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| anyhow!("Unknown normalization method '{s}' (expected min_max, void_max or wosel)"))
    }
}

/// What to do with peaks that are missing in some conditions.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum NanPolicy {
    /// Remove peaks missing in strictly more than `threshold_pct` percent of the conditions.
    DropSparsePeaks { threshold_pct: f64 },
    /// Keep every peak; incomplete points are still dropped pair by pair.
    KeepAll,
}

impl Default for NanPolicy {
    fn default() -> Self {
        NanPolicy::DropSparsePeaks {
            threshold_pct: ANALYSIS.nan_policy.default_threshold_pct,
        }
    }
}

/// Outcome of a normalisation pass.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NormalizationReport {
    pub method: NormalizationMethod,
    /// Conditions blanked because their t0 or t_end was not supplied.
    pub blanked_conditions: Vec<String>,
    /// Entries blanked because they normalised below zero.
    pub negative_values: usize,
}

impl NormalizationReport {
    pub fn is_ok(&self) -> bool {
        self.blanked_conditions.is_empty()
    }
}

/// Normalise every condition of `raw` with `method`.
///
/// A condition whose t0 (or t_end for Wosel) is not in the lookup tables is
/// blanked and recorded in the report; the others are still normalised.
pub fn normalize_table(
    raw: &RetentionTimeTable,
    method: NormalizationMethod,
    void_times: Option<&ConditionValues>,
    gradient_end_times: Option<&ConditionValues>,
) -> (NormalizedRetentionTimeTable, NormalizationReport) {
    let mut report = NormalizationReport {
        method,
        blanked_conditions: Vec::new(),
        negative_values: 0,
    };

    let lookup = |table: Option<&ConditionValues>, name: &str| table.and_then(|t| t.get(name));

    let columns = raw
        .conditions
        .iter()
        .zip(raw.columns.iter())
        .map(|(name, column)| {
            let present: Vec<f64> = column.iter().flatten().copied().collect();
            let bounds = match method {
                NormalizationMethod::MinMax => get_min_max(&present),
                NormalizationMethod::VoidMax => lookup(void_times, name)
                    .map(|t0| (t0, get_min_max(&present).map_or(t0, |(_, max)| max))),
                NormalizationMethod::Wosel => {
                    lookup(void_times, name).zip(lookup(gradient_end_times, name))
                }
            };

            match bounds {
                Some((lower, upper)) => {
                    if PRINT_NORMALIZATION {
                        log::info!("[{method}] {name}: lower {lower:.4}, upper {upper:.4}");
                    }
                    scale_column(column, lower, upper, &mut report.negative_values)
                }
                None if present.is_empty() => vec![None; column.len()],
                None => {
                    log::warn!("Cannot normalize '{name}' with {method}: reference time not found");
                    report.blanked_conditions.push(name.clone());
                    vec![None; column.len()]
                }
            }
        })
        .collect();

    let table = NormalizedRetentionTimeTable {
        peak_ids: raw.peak_ids.clone(),
        conditions: raw.conditions.clone(),
        columns,
    };
    (table, report)
}

/// Values before `lower` are blanked and counted. Values past `upper` are kept:
/// every pair is min-max rescaled afterwards.
fn scale_column(column: &[Option<f64>], lower: f64, upper: f64, negatives: &mut usize) -> Vec<Option<f64>> {
    let span = upper - lower;
    column
        .iter()
        .map(|value| {
            let v = (*value)?;
            let scaled = if span == 0.0 { 0.0 } else { (v - lower) / span };
            if scaled < 0.0 {
                *negatives += 1;
                None
            } else {
                Some(scaled)
            }
        })
        .collect()
}

/// Apply `policy` to the raw table. Returns the cleaned table and the number of peaks removed.
pub fn apply_nan_policy(raw: &RetentionTimeTable, policy: NanPolicy) -> (RetentionTimeTable, usize) {
    match policy {
        NanPolicy::DropSparsePeaks { threshold_pct } => raw.without_sparse_peaks(threshold_pct),
        NanPolicy::KeepAll => (raw.clone(), 0),
    }
}

/// Paired series of two columns: incomplete points dropped, each axis min-max rescaled.
///
/// `None` when no complete point remains.
pub fn pair_series(x: &[Option<f64>], y: &[Option<f64>]) -> Option<(Vec<f64>, Vec<f64>)> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip();

    if xs.is_empty() {
        return None;
    }
    Some((normalize_min_max(&xs), normalize_min_max(&ys)))
}

/// Build the pair store entries of a table. Pairs without a single complete point are skipped.
pub fn build_pairs(conditions: &[String], columns: &[Vec<Option<f64>>]) -> Result<Vec<Pair>> {
    let mut pairs = Vec::new();
    for condition_pair in enumerate_pairs(conditions)? {
        match pair_series(&columns[condition_pair.x_index], &columns[condition_pair.y_index]) {
            Some((x, y)) => pairs.push(Pair::new(&condition_pair, x, y)),
            None => log::warn!(
                "Set {} ({}) has no complete retention time pair and is removed",
                condition_pair.set_number,
                condition_pair.title()
            ),
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn raw() -> RetentionTimeTable {
        RetentionTimeTable::from_rows(
            vec!["A".into(), "B".into()],
            vec![
                ("p1".into(), vec![Some(2.0), Some(10.0)]),
                ("p2".into(), vec![Some(4.0), None]),
                ("p3".into(), vec![Some(6.0), Some(20.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn min_max_uses_present_values_only() {
        let (table, report) = normalize_table(&raw(), NormalizationMethod::MinMax, None, None);
        assert!(report.is_ok());
        assert_eq!(table.column("A").unwrap(), &[Some(0.0), Some(0.5), Some(1.0)]);
        assert_eq!(table.column("B").unwrap(), &[Some(0.0), None, Some(1.0)]);
    }

    #[test]
    fn void_max_blanks_values_before_void_time() {
        let t0: ConditionValues = [("A", 3.0), ("B", 10.0)].into_iter().collect();
        let (table, report) = normalize_table(&raw(), NormalizationMethod::VoidMax, Some(&t0), None);
        let a = table.column("A").unwrap();
        assert_eq!(a[0], None);
        assert!(approx_eq(a[1].unwrap(), 1.0 / 3.0));
        assert_eq!(report.negative_values, 1);
    }

    #[test]
    fn missing_reference_blanks_only_that_column() {
        let t0: ConditionValues = [("A", 0.0), ("B", 0.0)].into_iter().collect();
        let t_end: ConditionValues = [("A", 8.0)].into_iter().collect();
        let (table, report) = normalize_table(&raw(), NormalizationMethod::Wosel, Some(&t0), Some(&t_end));
        assert_eq!(report.blanked_conditions, vec!["B".to_string()]);
        assert!(!report.is_ok());
        assert_eq!(table.column("A").unwrap(), &[Some(0.25), Some(0.5), Some(0.75)]);
        assert!(table.column("B").unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn wosel_keeps_peaks_eluting_after_gradient_end() {
        let t0: ConditionValues = [("A", 0.0), ("B", 0.0)].into_iter().collect();
        let t_end: ConditionValues = [("A", 4.0), ("B", 20.0)].into_iter().collect();
        let (table, report) = normalize_table(&raw(), NormalizationMethod::Wosel, Some(&t0), Some(&t_end));
        assert!(report.is_ok());
        assert_eq!(report.negative_values, 0);
        assert_eq!(table.column("A").unwrap(), &[Some(0.5), Some(1.0), Some(1.5)]);

        let (xs, _) = pair_series(table.column("A").unwrap(), table.column("B").unwrap()).unwrap();
        assert_eq!(xs, vec![0.0, 1.0]);
    }

    #[test]
    fn pair_series_drops_incomplete_points_and_rescales() {
        let x = [Some(0.2), Some(0.4), None, Some(0.6)];
        let y = [Some(0.1), None, Some(0.3), Some(0.9)];
        let (xs, ys) = pair_series(&x, &y).unwrap();
        assert_eq!(xs, vec![0.0, 1.0]);
        assert_eq!(ys, vec![0.0, 1.0]);
        assert!(pair_series(&[None], &[Some(1.0)]).is_none());
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("void_max".parse::<NormalizationMethod>().unwrap(), NormalizationMethod::VoidMax);
        assert!("zscore".parse::<NormalizationMethod>().is_err());
    }
}
