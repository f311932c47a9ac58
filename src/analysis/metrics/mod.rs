//! Per-pair orthogonality metric computers.
//!
//! Every computer is a pure function over the pair store. It reads the paired
//! series (and, for composites, previously scored values) and returns one
//! `PairDelta` per pair. Nothing here mutates the store: the engine merges the
//! deltas once a computer has finished.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use crate::models::{MetricKey, MetricKind, Pair, PairDelta, ScoreRecord};

pub mod asterisk;
pub mod composites;
pub mod correlation;
pub mod entropy;
pub mod geometric;
pub mod grid;
pub mod hull;
pub mod nnd;
pub mod percent_bin;
pub mod percent_fit;

/// Read-only inputs shared by every computer.
pub struct MetricContext<'a> {
    /// Bins per axis of the configurable occupancy grid.
    pub bin_number: usize,
    /// Scored values per set number, used by composite metrics.
    pub scores: &'a BTreeMap<usize, ScoreRecord>,
}

impl MetricContext<'_> {
    /// Previously computed value of `key` for `set_number`.
    pub fn score(&self, set_number: usize, key: MetricKey) -> Result<f64> {
        self.scores
            .get(&set_number)
            .and_then(|record| record.get(key))
            .ok_or_else(|| anyhow!("Set {set_number}: '{key}' has not been computed"))
    }
}

pub type MetricComputer = fn(&BTreeMap<usize, Pair>, &MetricContext) -> Result<Vec<PairDelta>>;

/// Static mapping from a metric kind to the function computing it.
pub fn computer_for(kind: MetricKind) -> MetricComputer {
    match kind {
        MetricKind::ConvexHull => hull::convex_hull,
        MetricKind::BinBox => grid::bin_box,
        MetricKind::GilarWatson => grid::gilar_watson,
        MetricKind::ModelingApproach => grid::modeling_approach,
        MetricKind::Pearson => correlation::pearson,
        MetricKind::Spearman => correlation::spearman,
        MetricKind::Kendall => correlation::kendall,
        MetricKind::CcMean => composites::cc_mean,
        MetricKind::Asterisk => asterisk::asterisk,
        MetricKind::NndArithmeticMean | MetricKind::NndGeometricMean | MetricKind::NndHarmonicMean => {
            nnd::nnd_means
        }
        MetricKind::NndMean => composites::nnd_mean,
        MetricKind::PercentBin => percent_bin::percent_bin,
        MetricKind::PercentFit => percent_fit::percent_fit,
        MetricKind::ConditionalEntropy => entropy::conditional_entropy,
        MetricKind::GeometricApproach => geometric::geometric_approach,
        MetricKind::AsteriskConvexHullMean => composites::asterisk_convex_hull_mean,
        MetricKind::MeanBinBoxPercentBin => composites::mean_bin_box_percent_bin,
        MetricKind::MeanBinBoxPercentBinNndMean => composites::mean_bin_box_percent_bin_nnd_mean,
    }
}

/// Run `f` over every pair in set order.
pub(crate) fn for_each_pair<F>(pairs: &BTreeMap<usize, Pair>, f: F) -> Result<Vec<PairDelta>>
where
    F: Fn(&Pair) -> Result<PairDelta>,
{
    pairs.values().map(f).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use crate::domain::ConditionPair;
    use crate::models::{Pair, PairDelta, MetricKey};

    pub fn pair_from(x: &[f64], y: &[f64]) -> Pair {
        let condition_pair = ConditionPair {
            set_number: 1,
            x_index: 0,
            y_index: 1,
            x_title: "A".into(),
            y_title: "B".into(),
        };
        Pair::new(&condition_pair, x.to_vec(), y.to_vec())
    }

    pub fn store(pairs: Vec<Pair>) -> BTreeMap<usize, Pair> {
        pairs.into_iter().map(|p| (p.set_number, p)).collect()
    }

    pub fn value_of(delta: &PairDelta, key: MetricKey) -> f64 {
        delta
            .values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap()
    }

    pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }
}
