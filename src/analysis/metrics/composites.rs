//! Metrics defined as the arithmetic mean of other, already scored metrics.
//! NaN in any component carries through to the mean.

use std::collections::BTreeMap;

use anyhow::Result;

use super::{MetricContext, for_each_pair};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::maths_utils::mean;

fn mean_of(
    pairs: &BTreeMap<usize, Pair>,
    ctx: &MetricContext,
    target: MetricKey,
    components: &[MetricKey],
) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let values = components
            .iter()
            .map(|&key| ctx.score(pair.set_number, key))
            .collect::<Result<Vec<f64>>>()?;
        Ok(PairDelta::new(pair.set_number).with_value(target, mean(&values)))
    })
}

pub fn cc_mean(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    mean_of(
        pairs,
        ctx,
        MetricKey::CcMean,
        &[MetricKey::PearsonR, MetricKey::SpearmanRho, MetricKey::KendallTau],
    )
}

pub fn nnd_mean(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    mean_of(
        pairs,
        ctx,
        MetricKey::NndMean,
        &[MetricKey::NndArithmeticMean, MetricKey::NndGeomMean, MetricKey::NndHarmMean],
    )
}

pub fn asterisk_convex_hull_mean(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    mean_of(
        pairs,
        ctx,
        MetricKey::AsteriskConvexHullMean,
        &[MetricKey::AsteriskMetrics, MetricKey::ConvexHull],
    )
}

pub fn mean_bin_box_percent_bin(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    mean_of(
        pairs,
        ctx,
        MetricKey::MeanBinBoxPercentBin,
        &[MetricKey::BinBoxRatio, MetricKey::PercentBin],
    )
}

pub fn mean_bin_box_percent_bin_nnd_mean(
    pairs: &BTreeMap<usize, Pair>,
    ctx: &MetricContext,
) -> Result<Vec<PairDelta>> {
    mean_of(
        pairs,
        ctx,
        MetricKey::MeanBinBoxPercentBinNndMean,
        &[MetricKey::BinBoxRatio, MetricKey::PercentBin, MetricKey::NndMean],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::{approx_eq, pair_from, store, value_of};
    use crate::models::ScoreRecord;

    #[test]
    fn cc_mean_averages_the_three_correlations() {
        let mut record = ScoreRecord::default();
        record.set(MetricKey::PearsonR, 0.9);
        record.set(MetricKey::SpearmanRho, 0.6);
        record.set(MetricKey::KendallTau, 0.3);
        let scores = BTreeMap::from([(1, record)]);
        let ctx = MetricContext {
            bin_number: 14,
            scores: &scores,
        };

        let deltas = cc_mean(&store(vec![pair_from(&[0.0, 1.0], &[0.0, 1.0])]), &ctx).unwrap();
        assert!(approx_eq(value_of(&deltas[0], MetricKey::CcMean), 0.6, 1e-12));
    }

    #[test]
    fn missing_component_is_an_error() {
        let scores = BTreeMap::from([(1, ScoreRecord::default())]);
        let ctx = MetricContext {
            bin_number: 14,
            scores: &scores,
        };
        let pairs = store(vec![pair_from(&[0.0, 1.0], &[0.0, 1.0])]);
        assert!(mean_bin_box_percent_bin(&pairs, &ctx).is_err());
    }

    #[test]
    fn nan_component_propagates() {
        let mut record = ScoreRecord::default();
        record.set(MetricKey::AsteriskMetrics, f64::NAN);
        record.set(MetricKey::ConvexHull, 0.5);
        let scores = BTreeMap::from([(1, record)]);
        let ctx = MetricContext {
            bin_number: 14,
            scores: &scores,
        };
        let pairs = store(vec![pair_from(&[0.0, 1.0], &[0.0, 1.0])]);
        let deltas = asterisk_convex_hull_mean(&pairs, &ctx).unwrap();
        assert!(value_of(&deltas[0], MetricKey::AsteriskConvexHullMean).is_nan());
    }
}
