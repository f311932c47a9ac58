use std::collections::BTreeMap;

use anyhow::Result;
use itertools::Itertools;

use super::{MetricContext, for_each_pair};
use crate::models::pair::BundleUpdate;
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::maths_utils::pearson_r;

/// 1 - r²: 1 for uncorrelated series, 0 for a perfect (anti)correlation.
#[inline]
pub fn decorrelation(coefficient: f64) -> f64 {
    1.0 - coefficient * coefficient
}

pub fn pearson(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let r = pearson_r(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::PearsonR, decorrelation(r))
            .with_update(BundleUpdate::Pearson(r)))
    })
}

pub fn spearman(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let rho = spearman_rho(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::SpearmanRho, decorrelation(rho))
            .with_update(BundleUpdate::Spearman(rho)))
    })
}

pub fn kendall(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let tau = kendall_tau_b(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::KendallTau, decorrelation(tau))
            .with_update(BundleUpdate::Kendall(tau)))
    })
}

/// 1-based ranks, ties sharing the average of the positions they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let order: Vec<usize> = (0..values.len())
        .sorted_by(|&a, &b| values[a].total_cmp(&values[b]))
        .collect();

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share rank mean(start+1 ..= end)
        let shared = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// Spearman's rho: Pearson correlation of the average ranks.
pub fn spearman_rho(x: &[f64], y: &[f64]) -> f64 {
    pearson_r(&average_ranks(x), &average_ranks(y))
}

/// sqrt((n0 - n1)(n0 - n2)), multiplied in f64 so large peak counts cannot overflow.
fn tau_b_denominator(total: u64, tied_x: u64, tied_y: u64) -> f64 {
    ((total - tied_x) as f64 * (total - tied_y) as f64).sqrt()
}

/// Kendall's tau-b, which corrects for ties in either series. NaN when a series is constant.
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }

    let mut score = 0i64;
    let mut tied_x = 0u64;
    let mut tied_y = 0u64;
    for (i, j) in (0..x.len()).tuple_combinations() {
        let dx = sign(x[i] - x[j]);
        let dy = sign(y[i] - y[j]);
        if dx == 0 {
            tied_x += 1;
        }
        if dy == 0 {
            tied_y += 1;
        }
        score += dx * dy;
    }

    let n = x.len() as u64;
    let total = n * (n - 1) / 2;
    let den = tau_b_denominator(total, tied_x, tied_y);
    if den == 0.0 {
        f64::NAN
    } else {
        (score as f64 / den).clamp(-1.0, 1.0)
    }
}

fn sign(v: f64) -> i64 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}
