use std::collections::BTreeMap;

use anyhow::Result;
use statrs::statistics::Statistics;

use super::{MetricContext, for_each_pair};
use crate::config::ANALYSIS;
use crate::models::pair::{BundleUpdate, NndMeans};
use crate::models::{MetricKey, Pair, PairDelta};

/// Arithmetic, geometric and harmonic means of the nearest-neighbour distances,
/// each scaled by (√n - 1) / 0.64. One run fills all three columns.
pub fn nnd_means(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let means = nnd_from_points(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::NndArithmeticMean, means.arithmetic)
            .with_value(MetricKey::NndGeomMean, means.geometric)
            .with_value(MetricKey::NndHarmMean, means.harmonic)
            .with_update(BundleUpdate::Nnd(means)))
    })
}

pub fn nnd_from_points(x: &[f64], y: &[f64]) -> NndMeans {
    let distances: Vec<f64> = single_linkage_heights(x, y)
        .into_iter()
        .filter(|&d| d > 0.0)
        .collect();

    let scale = ((x.len() as f64).sqrt() - 1.0) / ANALYSIS.nnd.normalisation_divisor;

    NndMeans {
        arithmetic: distances.iter().mean() * scale,
        geometric: distances.iter().geometric_mean() * scale,
        harmonic: distances.iter().harmonic_mean() * scale,
    }
}

/// Merge heights of single-linkage clustering, i.e. the edge lengths of the
/// Euclidean minimum spanning tree (Prim, O(n²)).
pub fn single_linkage_heights(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return Vec::new();
    }

    let dist = |i: usize, j: usize| ((x[i] - x[j]).powi(2) + (y[i] - y[j]).powi(2)).sqrt();

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut heights = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        best[j] = dist(0, j);
    }

    for _ in 1..n {
        let Some(next) = (0..n)
            .filter(|&j| !in_tree[j])
            .min_by(|&a, &b| best[a].total_cmp(&best[b]))
        else {
            break;
        };
        in_tree[next] = true;
        heights.push(best[next]);

        for j in 0..n {
            if !in_tree[j] {
                best[j] = best[j].min(dist(next, j));
            }
        }
    }
    heights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::approx_eq;

    #[test]
    fn spanning_tree_of_a_line() {
        let mut heights = single_linkage_heights(&[0.0, 0.3, 1.0, 0.1], &[0.0, 0.0, 0.0, 0.0]);
        heights.sort_by(f64::total_cmp);
        let expected = [0.1, 0.2, 0.7];
        for (h, e) in heights.iter().zip(expected) {
            assert!(approx_eq(*h, e, 1e-12));
        }
    }

    #[test]
    fn evenly_spaced_grid_has_equal_means() {
        // 3×3 grid, spacing 0.5: every MST edge is 0.5
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                x.push(i as f64 * 0.5);
                y.push(j as f64 * 0.5);
            }
        }
        let means = nnd_from_points(&x, &y);
        let expected = 0.5 * (3.0 - 1.0) / 0.64;
        assert!(approx_eq(means.arithmetic, expected, 1e-12));
        assert!(approx_eq(means.geometric, expected, 1e-9));
        assert!(approx_eq(means.harmonic, expected, 1e-9));
    }

    #[test]
    fn duplicate_points_are_ignored() {
        let means = nnd_from_points(&[0.0, 0.0, 1.0, 1.0], &[0.0, 0.0, 0.0, 0.0]);
        // One non-zero height of 1.0, scale (2 - 1) / 0.64
        assert!(approx_eq(means.arithmetic, 1.0 / 0.64, 1e-12));
    }
}
