use std::collections::BTreeMap;

use anyhow::Result;

use super::{MetricContext, for_each_pair};
use crate::models::pair::{BundleUpdate, EntropyTerms};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::RangeF64;
use crate::utils::maths_utils::{histogram_1d, histogram_2d};

pub fn conditional_entropy(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let terms = entropy_terms(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::ConditionalEntropy, terms.value)
            .with_update(BundleUpdate::Entropy(terms)))
    })
}

/// Sturges' rule: round(1 + log2 n) bins.
pub fn sturges_bins(n: usize) -> usize {
    (1.0 + (n.max(1) as f64).log2()).round() as usize
}

/// Shannon entropy (bits) of a histogram normalised by `total`.
fn shannon_bits<'a>(counts: impl Iterator<Item = &'a usize>, total: f64) -> f64 {
    -counts
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// H(y|x) / H(y) on a Sturges grid over the unit square. NaN when H(y) is zero.
pub fn entropy_terms(x: &[f64], y: &[f64]) -> EntropyTerms {
    let n = x.len();
    let range = RangeF64::unit(sturges_bins(n));
    let total = n as f64;

    let count_x = histogram_1d(x, &range);
    let count_y = histogram_1d(y, &range);
    let histogram = histogram_2d(x, y, &range, &range);

    let h_x = shannon_bits(count_x.iter(), total);
    let h_y = shannon_bits(count_y.iter(), total);
    let h_xy = shannon_bits(histogram.iter().flatten(), total);

    let value = if h_y == 0.0 { f64::NAN } else { (h_xy - h_x) / h_y };

    EntropyTerms {
        histogram,
        edges: range.edges(),
        h_x,
        h_y,
        h_xy,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::approx_eq;

    #[test]
    fn sturges_rule() {
        assert_eq!(sturges_bins(1), 1);
        assert_eq!(sturges_bins(8), 4);
        assert_eq!(sturges_bins(16), 5);
        assert_eq!(sturges_bins(100), 8);
    }

    #[test]
    fn identical_axes_leave_no_conditional_information() {
        let x: Vec<f64> = (0..8).map(|i| (i as f64 + 0.5) / 8.0).collect();
        let terms = entropy_terms(&x, &x);
        // H(x, y) == H(x) when y is a function of x
        assert!(approx_eq(terms.h_xy, terms.h_x, 1e-12));
        assert!(approx_eq(terms.value, 0.0, 1e-12));
    }

    #[test]
    fn independent_grid_reaches_one() {
        let xs = [0.1, 0.1, 0.9, 0.9];
        let ys = [0.1, 0.9, 0.1, 0.9];
        // n = 4 → 3 bins; x and y each split 2/2, joint has 4 equally likely cells
        let terms = entropy_terms(&xs, &ys);
        assert!(approx_eq(terms.h_x, 1.0, 1e-12));
        assert!(approx_eq(terms.h_xy, 2.0, 1e-12));
        assert!(approx_eq(terms.value, 1.0, 1e-12));
    }

    #[test]
    fn constant_y_is_undefined() {
        let terms = entropy_terms(&[0.0, 0.5, 1.0], &[0.2, 0.2, 0.2]);
        assert!(terms.value.is_nan());
    }
}
