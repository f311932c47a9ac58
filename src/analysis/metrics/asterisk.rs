use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use anyhow::Result;

use super::{MetricContext, for_each_pair};
use crate::models::pair::{AsteriskTerms, BundleUpdate};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::maths_utils::sample_std_dev;

/// Asterisk equations: spread of the peaks along the two diagonals and the two
/// mid-lines of the unit square, combined into A0 = √(Z₋·Z₊·Z1·Z2).
pub fn asterisk(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let terms = asterisk_terms(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::AsteriskMetrics, terms.a0)
            .with_update(BundleUpdate::Asterisk(terms)))
    })
}

pub fn asterisk_terms(x: &[f64], y: &[f64]) -> AsteriskTerms {
    let diff = |f: &dyn Fn(f64, f64) -> f64| -> Vec<f64> {
        x.iter().zip(y.iter()).map(|(&xi, &yi)| f(xi, yi)).collect()
    };

    let sigma_minus = sample_std_dev(&diff(&|xi, yi| xi - yi));
    let sigma_plus = sample_std_dev(&diff(&|xi, yi| yi - (1.0 - xi)));
    let sigma_1 = sample_std_dev(&diff(&|xi, _| xi - 0.5));
    let sigma_2 = sample_std_dev(&diff(&|_, yi| yi - 0.5));

    // The diagonal terms take the outer absolute value, the mid-line terms do not
    let z_minus = (1.0 - 2.5 * (sigma_minus - 0.4).abs()).abs();
    let z_plus = (1.0 - 2.5 * (sigma_plus - 0.4).abs()).abs();
    let z1 = 1.0 - (2.5 * sigma_1 * SQRT_2 - 1.0).abs();
    let z2 = 1.0 - (2.5 * sigma_2 * SQRT_2 - 1.0).abs();

    AsteriskTerms {
        sigma_minus,
        sigma_plus,
        sigma_1,
        sigma_2,
        z_minus,
        z_plus,
        z1,
        z2,
        a0: (z_minus * z_plus * z1 * z2).sqrt(),
    }
}
