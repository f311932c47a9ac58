use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};

use anyhow::{Result, anyhow};

use super::{MetricContext, for_each_pair};
use crate::models::pair::{BundleUpdate, GeometricTerms};
use crate::models::{MetricKey, Pair, PairDelta, PeakCapacities};
use crate::utils::maths_utils::{mean, pearson_r, population_std_dev};

/// Geometric approach: practical peak capacity of the parallelogram spanned
/// by the two retention axes, relative to N1·N2.
///
/// Needs the 1D peak capacities of both conditions.
pub fn geometric_approach(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let capacities = pair.bundle.peak_capacities.ok_or_else(|| {
            anyhow!(
                "Set {} ({}): geometric approach needs 1D peak capacities, load them first",
                pair.set_number,
                pair.title
            )
        })?;
        let terms = geometric_terms(&pair.x_values, &pair.y_values, capacities);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::GeometricApproach, terms.value)
            .with_update(BundleUpdate::Geometric(terms)))
    })
}

fn standardize(values: &[f64]) -> Vec<f64> {
    let mu = mean(values);
    let sigma = population_std_dev(values);
    values.iter().map(|v| (v - mu) / sigma).collect()
}

pub fn geometric_terms(x: &[f64], y: &[f64], capacities: PeakCapacities) -> GeometricTerms {
    let c12 = pearson_r(&standardize(x), &standardize(y));
    let beta = c12.acos();

    let PeakCapacities { n1, n2 } = capacities;
    let alpha_prime = (n2 / n1).atan();
    let alpha = alpha_prime * (1.0 - 2.0 * beta / PI);
    let gamma = FRAC_PI_2 - beta - alpha;

    let practical_peak_capacity = n1 * n2 - 0.5 * n2 * gamma.tan() - 0.5 * n1 * alpha.tan();

    GeometricTerms {
        beta,
        alpha,
        gamma,
        practical_peak_capacity,
        value: practical_peak_capacity / (n1 * n2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::{approx_eq, pair_from, store};

    #[test]
    fn uncorrelated_axes_lose_almost_nothing() {
        // r = 0 → beta = π/2, alpha = 0, gamma = 0
        let terms = geometric_terms(
            &[0.0, 0.5, 1.0],
            &[1.0, 0.0, 1.0],
            PeakCapacities { n1: 100.0, n2: 50.0 },
        );
        assert!(approx_eq(terms.beta, FRAC_PI_2, 1e-12));
        assert!(approx_eq(terms.alpha, 0.0, 1e-12));
        assert!(approx_eq(terms.value, 1.0, 1e-12));
    }

    #[test]
    fn missing_capacities_are_an_error() {
        let scores = BTreeMap::new();
        let ctx = MetricContext {
            bin_number: 14,
            scores: &scores,
        };
        let pairs = store(vec![pair_from(&[0.0, 1.0], &[1.0, 0.0])]);
        assert!(geometric_approach(&pairs, &ctx).is_err());
    }
}
