use std::collections::BTreeMap;

use anyhow::Result;

use super::{MetricContext, for_each_pair};
use crate::config::ANALYSIS;
use crate::models::pair::{BundleUpdate, PercentBinTerms};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::RangeF64;
use crate::utils::maths_utils::histogram_2d;

/// %BIN: how close the 5×5 peak distribution is to an even spread.
pub fn percent_bin(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let terms = percent_bin_terms(&pair.x_values, &pair.y_values);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::PercentBin, terms.value)
            .with_update(BundleUpdate::PercentBin(terms)))
    })
}

pub fn percent_bin_terms(x: &[f64], y: &[f64]) -> PercentBinTerms {
    let grid = ANALYSIS.percent_bin.grid_size;
    let range = RangeF64::unit(grid);
    let counts = histogram_2d(x, y, &range, &range);

    let nb_peaks = x.len();
    let nb_bins = grid * grid;
    let average = nb_peaks as f64 / nb_bins as f64;

    // Sum of absolute deviations from the uniform average
    let sad_dev: f64 = counts.iter().flatten().map(|&c| (c as f64 - average).abs()).sum();

    // Best case: peaks dealt out one bin at a time
    let (per_bin, remainder) = (nb_peaks / nb_bins, nb_peaks % nb_bins);
    let sad_dev_fs: f64 = (0..nb_bins)
        .map(|i| {
            let in_bin = per_bin + usize::from(i < remainder);
            (in_bin as f64 - average).abs()
        })
        .sum();

    // Worst case: every peak in one bin
    let sad_dev_ns = (nb_peaks as f64 - average).abs() + (nb_bins - 1) as f64 * average;

    // Best and worst case coincide below two peaks
    let value = if nb_peaks <= 1 {
        ANALYSIS.percent_bin.degenerate_value
    } else {
        1.0 - (sad_dev - sad_dev_fs) / (sad_dev_ns - sad_dev_fs)
    };

    PercentBinTerms {
        counts,
        sad_dev,
        sad_dev_ns,
        sad_dev_fs,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::approx_eq;

    fn bin_centres() -> (Vec<f64>, Vec<f64>) {
        let centres: Vec<f64> = (0..5).map(|i| (i as f64 + 0.5) / 5.0).collect();
        centres
            .iter()
            .flat_map(|&cx| centres.iter().map(move |&cy| (cx, cy)))
            .unzip()
    }

    #[test]
    fn one_peak_per_bin_is_perfect_spread() {
        let (x, y) = bin_centres();
        let terms = percent_bin_terms(&x, &y);
        assert!(approx_eq(terms.value, 1.0, 1e-12));
        assert!(approx_eq(terms.sad_dev, 0.0, 1e-12));
    }

    #[test]
    fn all_peaks_in_one_bin_is_no_spread() {
        let x = vec![0.05; 25];
        let y = vec![0.05; 25];
        let terms = percent_bin_terms(&x, &y);
        assert!(approx_eq(terms.value, 0.0, 1e-12));
        assert_eq!(terms.counts[0][0], 25);
    }

    #[test]
    fn single_peak_uses_sentinel() {
        let terms = percent_bin_terms(&[0.5], &[0.5]);
        assert_eq!(terms.value, 1.0);
    }
}
