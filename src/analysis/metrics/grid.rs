use std::collections::BTreeMap;

use anyhow::{Result, bail};

use super::{MetricContext, for_each_pair};
use crate::config::ANALYSIS;
use crate::models::pair::{BundleUpdate, GridOccupancy, LinearFit, ModelingTerms};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::RangeF64;
use crate::utils::maths_utils::mean;

/// Which cells of a `bins`×`bins` grid over the unit square hold at least one point.
pub fn grid_occupancy(x: &[f64], y: &[f64], bins: usize) -> GridOccupancy {
    let range = RangeF64::unit(bins);
    let mut mask = vec![vec![false; bins]; bins];
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        if let (Some(ix), Some(iy)) = (range.chunk_index(xi), range.chunk_index(yi)) {
            mask[iy][ix] = true;
        }
    }
    let occupied = mask.iter().flatten().filter(|&&cell| cell).count();

    GridOccupancy {
        bins,
        edges: range.edges(),
        mask,
        occupied,
    }
}

fn check_bins(bins: usize) -> Result<()> {
    if bins == 0 {
        bail!("The occupancy grid needs at least one bin per axis");
    }
    Ok(())
}

/// Fraction of occupied grid cells.
pub fn bin_box(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    check_bins(ctx.bin_number)?;
    let cells = (ctx.bin_number * ctx.bin_number) as f64;

    for_each_pair(pairs, |pair| {
        let grid = grid_occupancy(&pair.x_values, &pair.y_values, ctx.bin_number);
        let ratio = grid.occupied as f64 / cells;
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::BinBoxRatio, ratio)
            .with_update(BundleUpdate::BinBox(grid)))
    })
}

/// Occupied cells relative to what a random spread of peaks would cover.
///
/// (occupied - B) / (0.63·B² - B)
pub fn gilar_watson(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    check_bins(ctx.bin_number)?;
    let b = ctx.bin_number as f64;
    let expected = ANALYSIS.bin_box.random_coverage * b * b - b;

    for_each_pair(pairs, |pair| {
        let grid = grid_occupancy(&pair.x_values, &pair.y_values, ctx.bin_number);
        let value = (grid.occupied as f64 - b) / expected;
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::GilarWatson, value)
            .with_update(BundleUpdate::GilarWatson(grid)))
    })
}

/// C_pert × C_peaks, with C_pert the coverage against random placement and
/// C_peaks = 1 - R² of the linear regression of y on x.
pub fn modeling_approach(pairs: &BTreeMap<usize, Pair>, ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    check_bins(ctx.bin_number)?;
    let b = ctx.bin_number as f64;

    for_each_pair(pairs, |pair| {
        let grid = grid_occupancy(&pair.x_values, &pair.y_values, ctx.bin_number);
        let c_pert = grid.occupied as f64 / (ANALYSIS.bin_box.random_coverage * b * b);
        let fit = linear_regression(&pair.x_values, &pair.y_values);
        let c_peaks = 1.0 - fit.r * fit.r;
        let value = c_pert * c_peaks;

        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::ModelingApproach, value)
            .with_update(BundleUpdate::Modeling(ModelingTerms {
                grid,
                fit,
                c_pert,
                c_peaks,
            })))
    })
}

/// Ordinary least squares of y on x.
///
/// `r` is 0 when either series has no spread; slope and intercept are NaN when x is constant.
pub fn linear_regression(x: &[f64], y: &[f64]) -> LinearFit {
    let mean_x = mean(x);
    let mean_y = mean(y);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let den = (sxx * syy).sqrt();
    let r = if den == 0.0 { 0.0 } else { (sxy / den).clamp(-1.0, 1.0) };
    let slope = if sxx == 0.0 { f64::NAN } else { sxy / sxx };

    LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r,
    }
}
