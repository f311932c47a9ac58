use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use argminmax::ArgMinMax;
use rayon::prelude::*;
use statrs::statistics::Statistics;

use super::MetricContext;
use crate::config::{ANALYSIS, PRINT_PERCENT_FIT_TIMINGS};
use crate::models::pair::{BundleUpdate, PercentFitTerms, Quadratic};
use crate::models::{MetricKey, Pair, PairDelta};
use crate::utils::maths_utils::{linspace, mean, minimize_bounded};

/// %FIT: spread of the peaks around quadratic fits of y(x) and x(y).
///
/// One rayon task per pair, each mapping its points in parallel too. Tasks only
/// read their own pair and hand back a private delta.
pub fn percent_fit(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    let deltas = pairs
        .par_iter()
        .map(|(&set_number, pair)| {
            let started = Instant::now();
            let terms = percent_fit_terms(&pair.x_values, &pair.y_values);
            if PRINT_PERCENT_FIT_TIMINGS {
                log::info!(
                    "%FIT set {set_number}: {} peaks in {} ms",
                    pair.nb_peaks(),
                    started.elapsed().as_millis()
                );
            }
            PairDelta::new(set_number)
                .with_value(MetricKey::PercentFit, terms.value)
                .with_update(BundleUpdate::PercentFit(terms))
        })
        .collect();
    Ok(deltas)
}

pub fn percent_fit_terms(x: &[f64], y: &[f64]) -> PercentFitTerms {
    let quad_xy = fit_quadratic(x, y);
    let quad_yx = fit_quadratic(y, x);

    let (delta_xy_mean, delta_xy_sd) = direction_deltas(x, y, &quad_xy);
    let (delta_yx_mean, delta_yx_sd) = direction_deltas(y, x, &quad_yx);

    let value = ((delta_xy_mean + delta_xy_sd + delta_yx_mean + delta_yx_sd) / 4.0).abs();

    PercentFitTerms {
        quad_xy,
        quad_yx,
        delta_xy_mean,
        delta_xy_sd,
        delta_yx_mean,
        delta_yx_sd,
        value,
    }
}

pub fn eval_quadratic(q: &Quadratic, t: f64) -> f64 {
    (q[0] * t + q[1]) * t + q[2]
}

/// Mean and SD deltas of one fit direction, `u ≈ curve(t)`.
fn direction_deltas(t: &[f64], u: &[f64], curve: &Quadratic) -> (f64, f64) {
    let (above, below): (Vec<[f64; 2]>, Vec<[f64; 2]>) = t
        .iter()
        .zip(u.iter())
        .map(|(&ti, &ui)| [ti, ui])
        .filter(|p| eval_quadratic(curve, p[0]) != p[1])
        .partition(|p| eval_quadratic(curve, p[0]) < p[1]);

    let below_distances = nearest_distances(&below, curve);
    let above_distances = nearest_distances(&above, curve);

    let settings = &ANALYSIS.percent_fit;
    let score = |stat: f64, scale: f64| 1.0 - (1.0 - stat * scale).abs();

    let (below_mean, below_sd) = side_stats(&below_distances);
    let (above_mean, above_sd) = side_stats(&above_distances);

    let delta_mean = (score(below_mean, settings.mean_scale) + score(above_mean, settings.mean_scale)) / 2.0;
    let delta_sd = (score(below_sd, settings.sd_scale) + score(above_sd, settings.sd_scale)) / 2.0;
    (delta_mean, delta_sd)
}

/// Mean (0 when empty) and sample SD (0 below two values).
fn side_stats(distances: &[f64]) -> (f64, f64) {
    let m = if distances.is_empty() { 0.0 } else { mean(distances) };
    let sd = if distances.len() < 2 {
        0.0
    } else {
        distances.iter().std_dev()
    };
    (m, sd)
}

fn nearest_distances(points: &[[f64; 2]], curve: &Quadratic) -> Vec<f64> {
    let settings = &ANALYSIS.percent_fit;
    let grid = linspace(0.0, 1.0, settings.coarse_points);
    let curve_values: Vec<f64> = grid.iter().map(|&t| eval_quadratic(curve, t)).collect();

    points
        .par_iter()
        .map(|p| {
            let squared = |t: f64| (t - p[0]).powi(2) + (eval_quadratic(curve, t) - p[1]).powi(2);

            // Coarse pass over the sampled curve, then a bounded refinement around the best sample
            let coarse: Vec<f64> = grid
                .iter()
                .zip(curve_values.iter())
                .map(|(&t, &c)| (t - p[0]).powi(2) + (c - p[1]).powi(2))
                .collect();
            let t0 = grid[coarse.as_slice().argmin()];
            let left = (t0 - settings.fine_range).max(0.0);
            let right = (t0 + settings.fine_range).min(1.0);

            let t_best = minimize_bounded(squared, left, right, settings.x_tolerance, settings.max_iterations);
            squared(t_best).sqrt()
        })
        .collect()
}

/// Least-squares quadratic `u ≈ a·t² + b·t + c`.
///
/// Falls back to a line, then a constant, when the points cannot pin down
/// the higher-degree terms (fewer than three distinct abscissae).
pub fn fit_quadratic(t: &[f64], u: &[f64]) -> Quadratic {
    let mut s = [0.0f64; 5];
    let mut r = [0.0f64; 3];
    for (&ti, &ui) in t.iter().zip(u.iter()) {
        let mut power = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += power;
            if k < 3 {
                r[k] += power * ui;
            }
            power *= ti;
        }
    }

    let normal = [[s[4], s[3], s[2]], [s[3], s[2], s[1]], [s[2], s[1], s[0]]];
    if let Some([a, b, c]) = solve3(normal, [r[2], r[1], r[0]]) {
        return [a, b, c];
    }

    let det = s[2] * s[0] - s[1] * s[1];
    if det.abs() > f64::EPSILON * (s[2] * s[0]).abs().max(1.0) {
        let b = (r[1] * s[0] - s[1] * r[0]) / det;
        let c = (s[2] * r[0] - s[1] * r[1]) / det;
        return [0.0, b, c];
    }

    let c = if s[0] > 0.0 { r[0] / s[0] } else { 0.0 };
    [0.0, 0.0, c]
}

/// Gaussian elimination with partial pivoting. `None` for a (near) singular system.
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    let scale = m.iter().flatten().fold(0.0f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 {
        return None;
    }
    let tiny = scale * 1e-12;

    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() <= tiny {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);

        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut out = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * out[k]).sum();
        out[row] = (v[row] - tail) / m[row][row];
    }
    Some(out)
}
