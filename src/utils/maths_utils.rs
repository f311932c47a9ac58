use argminmax::ArgMinMax;
use statrs::statistics::Statistics;

/// A closed range split into `n_chunks` equal bins.
///
/// Binning follows histogram semantics: every bin is half-open `[lo, hi)` except
/// the last one, which also takes the upper boundary.
#[derive(serde::Deserialize, serde::Serialize, Default, Debug, Clone, PartialEq)]
pub struct RangeF64 {
    pub start_range: f64,
    pub end_range: f64,
    pub n_chunks: usize,
}

impl RangeF64 {
    pub fn new(start_range: f64, end_range: f64, n_chunks: usize) -> Self {
        debug_assert!(n_chunks > 0);
        Self {
            start_range,
            end_range,
            n_chunks,
        }
    }

    /// The unit interval, the space every normalised retention time lives in.
    pub fn unit(n_chunks: usize) -> Self {
        Self::new(0.0, 1.0, n_chunks)
    }

    pub fn range_length(&self) -> f64 {
        self.end_range - self.start_range
    }

    pub fn chunk_size(&self) -> f64 {
        self.range_length() / (self.n_chunks as f64)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start_range && value <= self.end_range
    }

    /// Bin of `value`, or `None` when it falls outside the range (NaN included).
    pub fn chunk_index(&self, value: f64) -> Option<usize> {
        if !self.contains(value) {
            return None;
        }
        let index = ((value - self.start_range) / self.chunk_size()) as usize;

        // Clamping handles the closed upper boundary and floating-point inaccuracies.
        Some(index.min(self.n_chunks - 1))
    }

    /// The `n_chunks + 1` bin boundaries.
    pub fn edges(&self) -> Vec<f64> {
        linspace(self.start_range, self.end_range, self.n_chunks + 1)
    }
}

/// `n` evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Extrema of the present values, `None` when nothing is present.
pub fn get_min_max(vec: &[f64]) -> Option<(f64, f64)> {
    if vec.is_empty() {
        return None;
    }
    let (min_index, max_index) = vec.argminmax();
    Some((vec[min_index], vec[max_index]))
}

/// Min-max normalisation to [0, 1].
///
/// A zero-width range maps every value to 0.0 so that downstream statistics see a
/// constant series (and report NaN correlations) instead of a vector of 0/0.
pub fn normalize_min_max(vec: &[f64]) -> Vec<f64> {
    let Some((min_value, max_value)) = get_min_max(vec) else {
        return Vec::new();
    };
    let span = max_value - min_value;
    if span == 0.0 {
        return vec![0.0; vec.len()];
    }
    vec.iter().map(|&v| (v - min_value) / span).collect()
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation (n - 1 denominator); NaN below two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    values.iter().std_dev()
}

/// Population standard deviation (n denominator).
pub fn population_std_dev(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Pearson product-moment correlation.
///
/// Returns NaN when either series is constant or the lengths differ; callers must
/// keep that NaN rather than reading it as "uncorrelated".
pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let mean_x = mean(x);
    let mean_y = mean(y);
    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }
    let den = (den_x * den_y).sqrt();
    if den > 0.0 {
        (num / den).clamp(-1.0, 1.0)
    } else {
        f64::NAN
    }
}

/// Counts per bin of a 1D histogram over `range`.
pub fn histogram_1d(values: &[f64], range: &RangeF64) -> Vec<usize> {
    let mut counts = vec![0usize; range.n_chunks];
    for idx in values.iter().filter_map(|&v| range.chunk_index(v)) {
        counts[idx] += 1;
    }
    counts
}

/// Joint counts of a 2D histogram, indexed `[x_bin][y_bin]`.
pub fn histogram_2d(x: &[f64], y: &[f64], x_range: &RangeF64, y_range: &RangeF64) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0usize; y_range.n_chunks]; x_range.n_chunks];
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        if let (Some(ix), Some(iy)) = (x_range.chunk_index(xi), y_range.chunk_index(yi)) {
            counts[ix][iy] += 1;
        }
    }
    counts
}

/// Bounded scalar minimisation on `[lower, upper]` (Brent's method: golden
/// section steps mixed with parabolic interpolation). Returns the abscissa of the minimum.
pub fn minimize_bounded<F>(f: F, lower: f64, upper: f64, x_tolerance: f64, max_iterations: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let golden_mean = 0.5 * (3.0 - 5f64.sqrt());
    let step_sign = |v: f64| if v < 0.0 { -1.0 } else { 1.0 };

    let (mut a, mut b) = (lower, upper);
    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut fx = f(xf);
    let mut ffulc = fx;
    let mut fnfc = fx;
    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + x_tolerance / 3.0;
    let mut tol2 = 2.0 * tol1;

    for _ in 0..max_iterations {
        if (xf - xm).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }

        let mut golden = true;
        if e.abs() > tol1 {
            // Try a parabolic step through the three best points
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                golden = false;
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * step_sign(xm - xf);
                }
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = golden_mean * e;
        }

        let x = xf + step_sign(rat) * rat.abs().max(tol1);
        let fu = f(x);

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + x_tolerance / 3.0;
        tol2 = 2.0 * tol1;
    }
    xf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn chunk_index_closes_last_bin() {
        let range = RangeF64::unit(5);
        assert_eq!(range.chunk_index(0.0), Some(0));
        assert_eq!(range.chunk_index(0.2), Some(1));
        assert_eq!(range.chunk_index(0.99), Some(4));
        assert_eq!(range.chunk_index(1.0), Some(4));
        assert_eq!(range.chunk_index(1.01), None);
        assert_eq!(range.chunk_index(-0.01), None);
        assert_eq!(range.chunk_index(f64::NAN), None);
    }

    #[test]
    fn min_max_on_unit_column_is_identity() {
        let column = vec![0.0, 0.25, 0.5, 0.75, 1.0];
        let normalized = normalize_min_max(&column);
        for (a, b) in column.iter().zip(normalized.iter()) {
            assert!(approx_eq(*a, *b));
        }
    }

    #[test]
    fn min_max_rescales_and_handles_constant_series() {
        let normalized = normalize_min_max(&[2.0, 4.0, 6.0]);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
        assert_eq!(normalize_min_max(&[3.0, 3.0]), vec![0.0, 0.0]);
        assert!(normalize_min_max(&[]).is_empty());
    }

    #[test]
    fn pearson_is_nan_for_constant_series() {
        assert!(approx_eq(pearson_r(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0));
        assert!(approx_eq(pearson_r(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0));
        assert!(pearson_r(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]).is_nan());
    }

    #[test]
    fn linspace_hits_both_ends() {
        let xs = linspace(0.0, 1.0, 5);
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(RangeF64::unit(2).edges(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn bounded_minimum_inside_and_on_the_edge() {
        let x = minimize_bounded(|x| (x - 0.3).powi(2), 0.0, 1.0, 1e-5, 500);
        assert!((x - 0.3).abs() < 1e-4);

        // Minimum outside the window: the search converges onto the bound
        let x = minimize_bounded(|x| (x - 2.0).powi(2), 0.0, 1.0, 1e-5, 500);
        assert!((x - 1.0).abs() < 1e-4);
    }
}
