use serde::{Deserialize, Serialize};

use crate::domain::ConditionPair;
use crate::models::metric::{MetricKey, MetricKind};

/// Convex hull of a pair's point cloud.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HullGeometry {
    /// Distinct points the hull was built from.
    pub points: Vec<[f64; 2]>,
    /// Hull vertices in counter-clockwise order. Empty for degenerate clouds.
    pub vertices: Vec<[f64; 2]>,
    /// Consecutive vertex pairs closing the polygon.
    pub edges: Vec<([f64; 2], [f64; 2])>,
    pub area: f64,
}

/// Occupancy of a B×B grid over the unit square.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GridOccupancy {
    pub bins: usize,
    pub edges: Vec<f64>,
    /// `mask[y_bin][x_bin]`, true when at least one peak falls in the bin.
    pub mask: Vec<Vec<bool>>,
    pub occupied: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelingTerms {
    pub grid: GridOccupancy,
    pub fit: LinearFit,
    pub c_pert: f64,
    pub c_peaks: f64,
}

/// Raw coefficients behind the 1 - r² correlation metrics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct CorrelationCoefficients {
    pub pearson_r: Option<f64>,
    pub spearman_rho: Option<f64>,
    pub kendall_tau: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct AsteriskTerms {
    pub sigma_minus: f64,
    pub sigma_plus: f64,
    pub sigma_1: f64,
    pub sigma_2: f64,
    pub z_minus: f64,
    pub z_plus: f64,
    pub z1: f64,
    pub z2: f64,
    pub a0: f64,
}

/// Normalised nearest-neighbour distance means.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct NndMeans {
    pub arithmetic: f64,
    pub geometric: f64,
    pub harmonic: f64,
}

/// Quadratic coefficients `[a, b, c]` of `a·t² + b·t + c`.
pub type Quadratic = [f64; 3];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PercentFitTerms {
    /// Fit of y as a function of x.
    pub quad_xy: Quadratic,
    /// Fit of x as a function of y.
    pub quad_yx: Quadratic,
    pub delta_xy_mean: f64,
    pub delta_xy_sd: f64,
    pub delta_yx_mean: f64,
    pub delta_yx_sd: f64,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PercentBinTerms {
    /// Peak count per bin of the fixed 5×5 grid, `[x_bin][y_bin]`.
    pub counts: Vec<Vec<usize>>,
    pub sad_dev: f64,
    pub sad_dev_ns: f64,
    pub sad_dev_fs: f64,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EntropyTerms {
    /// Joint counts, `[x_bin][y_bin]`.
    pub histogram: Vec<Vec<usize>>,
    pub edges: Vec<f64>,
    pub h_x: f64,
    pub h_y: f64,
    pub h_xy: f64,
    pub value: f64,
}

/// Angles (radians) and peak capacity of the geometric approach.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometricTerms {
    pub beta: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub practical_peak_capacity: f64,
    pub value: f64,
}

/// 1D peak capacities of the two conditions of a pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakCapacities {
    pub n1: f64,
    pub n2: f64,
}

impl PeakCapacities {
    pub fn product(&self) -> f64 {
        self.n1 * self.n2
    }
}

/// Everything the metric computers leave behind for a pair, besides the scalar values.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MetricBundle {
    pub hull: Option<HullGeometry>,
    pub bin_box: Option<GridOccupancy>,
    pub gilar_watson: Option<GridOccupancy>,
    pub modeling: Option<ModelingTerms>,
    pub correlations: CorrelationCoefficients,
    pub asterisk: Option<AsteriskTerms>,
    pub nnd: Option<NndMeans>,
    pub percent_fit: Option<PercentFitTerms>,
    pub percent_bin: Option<PercentBinTerms>,
    pub entropy: Option<EntropyTerms>,
    pub geometric: Option<GeometricTerms>,
    pub peak_capacities: Option<PeakCapacities>,
    pub peak_capacity_2d: Option<f64>,
}

/// Intermediate produced alongside a metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum BundleUpdate {
    Hull(HullGeometry),
    BinBox(GridOccupancy),
    GilarWatson(GridOccupancy),
    Modeling(ModelingTerms),
    Pearson(f64),
    Spearman(f64),
    Kendall(f64),
    Asterisk(AsteriskTerms),
    Nnd(NndMeans),
    PercentFit(PercentFitTerms),
    PercentBin(PercentBinTerms),
    Entropy(EntropyTerms),
    Geometric(GeometricTerms),
}

impl MetricBundle {
    pub fn apply(&mut self, update: BundleUpdate) {
        match update {
            BundleUpdate::Hull(h) => self.hull = Some(h),
            BundleUpdate::BinBox(g) => self.bin_box = Some(g),
            BundleUpdate::GilarWatson(g) => self.gilar_watson = Some(g),
            BundleUpdate::Modeling(m) => self.modeling = Some(m),
            BundleUpdate::Pearson(r) => self.correlations.pearson_r = Some(r),
            BundleUpdate::Spearman(r) => self.correlations.spearman_rho = Some(r),
            BundleUpdate::Kendall(t) => self.correlations.kendall_tau = Some(t),
            BundleUpdate::Asterisk(a) => self.asterisk = Some(a),
            BundleUpdate::Nnd(n) => self.nnd = Some(n),
            BundleUpdate::PercentFit(p) => self.percent_fit = Some(p),
            BundleUpdate::PercentBin(p) => self.percent_bin = Some(p),
            BundleUpdate::Entropy(e) => self.entropy = Some(e),
            BundleUpdate::Geometric(g) => self.geometric = Some(g),
        }
    }

    /// Drop the intermediate `kind` left behind. Composite means keep none.
    pub fn forget(&mut self, kind: MetricKind) {
        match kind {
            MetricKind::ConvexHull => self.hull = None,
            MetricKind::BinBox => self.bin_box = None,
            MetricKind::GilarWatson => self.gilar_watson = None,
            MetricKind::ModelingApproach => self.modeling = None,
            MetricKind::Pearson => self.correlations.pearson_r = None,
            MetricKind::Spearman => self.correlations.spearman_rho = None,
            MetricKind::Kendall => self.correlations.kendall_tau = None,
            MetricKind::Asterisk => self.asterisk = None,
            MetricKind::NndArithmeticMean | MetricKind::NndGeometricMean | MetricKind::NndHarmonicMean => {
                self.nnd = None
            }
            MetricKind::PercentFit => self.percent_fit = None,
            MetricKind::PercentBin => self.percent_bin = None,
            MetricKind::ConditionalEntropy => self.entropy = None,
            MetricKind::GeometricApproach => self.geometric = None,
            MetricKind::CcMean
            | MetricKind::NndMean
            | MetricKind::AsteriskConvexHullMean
            | MetricKind::MeanBinBoxPercentBin
            | MetricKind::MeanBinBoxPercentBinNndMean => {}
        }
    }
}

/// What a metric computer hands back for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairDelta {
    pub set_number: usize,
    pub values: Vec<(MetricKey, f64)>,
    pub updates: Vec<BundleUpdate>,
}

impl PairDelta {
    pub fn new(set_number: usize) -> Self {
        Self {
            set_number,
            values: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: MetricKey, value: f64) -> Self {
        self.values.push((key, value));
        self
    }

    pub fn with_update(mut self, update: BundleUpdate) -> Self {
        self.updates.push(update);
        self
    }
}

/// A pair of conditions with its cleaned, paired retention times.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pair {
    pub set_number: usize,
    pub title: String,
    pub condition_type: String,
    pub x_title: String,
    pub y_title: String,
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub bundle: MetricBundle,
}

impl Pair {
    pub fn new(condition_pair: &ConditionPair, x_values: Vec<f64>, y_values: Vec<f64>) -> Self {
        debug_assert_eq!(x_values.len(), y_values.len());
        Self {
            set_number: condition_pair.set_number,
            title: condition_pair.title(),
            condition_type: condition_pair.condition_type(),
            x_title: condition_pair.x_title.clone(),
            y_title: condition_pair.y_title.clone(),
            x_values,
            y_values,
            bundle: MetricBundle::default(),
        }
    }

    pub fn nb_peaks(&self) -> usize {
        self.x_values.len()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x_values.iter().copied().zip(self.y_values.iter().copied())
    }
}
