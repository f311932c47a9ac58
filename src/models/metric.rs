use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::config::ANALYSIS;

/// One column of the flat result table.
///
/// Declaration order is the column order: `table_index` is the discriminant, so
/// indices are unique and contiguous by construction.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize, strum_macros::EnumIter,
)]
pub enum MetricKey {
    SetNumber,
    Title,
    NbPeaks,
    PeakCapacity2d,
    ConvexHull,
    BinBoxRatio,
    PearsonR,
    SpearmanRho,
    KendallTau,
    CcMean,
    AsteriskMetrics,
    NndArithmeticMean,
    NndGeomMean,
    NndHarmMean,
    NndMean,
    PercentFit,
    PercentBin,
    MeanBinBoxPercentBin,
    AsteriskConvexHullMean,
    MeanBinBoxPercentBinNndMean,
    ComputedScore,
    SuggestedScore,
    OrthogonalityFactor,
    Practical2dPeakCapacity,
    OrthogonalityValue,
    GilarWatson,
    ModelingApproach,
    ConditionalEntropy,
    GeometricApproach,
}

impl MetricKey {
    pub const COUNT: usize = 29;

    pub fn table_index(self) -> usize {
        self as usize
    }

    /// Whether the value is kept in the per-pair score record.
    ///
    /// Identity columns (set number, title, peak count) are not scores.
    pub fn include_in_score(self) -> bool {
        !matches!(self, MetricKey::SetNumber | MetricKey::Title | MetricKey::NbPeaks)
    }

    /// Whether the metric takes part in the metric×metric correlation matrix.
    pub fn include_in_corr_mat(self) -> bool {
        matches!(
            self,
            MetricKey::ConvexHull
                | MetricKey::BinBoxRatio
                | MetricKey::PearsonR
                | MetricKey::SpearmanRho
                | MetricKey::KendallTau
                | MetricKey::AsteriskMetrics
                | MetricKey::NndMean
                | MetricKey::PercentFit
                | MetricKey::PercentBin
                | MetricKey::GilarWatson
                | MetricKey::ModelingApproach
                | MetricKey::ConditionalEntropy
                | MetricKey::GeometricApproach
        )
    }

    /// Canonical key used in exported tables.
    pub fn key(self) -> &'static str {
        match self {
            MetricKey::SetNumber => "set_number",
            MetricKey::Title => "title",
            MetricKey::NbPeaks => "nb_peaks",
            MetricKey::PeakCapacity2d => "2d_peak_capacity",
            MetricKey::ConvexHull => "convex_hull",
            MetricKey::BinBoxRatio => "bin_box_ratio",
            MetricKey::PearsonR => "pearson_r",
            MetricKey::SpearmanRho => "spearman_rho",
            MetricKey::KendallTau => "kendall_tau",
            MetricKey::CcMean => "cc_mean",
            MetricKey::AsteriskMetrics => "asterisk_metrics",
            MetricKey::NndArithmeticMean => "nnd_arithmetic_mean",
            MetricKey::NndGeomMean => "nnd_geom_mean",
            MetricKey::NndHarmMean => "nnd_harm_mean",
            MetricKey::NndMean => "nnd_mean",
            MetricKey::PercentFit => "percent_fit",
            MetricKey::PercentBin => "percent_bin",
            MetricKey::MeanBinBoxPercentBin => "mean_bin_box_percent_bin",
            MetricKey::AsteriskConvexHullMean => "asterisk_convex_hull_mean",
            MetricKey::MeanBinBoxPercentBinNndMean => "mean_bin_box_percent_bin_nnd_mean",
            MetricKey::ComputedScore => "computed_score",
            MetricKey::SuggestedScore => "suggested_score",
            MetricKey::OrthogonalityFactor => "orthogonality_factor",
            MetricKey::Practical2dPeakCapacity => "practical_2d_peak_capacity",
            MetricKey::OrthogonalityValue => "orthogonality_value",
            MetricKey::GilarWatson => "gilar-watson",
            MetricKey::ModelingApproach => "modeling_approach",
            MetricKey::ConditionalEntropy => "conditional_entropy",
            MetricKey::GeometricApproach => "geometric_approach",
        }
    }

    /// Score columns that every pair starts with at zero.
    pub fn aggregate_scores() -> [MetricKey; 5] {
        [
            MetricKey::SuggestedScore,
            MetricKey::ComputedScore,
            MetricKey::OrthogonalityFactor,
            MetricKey::OrthogonalityValue,
            MetricKey::Practical2dPeakCapacity,
        ]
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for MetricKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        MetricKey::iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| anyhow!("Unknown result column '{s}'"))
    }
}

/// A computable orthogonality metric.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize, strum_macros::EnumIter,
)]
pub enum MetricKind {
    ConvexHull,
    BinBox,
    Pearson,
    Spearman,
    Kendall,
    CcMean,
    Asterisk,
    AsteriskConvexHullMean,
    NndArithmeticMean,
    NndGeometricMean,
    NndHarmonicMean,
    NndMean,
    PercentFit,
    PercentBin,
    MeanBinBoxPercentBin,
    MeanBinBoxPercentBinNndMean,
    GilarWatson,
    ModelingApproach,
    GeometricApproach,
    ConditionalEntropy,
}

impl MetricKind {
    pub fn display_name(self) -> &'static str {
        match self {
            MetricKind::ConvexHull => "Convex hull relative area",
            MetricKind::BinBox => "Bin box counting",
            MetricKind::Pearson => "Pearson Correlation",
            MetricKind::Spearman => "Spearman Correlation",
            MetricKind::Kendall => "Kendall Correlation",
            MetricKind::CcMean => "CC mean",
            MetricKind::Asterisk => "Asterisk equations",
            MetricKind::AsteriskConvexHullMean => "Asterisk + Cnvx Hull mean",
            MetricKind::NndArithmeticMean => "NND Arithm mean",
            MetricKind::NndGeometricMean => "NND Geom mean",
            MetricKind::NndHarmonicMean => "NND Harm mean",
            MetricKind::NndMean => "NND mean",
            MetricKind::PercentFit => "%FIT",
            MetricKind::PercentBin => "%BIN",
            MetricKind::MeanBinBoxPercentBin => "mean (Bin box + %BIN)",
            MetricKind::MeanBinBoxPercentBinNndMean => "mean(Bin box + %BIN + NND mean)",
            MetricKind::GilarWatson => "Gilar-Watson method",
            MetricKind::ModelingApproach => "Modeling approach",
            MetricKind::GeometricApproach => "Geometric approach",
            MetricKind::ConditionalEntropy => "Conditional entropy",
        }
    }

    /// Result column the metric value lands in.
    pub fn key(self) -> MetricKey {
        match self {
            MetricKind::ConvexHull => MetricKey::ConvexHull,
            MetricKind::BinBox => MetricKey::BinBoxRatio,
            MetricKind::Pearson => MetricKey::PearsonR,
            MetricKind::Spearman => MetricKey::SpearmanRho,
            MetricKind::Kendall => MetricKey::KendallTau,
            MetricKind::CcMean => MetricKey::CcMean,
            MetricKind::Asterisk => MetricKey::AsteriskMetrics,
            MetricKind::AsteriskConvexHullMean => MetricKey::AsteriskConvexHullMean,
            MetricKind::NndArithmeticMean => MetricKey::NndArithmeticMean,
            MetricKind::NndGeometricMean => MetricKey::NndGeomMean,
            MetricKind::NndHarmonicMean => MetricKey::NndHarmMean,
            MetricKind::NndMean => MetricKey::NndMean,
            MetricKind::PercentFit => MetricKey::PercentFit,
            MetricKind::PercentBin => MetricKey::PercentBin,
            MetricKind::MeanBinBoxPercentBin => MetricKey::MeanBinBoxPercentBin,
            MetricKind::MeanBinBoxPercentBinNndMean => MetricKey::MeanBinBoxPercentBinNndMean,
            MetricKind::GilarWatson => MetricKey::GilarWatson,
            MetricKind::ModelingApproach => MetricKey::ModelingApproach,
            MetricKind::GeometricApproach => MetricKey::GeometricApproach,
            MetricKind::ConditionalEntropy => MetricKey::ConditionalEntropy,
        }
    }

    /// Relative cost used to weight progress.
    pub fn weight(self) -> u32 {
        match self {
            MetricKind::PercentFit => ANALYSIS.progress.percent_fit_weight,
            _ => ANALYSIS.progress.default_weight,
        }
    }

    /// Metrics whose values this one reads.
    pub fn prerequisites(self) -> &'static [MetricKind] {
        match self {
            MetricKind::CcMean => &[MetricKind::Pearson, MetricKind::Spearman, MetricKind::Kendall],
            MetricKind::NndMean => &[
                MetricKind::NndArithmeticMean,
                MetricKind::NndGeometricMean,
                MetricKind::NndHarmonicMean,
            ],
            MetricKind::AsteriskConvexHullMean => &[MetricKind::Asterisk, MetricKind::ConvexHull],
            MetricKind::MeanBinBoxPercentBin => &[MetricKind::BinBox, MetricKind::PercentBin],
            MetricKind::MeanBinBoxPercentBinNndMean => &[
                MetricKind::BinBox,
                MetricKind::PercentBin,
                MetricKind::NndMean,
            ],
            _ => &[],
        }
    }

    /// Kinds produced by the same computer run (the three NND means share one clustering).
    pub fn computed_together(self) -> &'static [MetricKind] {
        match self {
            MetricKind::NndArithmeticMean | MetricKind::NndGeometricMean | MetricKind::NndHarmonicMean => &[
                MetricKind::NndArithmeticMean,
                MetricKind::NndGeometricMean,
                MetricKind::NndHarmonicMean,
            ],
            _ => &[],
        }
    }

    /// Metrics that read the configurable B×B grid.
    pub fn depends_on_bin_number(self) -> bool {
        matches!(
            self,
            MetricKind::BinBox | MetricKind::GilarWatson | MetricKind::ModelingApproach
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Accepts either the display name ("Pearson Correlation") or the column key ("pearson_r").
impl FromStr for MetricKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        MetricKind::iter()
            .find(|k| k.display_name() == s || k.key().key() == s)
            .ok_or_else(|| anyhow!("Unknown orthogonality metric '{s}'"))
    }
}
