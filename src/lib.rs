// Core modules
pub mod analysis;
pub mod config;
pub mod domain;
pub mod models;
pub mod utils;

// The engine
pub mod engine;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::IntoEnumIterator;

// Re-export commonly used types
pub use analysis::{NanPolicy, NormalizationMethod, NormalizationReport};
pub use domain::{ConditionValues, RetentionTimeTable};
pub use engine::{DataStatus, OrthogonalityEngine};
pub use models::{CorrelationGroup, MetricKey, MetricKind, ResultRow, ResultsTableRow};

use config::ANALYSIS;

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Retention time table as JSON: {"peak_ids": [..], "conditions": [..], "columns": [[..], ..]}
    pub input: PathBuf,

    /// Normalisation applied before pairing (min_max, void_max, wosel)
    #[arg(long)]
    pub normalization: Option<NormalizationMethod>,

    /// Void times per condition (JSON object), needed by void_max and wosel
    #[arg(long)]
    pub void_times: Option<PathBuf>,

    /// Gradient end times per condition (JSON object), needed by wosel
    #[arg(long)]
    pub gradient_end: Option<PathBuf>,

    /// 1D peak capacities per condition (JSON object)
    #[arg(long)]
    pub peak_capacities: Option<PathBuf>,

    /// Bins per axis of the occupancy grid
    #[arg(long, default_value_t = ANALYSIS.bin_box.default_bin_number)]
    pub bins: usize,

    /// Correlation threshold for grouping redundant metrics
    #[arg(long, default_value_t = ANALYSIS.correlation.default_threshold)]
    pub threshold: f64,

    #[arg(long, default_value_t = ANALYSIS.correlation.default_tolerance)]
    pub tolerance: f64,

    /// Drop peaks missing in more than this percentage of conditions
    #[arg(long, default_value_t = ANALYSIS.nan_policy.default_threshold_pct)]
    pub nan_threshold: f64,

    /// Keep every peak, only dropping incomplete points pair by pair
    #[arg(long, default_value_t = false)]
    pub keep_all: bool,

    /// Metrics to compute, by key or display name (default: all available)
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<MetricKind>,

    /// Rank on the suggested score instead of the computed score
    #[arg(long, default_value_t = false)]
    pub use_suggested_score: bool,
}

/// Tables a run works on, already deserialized.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub retention_times: RetentionTimeTable,
    pub void_times: Option<ConditionValues>,
    pub gradient_end_times: Option<ConditionValues>,
    pub peak_capacities: Option<ConditionValues>,
}

/// Everything a run prints.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: DataStatus,
    pub normalization: Option<NormalizationReport>,
    pub peaks_dropped: usize,
    pub results: Vec<ResultsTableRow>,
    pub correlation_groups: Vec<CorrelationGroup>,
    pub header: Vec<&'static str>,
    pub rows: Vec<ResultRow>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read the input files named on the command line and run the whole pipeline.
pub fn run(cli: &Cli) -> Result<RunReport> {
    let inputs = RunInputs {
        retention_times: read_json(&cli.input)?,
        void_times: cli.void_times.as_deref().map(read_json).transpose()?,
        gradient_end_times: cli.gradient_end.as_deref().map(read_json).transpose()?,
        peak_capacities: cli.peak_capacities.as_deref().map(read_json).transpose()?,
    };
    evaluate(cli, inputs)
}

/// Load, clean, normalise, compute, score, group and rank.
pub fn evaluate(cli: &Cli, inputs: RunInputs) -> Result<RunReport> {
    let mut engine = OrthogonalityEngine::new();
    engine.set_bin_number(cli.bins)?;
    engine.load_retention_times(inputs.retention_times)?;

    let mut peaks_dropped = 0;
    if engine.has_missing_values() {
        let policy = if cli.keep_all {
            NanPolicy::KeepAll
        } else {
            NanPolicy::DropSparsePeaks {
                threshold_pct: cli.nan_threshold,
            }
        };
        peaks_dropped = engine.clean_nan(policy)?;
    }

    if let Some(void_times) = inputs.void_times {
        engine.set_void_times(void_times);
    }
    if let Some(gradient_end_times) = inputs.gradient_end_times {
        engine.set_gradient_end_times(gradient_end_times);
    }
    let normalization = cli.normalization.map(|method| engine.normalize(method)).transpose()?;

    let has_capacities = inputs.peak_capacities.is_some();
    if let Some(capacities) = inputs.peak_capacities {
        engine.load_peak_capacities(capacities)?;
    }

    let metrics: Vec<MetricKind> = if cli.metrics.is_empty() {
        MetricKind::iter()
            .filter(|&k| has_capacities || k != MetricKind::GeometricApproach)
            .collect()
    } else {
        cli.metrics.clone()
    };

    engine.compute_metrics(&metrics, |pct| log::debug!("Progress {pct}%"))?;
    engine.compute_custom_score(&metrics)?;
    engine.compute_orthogonality_factor(&metrics)?;
    engine.create_correlation_groups(cli.threshold, cli.tolerance);
    engine.compute_suggested_score()?;

    engine.set_use_suggested_score(cli.use_suggested_score);
    if !cli.use_suggested_score {
        engine.set_orthogonality_value(MetricKey::ComputedScore)?;
    }
    engine.compute_practical_2d_peak_capacity();
    engine.create_results_table();
    if !has_capacities {
        engine.rank_by(MetricKey::OrthogonalityValue)?;
    }

    Ok(RunReport {
        status: engine.status(),
        normalization,
        peaks_dropped,
        results: engine.results_table().to_vec(),
        correlation_groups: engine.correlation_groups().to_vec(),
        header: ResultRow::header(),
        rows: engine.result_rows().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RetentionTimeTable {
        RetentionTimeTable::from_rows(
            vec!["HILIC-1".into(), "HILIC-2".into(), "RP-1".into(), "RP-2".into()],
            vec![
                ("p1".into(), vec![Some(1.2), Some(2.5), Some(3.0), Some(0.9)]),
                ("p2".into(), vec![Some(2.0), Some(1.1), Some(4.5), Some(2.4)]),
                ("p3".into(), vec![Some(3.1), Some(4.2), Some(1.0), Some(3.8)]),
                ("p4".into(), vec![Some(4.4), Some(3.3), Some(2.2), None]),
                ("p5".into(), vec![Some(5.0), Some(5.1), Some(3.9), Some(4.6)]),
                ("p6".into(), vec![Some(6.3), Some(0.8), Some(5.2), Some(1.7)]),
                ("p7".into(), vec![None, None, None, Some(2.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn cli_parses_metric_lists() {
        let cli = Cli::parse_from([
            "combo-selector",
            "table.json",
            "--metrics",
            "pearson_r,%FIT,convex_hull",
            "--normalization",
            "min_max",
        ]);
        assert_eq!(
            cli.metrics,
            vec![MetricKind::Pearson, MetricKind::PercentFit, MetricKind::ConvexHull]
        );
        assert_eq!(cli.normalization, Some(NormalizationMethod::MinMax));
        assert_eq!(cli.bins, 14);
    }

    #[test]
    fn full_pipeline_without_capacities_ranks_on_score() {
        let cli = Cli::parse_from(["combo-selector", "table.json", "--normalization", "min_max"]);
        let report = evaluate(
            &cli,
            RunInputs {
                retention_times: table(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.peaks_dropped, 1);
        assert_eq!(report.results.len(), 6);
        assert!(report.results.iter().all(|r| r.practical_2d_peak_capacity.is_none()));
        assert!(report.results.iter().any(|r| r.rank == Some(1)));
        assert!(!report.correlation_groups.is_empty());
        assert_eq!(report.header.len(), MetricKey::COUNT);
        assert_eq!(report.status, DataStatus::Loaded);
    }

    #[test]
    fn full_pipeline_with_capacities() {
        let cli = Cli::parse_from(["combo-selector", "table.json", "--use-suggested-score"]);
        let capacities: ConditionValues = [("HILIC-1", 30.0), ("HILIC-2", 45.0), ("RP-1", 60.0), ("RP-2", 55.0)]
            .into_iter()
            .collect();
        let report = evaluate(
            &cli,
            RunInputs {
                retention_times: table(),
                peak_capacities: Some(capacities),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.status, DataStatus::PeakCapacityLoaded);
        let first = &report.results[0];
        let expected = first.suggested_score.unwrap() * 30.0 * 45.0;
        assert!((first.practical_2d_peak_capacity.unwrap() - expected).abs() < 1e-9);
    }
}
