// Orthogonality algorithms: normalisation, per-pair metrics, scoring, grouping and ranking
pub mod correlation_groups;
pub mod metrics;
pub mod normalization;
pub mod ranking;
pub mod scoring;

// Re-export commonly used types
pub use metrics::{MetricContext, computer_for};
pub use normalization::{NanPolicy, NormalizationMethod, NormalizationReport};
