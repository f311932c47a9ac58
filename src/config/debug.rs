//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so release
//! builds remain quiet.

/// Emit one line per pair as each metric computer finishes.
pub const PRINT_PAIR_METRICS: bool = false;

/// Emit the normalisation summary (per-column extrema, blanked columns).
pub const PRINT_NORMALIZATION: bool = false;

/// Emit candidate groups and final components while grouping correlated metrics.
pub const PRINT_CORRELATION_GROUPS: bool = false;

/// Emit weighted progress updates while computing requested metrics.
pub const PRINT_PROGRESS: bool = false;

/// Emit timings for the parallel %FIT fan-out.
pub const PRINT_PERCENT_FIT_TIMINGS: bool = false;
