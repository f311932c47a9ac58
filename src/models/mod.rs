// Data model of the orthogonality engine
// Pure data: metric registry, pair store entries and result tables

pub mod metric;
pub mod pair;
pub mod results;

// Re-export key types for convenience
pub use metric::{MetricKey, MetricKind};
pub use pair::{BundleUpdate, MetricBundle, Pair, PairDelta, PeakCapacities};
pub use results::{
    Cell, CorrelationGroup, CorrelationMatrix, MetricTable, MetricTableRow, ResultRow, ResultsTableRow,
    ScoreRecord,
};
