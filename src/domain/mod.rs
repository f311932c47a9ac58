// Domain types and value objects
pub mod combination;
pub mod retention_table;

// Re-export commonly used types
pub use combination::{ConditionPair, enumerate_pairs};
pub use retention_table::{ConditionValues, NormalizedRetentionTimeTable, RetentionTimeTable};
