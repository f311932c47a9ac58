//! Configuration module for the orthogonality engine.

pub mod analysis;

mod debug; // Private: files use crate::config::PRINT_* via the re-export below
pub use debug::*;

// Re-export commonly used items
pub use analysis::{ANALYSIS, AnalysisConfig};
