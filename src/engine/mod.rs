pub mod core;
pub mod state;

// Re-export key components
pub use core::OrthogonalityEngine;
pub use state::{DataStatus, MetricState};
