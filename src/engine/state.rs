use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::MetricKind;

/// Lifecycle of the loaded data.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum DataStatus {
    #[default]
    NoData,
    Loaded,
    PeakCapacityLoaded,
    Error,
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DataStatus::NoData => "no_data",
            DataStatus::Loaded => "loaded",
            DataStatus::PeakCapacityLoaded => "peak_capacity_loaded",
            DataStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Which metric kinds currently hold valid values for every pair.
///
/// A kind is either computed or not; there is no partial state. Anything that
/// changes the series (load, normalisation, NaN cleaning) clears the lot.
#[derive(Debug, Clone, Default)]
pub struct MetricState {
    computed: BTreeSet<MetricKind>,
}

impl MetricState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_computed(&self, kind: MetricKind) -> bool {
        self.computed.contains(&kind)
    }

    /// Mark `kind` and every kind produced by the same computer run.
    pub fn mark_computed(&mut self, kind: MetricKind) {
        self.computed.insert(kind);
        self.computed.extend(kind.computed_together().iter().copied());
    }

    pub fn reset(&mut self, kinds: impl IntoIterator<Item = MetricKind>) {
        for kind in kinds {
            self.computed.remove(&kind);
        }
    }

    pub fn reset_all(&mut self) {
        self.computed.clear();
    }
}
