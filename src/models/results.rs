use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::models::metric::{MetricKey, MetricKind};

/// One cell of the flat result table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Number(v) => Some(*v),
            Cell::Null | Cell::Text(_) => None,
        }
    }
}

/// Flat row of a pair, one cell per `MetricKey` in table order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub cells: Vec<Cell>,
}

impl ResultRow {
    /// Identity cells filled, aggregate scores at zero, everything else null.
    pub fn new(set_number: usize, title: &str, nb_peaks: usize) -> Self {
        let mut cells = vec![Cell::Null; MetricKey::COUNT];
        cells[MetricKey::SetNumber.table_index()] = Cell::Integer(set_number as i64);
        cells[MetricKey::Title.table_index()] = Cell::Text(title.to_string());
        cells[MetricKey::NbPeaks.table_index()] = Cell::Integer(nb_peaks as i64);
        for key in MetricKey::aggregate_scores() {
            cells[key.table_index()] = Cell::Number(0.0);
        }
        Self { cells }
    }

    pub fn set(&mut self, key: MetricKey, cell: Cell) {
        self.cells[key.table_index()] = cell;
    }

    pub fn set_number_value(&mut self, key: MetricKey, value: f64) {
        self.set(key, Cell::Number(value));
    }

    /// Put `key` back to its load-time value: zero for aggregate scores, null otherwise.
    pub fn reset(&mut self, key: MetricKey) {
        let cell = if MetricKey::aggregate_scores().contains(&key) {
            Cell::Number(0.0)
        } else {
            Cell::Null
        };
        self.set(key, cell);
    }

    pub fn get(&self, key: MetricKey) -> &Cell {
        &self.cells[key.table_index()]
    }

    pub fn number(&self, key: MetricKey) -> Option<f64> {
        self.get(key).as_f64()
    }

    /// Header of the flat table, in cell order.
    pub fn header() -> Vec<&'static str> {
        MetricKey::iter().map(MetricKey::key).collect()
    }
}

/// Scored values of one pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub values: BTreeMap<MetricKey, f64>,
}

impl Default for ScoreRecord {
    fn default() -> Self {
        Self {
            values: MetricKey::aggregate_scores().into_iter().map(|k| (k, 0.0)).collect(),
        }
    }
}

impl ScoreRecord {
    /// Store `value` under `key` when the key is a score. Returns whether it was stored.
    pub fn set(&mut self, key: MetricKey, value: f64) -> bool {
        if !key.include_in_score() {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Aggregate scores go back to zero, metric values are removed.
    pub fn reset(&mut self, key: MetricKey) {
        if MetricKey::aggregate_scores().contains(&key) {
            self.values.insert(key, 0.0);
        } else {
            self.values.remove(&key);
        }
    }

    pub fn computed_score(&self) -> Option<f64> {
        self.get(MetricKey::ComputedScore)
    }

    pub fn suggested_score(&self) -> Option<f64> {
        self.get(MetricKey::SuggestedScore)
    }

    pub fn orthogonality_value(&self) -> Option<f64> {
        self.get(MetricKey::OrthogonalityValue)
    }
}

/// A set of mutually correlated metrics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CorrelationGroup {
    pub label: String,
    pub members: Vec<MetricKind>,
}

/// Spreadsheet-style label of the `index`-th group: A..Z, AA, AB, ...
pub fn group_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Metric×metric Pearson matrix over pairs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CorrelationMatrix {
    pub metrics: Vec<MetricKind>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: MetricKind, b: MetricKind) -> Option<f64> {
        let i = self.metrics.iter().position(|&m| m == a)?;
        let j = self.metrics.iter().position(|&m| m == b)?;
        Some(self.values[i][j])
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricTableRow {
    pub set_number: usize,
    pub title: String,
    /// One value per `MetricTable::metrics` entry, NaN when not available.
    pub values: Vec<f64>,
}

/// Computed metrics side by side, one row per pair.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    pub metrics: Vec<MetricKind>,
    pub rows: Vec<MetricTableRow>,
}

impl MetricTable {
    pub fn column(&self, metric: MetricKind) -> Option<Vec<f64>> {
        let idx = self.metrics.iter().position(|&m| m == metric)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultsTableRow {
    pub set_number: usize,
    pub title: String,
    pub suggested_score: Option<f64>,
    pub computed_score: Option<f64>,
    pub practical_2d_peak_capacity: Option<f64>,
    pub rank: Option<usize>,
}
