use anyhow::{Result, bail};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::ANALYSIS;

/// One unordered pair of separation conditions, numbered in row-major order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConditionPair {
    pub set_number: usize,
    pub x_index: usize,
    pub y_index: usize,
    pub x_title: String,
    pub y_title: String,
}

impl ConditionPair {
    pub fn title(&self) -> String {
        format!("{} vs {}", self.x_title, self.y_title)
    }

    /// Coarse chromatographic mode tag, e.g. "HILIC|RPLC".
    pub fn condition_type(&self) -> String {
        format!("{}|{}", mode_label(self.x_index), mode_label(self.y_index))
    }
}

fn mode_label(column_index: usize) -> &'static str {
    let settings = &ANALYSIS.combination;
    if column_index < settings.first_mode_columns {
        settings.first_mode_label
    } else {
        settings.second_mode_label
    }
}

/// Enumerate every pair `(i, j)` with `i < j`, `i` outer, numbered from 1.
pub fn enumerate_pairs(conditions: &[String]) -> Result<Vec<ConditionPair>> {
    if conditions.len() < 2 {
        bail!(
            "At least two conditions are needed to build a combination (got {})",
            conditions.len()
        );
    }

    Ok((0..conditions.len())
        .tuple_combinations()
        .enumerate()
        .map(|(n, (x_index, y_index))| ConditionPair {
            set_number: n + 1,
            x_index,
            y_index,
            x_title: conditions[x_index].clone(),
            y_title: conditions[y_index].clone(),
        })
        .collect())
}
