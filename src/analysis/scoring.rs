use anyhow::{Result, anyhow};

use crate::models::{CorrelationGroup, MetricKey, MetricKind, ScoreRecord};

fn metric_value(record: &ScoreRecord, kind: MetricKind) -> Result<f64> {
    record
        .get(kind.key())
        .ok_or_else(|| anyhow!("'{}' has not been computed", kind.display_name()))
}

/// Mean of a caller-chosen set of metrics. `None` for an empty selection.
pub fn custom_score(record: &ScoreRecord, metrics: &[MetricKind]) -> Result<Option<f64>> {
    if metrics.is_empty() {
        return Ok(None);
    }
    let sum = metrics
        .iter()
        .map(|&kind| metric_value(record, kind))
        .sum::<Result<f64>>()?;
    Ok(Some(sum / metrics.len() as f64))
}

/// Product of a caller-chosen set of metrics. `None` for an empty selection.
pub fn orthogonality_factor(record: &ScoreRecord, metrics: &[MetricKind]) -> Result<Option<f64>> {
    if metrics.is_empty() {
        return Ok(None);
    }
    let product = metrics
        .iter()
        .map(|&kind| metric_value(record, kind))
        .product::<Result<f64>>()?;
    Ok(Some(product))
}

/// Mean of the group means, so that redundant metrics count once. `None` without groups.
pub fn suggested_score(record: &ScoreRecord, groups: &[CorrelationGroup]) -> Result<Option<f64>> {
    let groups: Vec<&CorrelationGroup> = groups.iter().filter(|g| !g.members.is_empty()).collect();
    if groups.is_empty() {
        return Ok(None);
    }

    let mut total = 0.0;
    for group in &groups {
        let sum = group
            .members
            .iter()
            .map(|&kind| metric_value(record, kind))
            .sum::<Result<f64>>()?;
        total += sum / group.members.len() as f64;
    }
    Ok(Some(total / groups.len() as f64))
}

/// Which score drives the practical 2D peak capacity.
pub fn driving_score_key(use_suggested_score: bool) -> MetricKey {
    if use_suggested_score {
        MetricKey::SuggestedScore
    } else {
        MetricKey::ComputedScore
    }
}

/// Chosen score × hypothetical 2D peak capacity, when the pair carries one.
pub fn practical_peak_capacity(record: &ScoreRecord, use_suggested_score: bool) -> Option<f64> {
    let capacity = record.get(MetricKey::PeakCapacity2d)?;
    let score = record.get(driving_score_key(use_suggested_score))?;
    Some(score * capacity)
}
