use std::collections::{BTreeSet, VecDeque};

use itertools::iproduct;

use crate::config::PRINT_CORRELATION_GROUPS;
use crate::models::results::group_label;
use crate::models::{CorrelationGroup, CorrelationMatrix, MetricKind, MetricTable};
use crate::utils::maths_utils::pearson_r;

/// Pearson correlation between every two metric columns of `table`, over the
/// pairs where both values are finite. Constant columns give NaN.
pub fn correlation_matrix(table: &MetricTable) -> CorrelationMatrix {
    let n = table.metrics.len();
    let mut values = vec![vec![f64::NAN; n]; n];

    for (i, j) in iproduct!(0..n, 0..n) {
        if j < i {
            values[i][j] = values[j][i];
            continue;
        }
        let (a, b): (Vec<f64>, Vec<f64>) = table
            .rows
            .iter()
            .map(|row| (row.values[i], row.values[j]))
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .unzip();
        values[i][j] = pearson_r(&a, &b);
    }

    CorrelationMatrix {
        metrics: table.metrics.clone(),
        values,
    }
}

/// Group metrics whose absolute correlation reaches `threshold - tolerance`.
///
/// Every metric proposes a candidate group (itself plus its strongly correlated
/// peers); candidates sharing a metric are fused. Groups come out largest
/// first, ties broken by their first member, labelled A, B, ...
pub fn group_metrics(matrix: &CorrelationMatrix, threshold: f64, tolerance: f64) -> Vec<CorrelationGroup> {
    let cutoff = threshold - tolerance;

    let candidates: BTreeSet<Vec<MetricKind>> = matrix
        .metrics
        .iter()
        .enumerate()
        .map(|(i, &metric)| {
            let mut members: BTreeSet<MetricKind> = matrix
                .metrics
                .iter()
                .enumerate()
                .filter(|&(j, _)| matrix.values[i][j].abs() >= cutoff)
                .map(|(_, &other)| other)
                .collect();
            members.insert(metric);
            members.into_iter().collect()
        })
        .collect();

    let mut candidates: Vec<Vec<MetricKind>> = candidates.into_iter().collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    if PRINT_CORRELATION_GROUPS {
        for candidate in &candidates {
            log::info!("Candidate group: {candidate:?}");
        }
    }

    let mut groups = connected_components(&candidates);
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

    let groups: Vec<CorrelationGroup> = groups
        .into_iter()
        .enumerate()
        .map(|(idx, members)| CorrelationGroup {
            label: group_label(idx),
            members,
        })
        .collect();

    if PRINT_CORRELATION_GROUPS {
        for group in &groups {
            log::info!("Group {}: {:?}", group.label, group.members);
        }
    }
    groups
}

/// Breadth-first fusion of candidates that share at least one metric.
/// Members keep the order in which the search first met them.
fn connected_components(candidates: &[Vec<MetricKind>]) -> Vec<Vec<MetricKind>> {
    let mut visited = vec![false; candidates.len()];
    let mut components = Vec::new();

    for start in 0..candidates.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut members: Vec<MetricKind> = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &metric in &candidates[current] {
                if !members.contains(&metric) {
                    members.push(metric);
                }
            }
            for (next, other) in candidates.iter().enumerate() {
                if !visited[next] && other.iter().any(|m| candidates[current].contains(m)) {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        components.push(members);
    }
    components
}
