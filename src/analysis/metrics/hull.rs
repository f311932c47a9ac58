use std::collections::BTreeMap;

use anyhow::Result;

use super::{MetricContext, for_each_pair};
use crate::models::pair::{BundleUpdate, HullGeometry};
use crate::models::{MetricKey, Pair, PairDelta};

/// Convex hull area of the point cloud. The unit square has area 1, so the
/// area is also the relative coverage of the retention space.
pub fn convex_hull(pairs: &BTreeMap<usize, Pair>, _ctx: &MetricContext) -> Result<Vec<PairDelta>> {
    for_each_pair(pairs, |pair| {
        let points: Vec<[f64; 2]> = pair.points().map(|(x, y)| [x, y]).collect();
        let hull = hull_geometry(&points);
        Ok(PairDelta::new(pair.set_number)
            .with_value(MetricKey::ConvexHull, hull.area)
            .with_update(BundleUpdate::Hull(hull)))
    })
}

pub fn hull_geometry(points: &[[f64; 2]]) -> HullGeometry {
    let mut distinct = points.to_vec();
    distinct.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    distinct.dedup();

    let vertices = monotone_chain(&distinct);
    // Fewer than three hull vertices means every point is on one line
    if vertices.len() < 3 {
        return HullGeometry {
            points: distinct,
            ..Default::default()
        };
    }

    let edges = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
        .collect();
    let area = shoelace_area(&vertices);

    HullGeometry {
        points: distinct,
        vertices,
        edges,
        area,
    }
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Andrew's monotone chain over sorted, distinct points. Counter-clockwise,
/// collinear points on the boundary dropped.
fn monotone_chain(sorted: &[[f64; 2]]) -> Vec<[f64; 2]> {
    if sorted.len() < 3 {
        return sorted.to_vec();
    }

    let mut lower: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
    for &p in sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn shoelace_area(vertices: &[[f64; 2]]) -> f64 {
    let twice: f64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::metrics::test_support::approx_eq;

    #[test]
    fn unit_square_corners_have_area_one() {
        let hull = hull_geometry(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5]]);
        assert!(approx_eq(hull.area, 1.0, 1e-12));
        assert_eq!(hull.vertices.len(), 4);
        assert_eq!(hull.edges.len(), 4);
    }

    #[test]
    fn collinear_points_have_no_hull() {
        let hull = hull_geometry(&[[0.0, 0.0], [0.5, 0.5], [1.0, 1.0], [0.25, 0.25]]);
        assert_eq!(hull.area, 0.0);
        assert!(hull.vertices.is_empty());
    }

    #[test]
    fn duplicates_collapse_before_hulling() {
        let hull = hull_geometry(&[[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(hull.area, 0.0);
        assert_eq!(hull.points.len(), 2);
    }

    #[test]
    fn triangle_area() {
        let hull = hull_geometry(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert!(approx_eq(hull.area, 0.5, 1e-12));
    }
}
