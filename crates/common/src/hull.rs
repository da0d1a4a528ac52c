use crate::geometry::{CoordinateSpace, Point};
use std::cmp::Ordering;

fn cross<S: CoordinateSpace>(o: &Point<S>, a: &Point<S>, b: &Point<S>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull of a point set using Andrew's monotone chain.
///
/// The result starts at the lowest-x (then lowest-y) point and runs in a
/// single consistent winding. Duplicate and collinear points are dropped.
/// Fewer than three distinct points are returned as-is after deduplication.
pub fn convex_hull<S: CoordinateSpace>(points: &[Point<S>]) -> Vec<Point<S>> {
    let mut sorted: Vec<Point<S>> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    sorted.dedup_by(|a, b| a.x == b.x && a.y == b.y);

    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point<S>> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point<S>> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    // Last point of each chain is the first point of the other
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
