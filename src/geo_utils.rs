//! Planar geometry primitives.
//!
//! All coordinates are projected meters, so distances are plain Euclidean.

use crate::{FlowGeometry, TripPoint};

/// Euclidean distance between two planar points in meters.
pub fn distance(p1: &TripPoint, p2: &TripPoint) -> f64 {
    ((p1.x - p2.x).powi(2) + (p1.y - p2.y).powi(2)).sqrt()
}

/// Midpoint of two planar points.
pub fn midpoint(p1: &TripPoint, p2: &TripPoint) -> TripPoint {
    TripPoint::new((p1.x + p2.x) / 2.0, (p1.y + p2.y) / 2.0)
}

/// Unweighted mean of a non-empty set of points.
///
/// Returns `None` for an empty input rather than dividing by zero.
pub fn mean_point<'a, I>(points: I) -> Option<TripPoint>
where
    I: IntoIterator<Item = &'a TripPoint>,
{
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for p in points {
        sum_x += p.x;
        sum_y += p.y;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(TripPoint::new(sum_x / count as f64, sum_y / count as f64))
}

/// Check that every pairing of the two flows' four endpoints is at least
/// `threshold` apart.
///
/// Used by the resolver to require that a complementary commuting leg
/// covers geographically distinct ground from the primary leg.
pub fn endpoints_far_apart(flow1: &FlowGeometry, flow2: &FlowGeometry, threshold: f64) -> bool {
    let endpoints1 = [flow1.origin, flow1.destination];
    let endpoints2 = [flow2.origin, flow2.destination];

    for p1 in &endpoints1 {
        for p2 in &endpoints2 {
            if distance(p1, p2) < threshold {
                return false;
            }
        }
    }
    true
}
