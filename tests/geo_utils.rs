//! Tests for geo_utils module

use commutematch::geo_utils::{distance, endpoints_far_apart, mean_point, midpoint};
use commutematch::{FlowGeometry, TripPoint};

#[test]
fn test_distance_identity() {
    let p = TripPoint::new(1234.5, -678.9);
    assert_eq!(distance(&p, &p), 0.0);
}

#[test]
fn test_distance_pythagorean() {
    let a = TripPoint::new(0.0, 0.0);
    let b = TripPoint::new(3.0, 4.0);
    assert_eq!(distance(&a, &b), 5.0);
    assert_eq!(distance(&b, &a), 5.0);
}

#[test]
fn test_triangle_inequality() {
    let points = [
        TripPoint::new(0.0, 0.0),
        TripPoint::new(100.0, 50.0),
        TripPoint::new(-30.0, 200.0),
        TripPoint::new(1000.0, -500.0),
    ];

    for a in &points {
        for b in &points {
            for c in &points {
                let direct = distance(a, c);
                let via = distance(a, b) + distance(b, c);
                assert!(direct <= via + 1e-9, "triangle inequality violated");
            }
        }
    }
}

#[test]
fn test_midpoint() {
    let a = TripPoint::new(0.0, 0.0);
    let b = TripPoint::new(10.0, 20.0);
    assert_eq!(midpoint(&a, &b), TripPoint::new(5.0, 10.0));
}

#[test]
fn test_mean_point() {
    let points = [
        TripPoint::new(0.0, 0.0),
        TripPoint::new(2.0, 2.0),
        TripPoint::new(4.0, 4.0),
    ];
    assert_eq!(mean_point(points.iter()), Some(TripPoint::new(2.0, 2.0)));

    let empty: [TripPoint; 0] = [];
    assert_eq!(mean_point(empty.iter()), None);
}

#[test]
fn test_endpoints_far_apart() {
    let flow1 = FlowGeometry::new(TripPoint::new(0.0, 0.0), TripPoint::new(0.0, 2000.0));
    let flow2 = FlowGeometry::new(TripPoint::new(5000.0, 0.0), TripPoint::new(6000.0, 0.0));
    assert!(endpoints_far_apart(&flow1, &flow2, 400.0));

    // Sharing an endpoint fails the separation test
    let flow3 = FlowGeometry::new(TripPoint::new(0.0, 100.0), TripPoint::new(8000.0, 0.0));
    assert!(!endpoints_far_apart(&flow1, &flow3, 400.0));
}
