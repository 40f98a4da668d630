//! Tests for spatial flow clustering

use std::collections::BTreeMap;

use commutematch::spatial::{
    cluster_trips, spatial_dissimilarity, SpatialClusterSet, SpatialFlowCluster,
};
use commutematch::{CommuteFlowError, SpatialConfig, TripPoint, TripRecord};

fn make_trip(id: &str, ox: f64, oy: f64, dx: f64, dy: f64) -> TripRecord {
    TripRecord::new(
        id,
        TripPoint::new(ox, oy),
        TripPoint::new(dx, dy),
        "08:00:00",
        "08:20:00",
        "2023-05-08",
    )
    .unwrap()
}

#[test]
fn test_absorb_union_is_idempotent() {
    let trip_a = make_trip("trip-a", 0.0, 0.0, 1000.0, 0.0);
    let trip_b = make_trip("trip-b", 20.0, 0.0, 1020.0, 0.0);

    let mut cluster = SpatialFlowCluster::from_trip(0, &trip_a);

    // Payload contains an already-present member; it must not double-count.
    let mut payload = BTreeMap::new();
    payload.insert(trip_a.trip_id.clone(), trip_a.clone());
    payload.insert(trip_b.trip_id.clone(), trip_b.clone());

    cluster.absorb(&payload).unwrap();
    assert_eq!(cluster.member_count(), 2);
    assert!(cluster.contains_trip("trip-a"));
    assert!(cluster.contains_trip("trip-b"));

    // Absorbing the same payload again changes nothing.
    cluster.absorb(&payload).unwrap();
    assert_eq!(cluster.member_count(), 2);
}

#[test]
fn test_absorb_recomputes_full_mean() {
    let trip_a = make_trip("trip-a", 0.0, 0.0, 1000.0, 0.0);
    let trip_b = make_trip("trip-b", 40.0, 20.0, 1040.0, 20.0);

    let mut cluster = SpatialFlowCluster::from_trip(0, &trip_a);
    let mut payload = BTreeMap::new();
    payload.insert(trip_b.trip_id.clone(), trip_b.clone());
    cluster.absorb(&payload).unwrap();

    assert_eq!(cluster.flow.origin, TripPoint::new(20.0, 10.0));
    assert_eq!(cluster.flow.destination, TripPoint::new(1020.0, 10.0));
}

#[test]
fn test_absorb_rejects_empty_payload() {
    let trip = make_trip("trip-a", 0.0, 0.0, 1000.0, 0.0);
    let mut cluster = SpatialFlowCluster::from_trip(0, &trip);
    let before = cluster.flow;

    let result = cluster.absorb(&BTreeMap::new());
    assert!(matches!(
        result,
        Err(CommuteFlowError::EmptyMembership { .. })
    ));

    // No partial mutation
    assert_eq!(cluster.member_count(), 1);
    assert_eq!(cluster.flow, before);
}

#[test]
fn test_dissimilarity_is_symmetric() {
    let c1 = SpatialFlowCluster::from_trip(0, &make_trip("a", 0.0, 0.0, 1000.0, 0.0));
    let c2 = SpatialFlowCluster::from_trip(1, &make_trip("b", 60.0, 0.0, 1000.0, 80.0));
    let config = SpatialConfig::default();

    let d12 = spatial_dissimilarity(&c1, &c2, &config);
    let d21 = spatial_dissimilarity(&c2, &c1, &config);
    assert_eq!(d12, d21);
}

#[test]
fn test_dissimilarity_value() {
    // Flow length ~1000m caps the radius at 200m; endpoint gaps of 60m
    // and 80m then give sqrt(0.3^2 + 0.4^2) = 0.5.
    let c1 = SpatialFlowCluster::from_trip(0, &make_trip("a", 0.0, 0.0, 1000.0, 0.0));
    let c2 = SpatialFlowCluster::from_trip(1, &make_trip("b", 60.0, 0.0, 1000.0, 80.0));

    let d = spatial_dissimilarity(&c1, &c2, &SpatialConfig::default());
    assert!((d - 0.5).abs() < 0.01, "got {d}");
}

#[test]
fn test_dissimilarity_guards_zero_length_flow() {
    let degenerate = SpatialFlowCluster::from_trip(0, &make_trip("a", 500.0, 500.0, 500.0, 500.0));
    let other = SpatialFlowCluster::from_trip(1, &make_trip("b", 0.0, 0.0, 1000.0, 0.0));

    let d = spatial_dissimilarity(&degenerate, &other, &SpatialConfig::default());
    assert!(d.is_infinite());
}

#[test]
fn test_cluster_trips_merges_near_duplicates() {
    let trips = vec![
        make_trip("trip-1", 0.0, 0.0, 1000.0, 0.0),
        make_trip("trip-2", 20.0, 10.0, 1020.0, 10.0),
        make_trip("trip-3", -20.0, -10.0, 980.0, -10.0),
        // A different OD pair entirely
        make_trip("trip-4", 5000.0, 5000.0, 8000.0, 5000.0),
    ];

    let clusters = cluster_trips(&trips, &SpatialConfig::default()).unwrap();
    assert_eq!(clusters.active_count(), 2);

    let merged = clusters
        .active()
        .find(|c| c.member_count() == 3)
        .expect("three near-duplicate trips should share a cluster");

    // Centroid is the unweighted mean over all three member trips
    assert_eq!(merged.flow.origin, TripPoint::new(0.0, 0.0));
    assert_eq!(merged.flow.destination, TripPoint::new(1000.0, 0.0));

    let singleton = clusters
        .active()
        .find(|c| c.member_count() == 1)
        .expect("the distant trip stays alone");
    assert!(singleton.contains_trip("trip-4"));
}

#[test]
fn test_terminal_centroid_is_order_independent() {
    let trips = vec![
        make_trip("trip-1", 0.0, 0.0, 1000.0, 0.0),
        make_trip("trip-2", 20.0, 10.0, 1020.0, 10.0),
        make_trip("trip-3", -20.0, -10.0, 980.0, -10.0),
    ];
    let mut reversed = trips.clone();
    reversed.reverse();

    let config = SpatialConfig::default();
    let forward = cluster_trips(&trips, &config).unwrap();
    let backward = cluster_trips(&reversed, &config).unwrap();

    let forward_cluster = forward.active().next().unwrap();
    let backward_cluster = backward.active().next().unwrap();

    assert_eq!(forward.active_count(), 1);
    assert_eq!(backward.active_count(), 1);
    assert_eq!(forward_cluster.flow.origin, backward_cluster.flow.origin);
    assert_eq!(
        forward_cluster.flow.destination,
        backward_cluster.flow.destination
    );
}

#[test]
fn test_absorbed_id_redirects_to_survivor() {
    let trip_a = make_trip("trip-a", 0.0, 0.0, 1000.0, 0.0);
    let trip_b = make_trip("trip-b", 20.0, 0.0, 1020.0, 0.0);

    let mut set = SpatialClusterSet::new();
    let a = set.insert_for_trip(&trip_a);
    let b = set.insert_for_trip(&trip_b);

    let survivor = set.merge(a, b).unwrap();
    assert_eq!(survivor, a);
    assert_eq!(set.resolve(b), a);
    assert_eq!(set.active_count(), 1);

    // Lookups through the absorbed id land on the survivor
    let via_b = set.get(b).unwrap();
    assert_eq!(via_b.id, a);
    assert_eq!(via_b.member_count(), 2);

    // Merging an already-absorbed pair is a no-op
    assert_eq!(set.merge(a, b).unwrap(), a);
    assert_eq!(set.active_count(), 1);
}

#[test]
fn test_cluster_trips_validates_config() {
    let trips = vec![make_trip("trip-1", 0.0, 0.0, 1000.0, 0.0)];
    let config = SpatialConfig {
        size_coefficient: -1.0,
        ..SpatialConfig::default()
    };

    let result = cluster_trips(&trips, &config);
    assert!(matches!(
        result,
        Err(CommuteFlowError::InvalidConfiguration { .. })
    ));
}
