//! Spatial flow clustering engine.
//!
//! Groups near-duplicate origin-destination trips into flow clusters using
//! an R-tree midpoint index for neighbor search and a normalized
//! endpoint-gap dissimilarity for merge decisions.
//!
//! Clusters live in an arena indexed by stable id. A merge absorbs one
//! cluster into a survivor and leaves a tombstone redirect behind, so a
//! trip's initial cluster id always resolves to its current cluster.

use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{CommuteFlowError, Result};
use crate::{geo_utils, FlowGeometry, SpatialConfig, TripRecord};

/// Stable identifier of a spatial flow cluster within its arena.
pub type ClusterId = usize;

/// A group of trips sharing an approximate origin-destination pair.
///
/// The representative endpoints are always the unweighted mean of every
/// member trip's corresponding endpoint, recomputed in full on each
/// membership change. This makes the terminal centroid independent of
/// merge order.
#[derive(Debug, Clone)]
pub struct SpatialFlowCluster {
    /// Arena id, never reused after absorption
    pub id: ClusterId,
    /// Representative origin-destination segment
    pub flow: FlowGeometry,
    members: BTreeMap<String, TripRecord>,
}

impl SpatialFlowCluster {
    /// Create a singleton cluster from one trip.
    pub fn from_trip(id: ClusterId, trip: &TripRecord) -> Self {
        let mut members = BTreeMap::new();
        members.insert(trip.trip_id.clone(), trip.clone());
        Self {
            id,
            flow: trip.flow(),
            members,
        }
    }

    /// Human-readable cluster label, e.g. `sfc007`.
    pub fn label(&self) -> String {
        format!("sfc{:03}", self.id)
    }

    /// Number of member trips.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member trips keyed by trip id.
    pub fn members(&self) -> &BTreeMap<String, TripRecord> {
        &self.members
    }

    /// Check whether a trip belongs to this cluster.
    pub fn contains_trip(&self, trip_id: &str) -> bool {
        self.members.contains_key(trip_id)
    }

    /// Absorb a membership payload and recompute the representative flow.
    ///
    /// Duplicate trip ids are idempotent: an id already present keeps its
    /// existing detail and is not double-counted. An empty payload is
    /// rejected before any mutation occurs.
    pub fn absorb(&mut self, payload: &BTreeMap<String, TripRecord>) -> Result<()> {
        if payload.is_empty() {
            return Err(CommuteFlowError::EmptyMembership {
                cluster_id: self.label(),
            });
        }

        for (trip_id, record) in payload {
            self.members
                .entry(trip_id.clone())
                .or_insert_with(|| record.clone());
        }
        self.recompute_flow();
        Ok(())
    }

    /// Recompute both endpoints as the unweighted mean over all members.
    fn recompute_flow(&mut self) {
        let origin = geo_utils::mean_point(self.members.values().map(|t| &t.origin));
        let destination = geo_utils::mean_point(self.members.values().map(|t| &t.destination));
        if let (Some(origin), Some(destination)) = (origin, destination) {
            self.flow = FlowGeometry::new(origin, destination);
        }
    }
}

/// Arena slot: a live cluster or a redirect to the survivor that absorbed it.
#[derive(Debug, Clone)]
enum Slot {
    Active(SpatialFlowCluster),
    Absorbed(ClusterId),
}

/// Arena of spatial flow clusters with tombstone redirects.
#[derive(Debug, Clone, Default)]
pub struct SpatialClusterSet {
    slots: Vec<Slot>,
}

impl SpatialClusterSet {
    /// Create an empty cluster set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a singleton cluster for a trip and return its id.
    pub fn insert_for_trip(&mut self, trip: &TripRecord) -> ClusterId {
        let id = self.slots.len();
        self.slots.push(Slot::Active(SpatialFlowCluster::from_trip(id, trip)));
        id
    }

    /// Follow redirects from an absorbed id to its surviving cluster id.
    pub fn resolve(&self, mut id: ClusterId) -> ClusterId {
        while let Some(Slot::Absorbed(survivor)) = self.slots.get(id) {
            id = *survivor;
        }
        id
    }

    /// Look up a cluster, resolving absorbed ids to their survivor.
    pub fn get(&self, id: ClusterId) -> Option<&SpatialFlowCluster> {
        match self.slots.get(self.resolve(id)) {
            Some(Slot::Active(cluster)) => Some(cluster),
            _ => None,
        }
    }

    /// Merge two clusters; the survivor keeps the lower resolved id.
    ///
    /// Returns the survivor's id. Merging a cluster with itself is a no-op.
    pub fn merge(&mut self, first: ClusterId, second: ClusterId) -> Result<ClusterId> {
        let a = self.resolve(first);
        let b = self.resolve(second);
        if a == b {
            return Ok(a);
        }
        let (survivor, absorbed) = if a < b { (a, b) } else { (b, a) };

        let payload = match &self.slots[absorbed] {
            Slot::Active(cluster) => cluster.members.clone(),
            Slot::Absorbed(_) => unreachable!("resolve returned an absorbed id"),
        };

        match &mut self.slots[survivor] {
            Slot::Active(cluster) => cluster.absorb(&payload)?,
            Slot::Absorbed(_) => unreachable!("resolve returned an absorbed id"),
        }

        // Tombstone only after the absorb succeeded, so a rejected payload
        // leaves both clusters untouched.
        self.slots[absorbed] = Slot::Absorbed(survivor);
        Ok(survivor)
    }

    /// Iterate over live clusters in id order.
    pub fn active(&self) -> impl Iterator<Item = &SpatialFlowCluster> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Active(cluster) => Some(cluster),
            Slot::Absorbed(_) => None,
        })
    }

    /// Number of live clusters.
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Total number of slots ever created (live + absorbed).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no clusters were ever created.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ============================================================================
// Neighbor search
// ============================================================================

/// Locator record for the midpoint R-tree: one per trip, fixed geometry.
#[derive(Debug, Clone)]
struct TripLocator {
    trip_id: String,
    initial_cluster: ClusterId,
    midpoint: [f64; 2],
    flow_length: f64,
}

impl RTreeObject for TripLocator {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.midpoint)
    }
}

impl PointDistance for TripLocator {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.midpoint[0] - point[0];
        let dy = self.midpoint[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================================
// Dissimilarity
// ============================================================================

/// Spatial dissimilarity coefficient between two flow clusters.
///
/// The endpoint gaps are normalized by a boundary radius proportional to
/// the shorter flow's length and capped at `max_boundary_radius`; a value
/// below 1.0 means the clusters are mergeable. Symmetric in its arguments.
///
/// A degenerate radius (zero-length flow) yields `f64::INFINITY`, i.e.
/// "never mergeable", rather than a division fault.
pub fn spatial_dissimilarity(
    c1: &SpatialFlowCluster,
    c2: &SpatialFlowCluster,
    config: &SpatialConfig,
) -> f64 {
    let min_length = c1.flow.length().min(c2.flow.length());
    let radius = (min_length * config.size_coefficient).min(config.max_boundary_radius);
    if radius <= 0.0 {
        return f64::INFINITY;
    }

    let origin_gap = geo_utils::distance(&c1.flow.origin, &c2.flow.origin) / radius;
    let destination_gap =
        geo_utils::distance(&c1.flow.destination, &c2.flow.destination) / radius;
    (origin_gap * origin_gap + destination_gap * destination_gap).sqrt()
}

// ============================================================================
// Clustering driver
// ============================================================================

/// Cluster a user's trips into spatial flow clusters.
///
/// Every trip starts as a singleton cluster. The loop repeatedly picks the
/// globally best mergeable pair — lowest dissimilarity below 1.0 among
/// pairs whose trips pass the midpoint neighbor query, ties broken by the
/// lowest cluster-id pair — and merges it, until no eligible pair remains.
pub fn cluster_trips(trips: &[TripRecord], config: &SpatialConfig) -> Result<SpatialClusterSet> {
    config.validate()?;

    let mut clusters = SpatialClusterSet::new();
    let locators: Vec<TripLocator> = trips
        .iter()
        .map(|trip| {
            let id = clusters.insert_for_trip(trip);
            let midpoint = trip.flow().midpoint();
            TripLocator {
                trip_id: trip.trip_id.clone(),
                initial_cluster: id,
                midpoint: [midpoint.x, midpoint.y],
                flow_length: trip.flow().length(),
            }
        })
        .collect();

    if locators.len() < 2 {
        return Ok(clusters);
    }

    let tree = RTree::bulk_load(locators.clone());

    loop {
        let best = find_best_pair(&clusters, &locators, &tree, config);
        match best {
            Some((dissimilarity, a, b)) => {
                let survivor = clusters.merge(a, b)?;
                debug!(
                    "merged spatial clusters {a} and {b} into {survivor} \
                     (dissimilarity {dissimilarity:.3})"
                );
            }
            None => break,
        }
    }

    Ok(clusters)
}

/// Find the best eligible cluster pair under the neighbor query.
fn find_best_pair(
    clusters: &SpatialClusterSet,
    locators: &[TripLocator],
    tree: &RTree<TripLocator>,
    config: &SpatialConfig,
) -> Option<(f64, ClusterId, ClusterId)> {
    let mut best: Option<(f64, ClusterId, ClusterId)> = None;

    for locator in locators {
        let this_cluster = clusters.resolve(locator.initial_cluster);
        let search_radius = SQRT_2 * locator.flow_length * config.size_coefficient;
        if search_radius <= 0.0 {
            continue;
        }

        for neighbor in tree.locate_within_distance(locator.midpoint, search_radius * search_radius)
        {
            if neighbor.trip_id == locator.trip_id {
                continue;
            }
            let other_cluster = clusters.resolve(neighbor.initial_cluster);
            if other_cluster == this_cluster {
                continue;
            }

            let (c1, c2) = match (clusters.get(this_cluster), clusters.get(other_cluster)) {
                (Some(c1), Some(c2)) => (c1, c2),
                _ => continue,
            };

            let dissimilarity = spatial_dissimilarity(c1, c2, config);
            if dissimilarity >= 1.0 {
                continue;
            }

            let pair = (
                this_cluster.min(other_cluster),
                this_cluster.max(other_cluster),
            );
            let better = match best {
                None => true,
                Some((best_d, best_a, best_b)) => {
                    dissimilarity < best_d
                        || (dissimilarity == best_d && pair < (best_a, best_b))
                }
            };
            if better {
                best = Some((dissimilarity, pair.0, pair.1));
            }
        }
    }

    best
}
