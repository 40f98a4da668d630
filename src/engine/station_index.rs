//! Immutable transit-station index.
//!
//! Uses an R-tree to answer nearest-station queries from transfer
//! detection. The index is built once and only read afterward, so it can
//! be shared across concurrently processed users.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::{geo_utils, TripPoint};

/// A transit entrance or stop in projected planar coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitStation {
    pub station_id: String,
    pub location: TripPoint,
}

impl TransitStation {
    /// Create a station record.
    pub fn new(station_id: &str, location: TripPoint) -> Self {
        Self {
            station_id: station_id.to_string(),
            location,
        }
    }
}

impl RTreeObject for TransitStation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.x, self.location.y])
    }
}

impl PointDistance for TransitStation {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.location.x - point[0];
        let dy = self.location.y - point[1];
        dx * dx + dy * dy
    }
}

/// Nearest-neighbor index over transit stations.
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    tree: RTree<TransitStation>,
}

impl StationIndex {
    /// Build the index from a set of stations.
    pub fn new(stations: Vec<TransitStation>) -> Self {
        Self {
            tree: RTree::bulk_load(stations),
        }
    }

    /// Find the station nearest to a point.
    ///
    /// Returns the planar distance in meters and the matched station, or
    /// `None` when the index is empty.
    pub fn nearest(&self, point: &TripPoint) -> Option<(f64, &TransitStation)> {
        self.tree
            .nearest_neighbor(&[point.x, point.y])
            .map(|station| (geo_utils::distance(&station.location, point), station))
    }

    /// Number of indexed stations.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
