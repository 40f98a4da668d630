//! # Commute Pipeline
//!
//! Facade tying the three inference stages together for per-user batch
//! classification.
//!
//! ## Architecture
//!
//! The pipeline is composed of focused modules:
//! - `TripStore` - per-user trip storage
//! - `StationIndex` - immutable R-tree for nearest-station queries
//!
//! Within one user the stages run strictly forward: spatial clustering,
//! then spatiotemporal refinement, then candidate identification,
//! transfer detection, and resolution. Users share no state, so with the
//! `parallel` feature enabled they fan out across threads while the
//! station index is read concurrently.

pub mod station_index;
pub mod trip_store;

pub use station_index::{StationIndex, TransitStation};
pub use trip_store::TripStore;

use log::warn;

use crate::error::Result;
use crate::resolver::{
    detect_transfer, identify_candidate, resolve_user, DailyCommutingFlow, SimplifiedCommutingFlow,
};
use crate::spatial::cluster_trips;
use crate::temporal::{refine_cluster, TemporalSubCluster};
use crate::{PipelineConfig, TripRecord};

/// End-to-end commuting classification pipeline.
pub struct CommutePipeline {
    config: PipelineConfig,
    stations: StationIndex,
}

impl CommutePipeline {
    /// Create a pipeline with a validated configuration and station set.
    pub fn new(config: PipelineConfig, stations: Vec<TransitStation>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stations: StationIndex::new(stations),
        })
    }

    /// Current pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The station index used for transfer detection.
    pub fn stations(&self) -> &StationIndex {
        &self.stations
    }

    /// Classify one user's trips into a daily commuting flow.
    ///
    /// Returns `Ok(None)` when the trips yield no accepted round-trip
    /// candidate (too few trips, no reciprocal flows, or implausible
    /// timing).
    pub fn classify_trips(&self, trips: &[TripRecord]) -> Result<Option<DailyCommutingFlow>> {
        if trips.is_empty() {
            return Ok(None);
        }

        let clusters = cluster_trips(trips, &self.config.spatial)?;

        let mut sub_clusters: Vec<TemporalSubCluster> = Vec::new();
        for cluster in clusters.active() {
            sub_clusters.extend(refine_cluster(cluster, &self.config.temporal));
        }

        let candidates = self.collect_candidates(&sub_clusters);
        resolve_user(&candidates, &self.config.resolver)
    }

    /// Evaluate every distinct sub-cluster pair as a commuting candidate
    /// and run transfer detection on the accepted ones.
    fn collect_candidates(
        &self,
        sub_clusters: &[TemporalSubCluster],
    ) -> Vec<SimplifiedCommutingFlow> {
        let mut candidates = Vec::new();
        for i in 0..sub_clusters.len() {
            for j in (i + 1)..sub_clusters.len() {
                if let Some(mut candidate) =
                    identify_candidate(&sub_clusters[i], &sub_clusters[j], &self.config.resolver)
                {
                    detect_transfer(&mut candidate, &self.stations, &self.config.resolver);
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Classify every user in a store.
    ///
    /// Classification is caught at the per-user boundary: a failing user
    /// is logged and skipped, never retried, and does not affect other
    /// users. Results are returned in sorted user-id order.
    pub fn classify_store(&self, store: &TripStore) -> Vec<(String, DailyCommutingFlow)> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let users: Vec<(&String, &Vec<TripRecord>)> = store.iter().collect();
            let mut results: Vec<(String, DailyCommutingFlow)> = users
                .into_par_iter()
                .filter_map(|(user_id, trips)| self.classify_user_boundary(user_id, trips))
                .collect();
            results.sort_by(|a, b| a.0.cmp(&b.0));
            results
        }

        #[cfg(not(feature = "parallel"))]
        {
            store
                .iter()
                .filter_map(|(user_id, trips)| self.classify_user_boundary(user_id, trips))
                .collect()
        }
    }

    /// Per-user error boundary: log and skip on failure.
    fn classify_user_boundary(
        &self,
        user_id: &str,
        trips: &[TripRecord],
    ) -> Option<(String, DailyCommutingFlow)> {
        match self.classify_trips(trips) {
            Ok(Some(daily)) => Some((user_id.to_string(), daily)),
            Ok(None) => None,
            Err(e) => {
                warn!("skipping user '{user_id}': {e}");
                None
            }
        }
    }

    /// Pipeline statistics for a store.
    pub fn stats(&self, store: &TripStore) -> PipelineStats {
        PipelineStats {
            user_count: store.len(),
            trip_count: store.trip_count(),
            station_count: self.stations.len(),
        }
    }
}

/// Pipeline statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub user_count: usize,
    pub trip_count: usize,
    pub station_count: usize,
}
