//! # Commute Match
//!
//! Commuting-pattern classification for raw bike-trip records.
//!
//! This library provides:
//! - Spatial flow clustering of near-duplicate origin-destination trips
//! - Spatiotemporal refinement into time-of-day usage patterns
//! - Rule-based commuting resolution with transit transfer detection
//! - A pipeline facade for per-user batch classification
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel per-user classification with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use commutematch::{CommutePipeline, PipelineConfig, TripPoint, TripRecord};
//!
//! let trips = vec![
//!     TripRecord::new(
//!         "trip-1",
//!         TripPoint::new(0.0, 0.0),
//!         TripPoint::new(1000.0, 0.0),
//!         "08:00:00",
//!         "08:20:00",
//!         "2023-05-08",
//!     )
//!     .unwrap(),
//!     TripRecord::new(
//!         "trip-2",
//!         TripPoint::new(1000.0, 0.0),
//!         TripPoint::new(0.0, 0.0),
//!         "18:00:00",
//!         "18:25:00",
//!         "2023-05-08",
//!     )
//!     .unwrap(),
//! ];
//!
//! let pipeline = CommutePipeline::new(PipelineConfig::default(), vec![]).unwrap();
//! let daily = pipeline.classify_trips(&trips).unwrap();
//! if let Some(flow) = daily {
//!     println!("category: {}", flow.commuting_category);
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{CommuteFlowError, Result};

// Geometry and circular-time primitives
pub mod geo_utils;
pub mod time_utils;

// Spatial flow clustering
pub mod spatial;
pub use spatial::{cluster_trips, SpatialClusterSet, SpatialFlowCluster};

// Spatiotemporal refinement
pub mod temporal;
pub use temporal::{calculate_temporal_similarity, refine_cluster, TemporalSubCluster, TimeSpan};

// Commuting resolver (rule engine)
pub mod resolver;
pub use resolver::{
    detect_transfer, identify_candidate, resolve_user, CommutingCategory, DailyCommutingFlow,
    SimplifiedCommutingFlow, Transfer, TransferType,
};

// Pipeline facade with per-user stores and the station index
pub mod engine;
pub use engine::{CommutePipeline, PipelineStats, StationIndex, TransitStation, TripStore};

// ============================================================================
// Core Types
// ============================================================================

/// A point in projected planar coordinates (meters).
///
/// # Example
/// ```
/// use commutematch::TripPoint;
/// let point = TripPoint::new(12_683_500.0, 2_575_200.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripPoint {
    pub x: f64,
    pub y: f64,
}

impl TripPoint {
    /// Create a new planar point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check that both coordinates are finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A straight origin-destination flow segment.
///
/// Clusters and commuting flows all share this two-point geometry;
/// the representative endpoints move as memberships change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowGeometry {
    pub origin: TripPoint,
    pub destination: TripPoint,
}

impl FlowGeometry {
    /// Create a flow segment from its two endpoints.
    pub fn new(origin: TripPoint, destination: TripPoint) -> Self {
        Self {
            origin,
            destination,
        }
    }

    /// Straight-line length of the flow in meters.
    pub fn length(&self) -> f64 {
        geo_utils::distance(&self.origin, &self.destination)
    }

    /// Midpoint of the flow segment.
    pub fn midpoint(&self) -> TripPoint {
        geo_utils::midpoint(&self.origin, &self.destination)
    }

    /// Unweighted pairwise mean of two flows, endpoint by endpoint.
    ///
    /// This is the temporal-merge geometry rule; spatial clusters instead
    /// recompute their endpoints as the mean over all member trips.
    pub fn pairwise_mean(&self, other: &FlowGeometry) -> FlowGeometry {
        FlowGeometry::new(
            geo_utils::midpoint(&self.origin, &other.origin),
            geo_utils::midpoint(&self.destination, &other.destination),
        )
    }
}

/// An immutable bike-trip record.
///
/// Wall-clock times are validated and converted once at construction;
/// malformed records are rejected here, never inside the clustering
/// engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Unique identifier for the trip
    pub trip_id: String,
    /// Trip origin in projected meters
    pub origin: TripPoint,
    /// Trip destination in projected meters
    pub destination: TripPoint,
    /// Wall-clock start time, "HH:MM:SS"
    pub start_time: String,
    /// Wall-clock end time, "HH:MM:SS"
    pub end_time: String,
    /// Start time as fractional hour-of-day
    pub start_hour: f64,
    /// End time as fractional hour-of-day
    pub end_hour: f64,
    /// Calendar date, "YYYY-MM-DD"
    pub date: String,
}

impl TripRecord {
    /// Create a validated trip record.
    ///
    /// Returns [`CommuteFlowError::InvalidRecord`] when a coordinate is
    /// non-finite or a time string does not parse as HH:MM:SS.
    pub fn new(
        trip_id: &str,
        origin: TripPoint,
        destination: TripPoint,
        start_time: &str,
        end_time: &str,
        date: &str,
    ) -> Result<Self> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(CommuteFlowError::InvalidRecord {
                trip_id: trip_id.to_string(),
                reason: "non-finite endpoint coordinates".to_string(),
            });
        }

        let start_hour =
            time_utils::time_to_hour(start_time).map_err(|e| CommuteFlowError::InvalidRecord {
                trip_id: trip_id.to_string(),
                reason: e.to_string(),
            })?;
        let end_hour =
            time_utils::time_to_hour(end_time).map_err(|e| CommuteFlowError::InvalidRecord {
                trip_id: trip_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            trip_id: trip_id.to_string(),
            origin,
            destination,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            start_hour,
            end_hour,
            date: date.to_string(),
        })
    }

    /// The trip's straight origin-destination flow.
    pub fn flow(&self) -> FlowGeometry {
        FlowGeometry::new(self.origin, self.destination)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for spatial flow clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// Coefficient scaling the boundary radius relative to flow length.
    /// Default: 0.3
    pub size_coefficient: f64,

    /// Cap on the boundary radius in meters.
    /// Default: 200.0
    pub max_boundary_radius: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            size_coefficient: 0.3,
            max_boundary_radius: 200.0,
        }
    }
}

impl SpatialConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.size_coefficient.is_finite() || self.size_coefficient <= 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "size_coefficient must be positive, got {}",
                    self.size_coefficient
                ),
            });
        }
        if !self.max_boundary_radius.is_finite() || self.max_boundary_radius <= 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "max_boundary_radius must be positive, got {}",
                    self.max_boundary_radius
                ),
            });
        }
        Ok(())
    }
}

/// Configuration for spatiotemporal refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Half-width in hours by which each time span is expanded before
    /// similarity scoring. Default: 0.5
    pub expansion_coefficient: f64,

    /// Minimum temporal similarity for two sub-clusters to merge.
    /// Default: 0.5
    pub similarity_threshold: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            expansion_coefficient: 0.5,
            similarity_threshold: 0.5,
        }
    }
}

impl TemporalConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.expansion_coefficient.is_finite() || self.expansion_coefficient < 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "expansion_coefficient must be non-negative, got {}",
                    self.expansion_coefficient
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "similarity_threshold must be within [0, 1], got {}",
                    self.similarity_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Configuration for the commuting resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Anchor hour-of-day used to pick the tentative morning leg.
    /// Default: 8.0 (08:00)
    pub anchor_hour: f64,

    /// Boundary radius in meters for round-trip endpoint reciprocity.
    /// Default: 200.0
    pub boundary_radius: f64,

    /// Minimum working-hours gap between legs, in hours.
    /// Default: 4.0
    pub working_hours_threshold: f64,

    /// Maximum station distance in meters for a transfer match.
    /// Default: 50.0
    pub transfer_distance_threshold: f64,

    /// Coefficient scaling the leg-separation threshold relative to the
    /// shorter leg's length when pairing complementary legs.
    /// Default: 0.3
    pub separation_coefficient: f64,

    /// Start of the daytime transfer window, exclusive. Default: 6.0
    pub daytime_window_start: f64,

    /// End of the daytime transfer window, exclusive. Default: 23.5
    pub daytime_window_end: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            anchor_hour: 8.0,
            boundary_radius: 200.0,
            working_hours_threshold: 4.0,
            transfer_distance_threshold: 50.0,
            separation_coefficient: 0.3,
            daytime_window_start: 6.0,
            daytime_window_end: 23.5,
        }
    }
}

impl ResolverConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..24.0).contains(&self.anchor_hour) {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "anchor_hour must be within [0, 24), got {}",
                    self.anchor_hour
                ),
            });
        }
        if !self.boundary_radius.is_finite() || self.boundary_radius <= 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "boundary_radius must be positive, got {}",
                    self.boundary_radius
                ),
            });
        }
        if !self.working_hours_threshold.is_finite() || self.working_hours_threshold < 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "working_hours_threshold must be non-negative, got {}",
                    self.working_hours_threshold
                ),
            });
        }
        if !self.transfer_distance_threshold.is_finite() || self.transfer_distance_threshold <= 0.0
        {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "transfer_distance_threshold must be positive, got {}",
                    self.transfer_distance_threshold
                ),
            });
        }
        if !self.separation_coefficient.is_finite() || self.separation_coefficient <= 0.0 {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "separation_coefficient must be positive, got {}",
                    self.separation_coefficient
                ),
            });
        }
        if self.daytime_window_start >= self.daytime_window_end {
            return Err(CommuteFlowError::InvalidConfiguration {
                reason: format!(
                    "daytime window is empty: ({}, {})",
                    self.daytime_window_start, self.daytime_window_end
                ),
            });
        }
        Ok(())
    }
}

/// Bundled configuration for the whole pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub spatial: SpatialConfig,
    pub temporal: TemporalConfig,
    pub resolver: ResolverConfig,
}

impl PipelineConfig {
    /// Validate every stage configuration.
    pub fn validate(&self) -> Result<()> {
        self.spatial.validate()?;
        self.temporal.validate()?;
        self.resolver.validate()
    }
}
