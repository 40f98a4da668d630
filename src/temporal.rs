//! Spatiotemporal refinement engine.
//!
//! Splits each terminal spatial cluster into sub-clusters by time-of-day
//! usage pattern, then merges sub-clusters whose active time windows
//! overlap. Each surviving sub-cluster is one recurring usage pattern for
//! its origin-destination pair.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::spatial::{ClusterId, SpatialFlowCluster};
use crate::time_utils::{hour_gap, within_half_day_after};
use crate::{FlowGeometry, TemporalConfig, TripRecord};

/// An active time-of-day window in fractional hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    /// Create a time span from start and end hours.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Circular duration from start to end.
    pub fn duration(&self) -> f64 {
        hour_gap(self.start, self.end)
    }
}

/// A time-of-day-specific refinement of a spatial flow cluster.
#[derive(Debug, Clone)]
pub struct TemporalSubCluster {
    /// Composite identifier, extended on every merge
    pub id: String,
    /// Arena id of the parent spatial cluster
    pub parent_cluster: ClusterId,
    /// Flow geometry, inherited from the parent and pairwise-averaged on merge
    pub flow: FlowGeometry,
    /// Circular mean of member start/end hours
    pub span: TimeSpan,
    /// Member count of the parent cluster(s), accumulated across merges
    pub parent_member_count: usize,
    /// Whether this sub-cluster has absorbed a sibling
    pub has_merged: bool,
    members: BTreeMap<String, TripRecord>,
    member_start_hours: Vec<f64>,
    member_end_hours: Vec<f64>,
}

impl TemporalSubCluster {
    /// Create a singleton sub-cluster for one member trip of a spatial
    /// cluster, inheriting the parent's flow geometry.
    fn from_trip(index: usize, parent: &SpatialFlowCluster, trip: &TripRecord) -> Self {
        let mut members = BTreeMap::new();
        members.insert(trip.trip_id.clone(), trip.clone());
        Self {
            id: format!("stfc{:03}_{}", index, parent.label()),
            parent_cluster: parent.id,
            flow: parent.flow,
            span: TimeSpan::new(trip.start_hour, trip.end_hour),
            parent_member_count: parent.member_count(),
            has_merged: false,
            members,
            member_start_hours: vec![trip.start_hour],
            member_end_hours: vec![trip.end_hour],
        }
    }

    /// Number of member trips.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member trips keyed by trip id.
    pub fn members(&self) -> &BTreeMap<String, TripRecord> {
        &self.members
    }

    /// Mean start hour of the sub-cluster.
    pub fn start_hour(&self) -> f64 {
        self.span.start
    }

    /// Mean end hour of the sub-cluster.
    pub fn end_hour(&self) -> f64 {
        self.span.end
    }

    /// Absorb a sibling sub-cluster.
    ///
    /// The merged flow is the unweighted pairwise mean of the two flows
    /// (not a member-weighted mean), member sets are unioned, the time
    /// span is recomputed over all member hours, and the identifier
    /// becomes a composite of both sources.
    pub fn merge_neighbor(&mut self, neighbor: &TemporalSubCluster) {
        self.flow = self.flow.pairwise_mean(&neighbor.flow);

        for (trip_id, record) in &neighbor.members {
            if !self.members.contains_key(trip_id) {
                self.members.insert(trip_id.clone(), record.clone());
                self.member_start_hours.push(record.start_hour);
                self.member_end_hours.push(record.end_hour);
            }
        }
        self.recompute_span();

        self.parent_member_count += neighbor.parent_member_count;
        self.id = format!("{}_and_{}", self.id, neighbor.id);
        self.has_merged = true;
    }

    /// Recompute the canonical circular mean of member start/end hours.
    ///
    /// When the member hours span midnight (spread above 12 h), values
    /// past noon are shifted down by 24 before averaging, and a negative
    /// mean is shifted back into [0, 24).
    fn recompute_span(&mut self) {
        let start = circular_mean_hours(&self.member_start_hours);
        let end = circular_mean_hours(&self.member_end_hours);
        if let (Some(start), Some(end)) = (start, end) {
            self.span = TimeSpan::new(start, end);
            debug!("sub-cluster {} span recomputed to [{start:.3}, {end:.3}]", self.id);
        }
    }
}

/// Circular mean of hour-of-day samples with midnight-wrap normalization.
///
/// Returns `None` for an empty sample set.
pub fn circular_mean_hours(hours: &[f64]) -> Option<f64> {
    if hours.is_empty() {
        return None;
    }

    let max = hours.iter().cloned().fold(f64::MIN, f64::max);
    let min = hours.iter().cloned().fold(f64::MAX, f64::min);

    let sum: f64 = if max - min > 12.0 {
        hours.iter().map(|&h| if h > 12.0 { h - 24.0 } else { h }).sum()
    } else {
        hours.iter().sum()
    };

    let mut mean = sum / hours.len() as f64;
    if mean < 0.0 {
        mean += 24.0;
    }
    Some(mean)
}

// ============================================================================
// Temporal similarity
// ============================================================================

/// Wrap an hour value into [0, 24).
fn wrap_hour(hour: f64) -> f64 {
    if hour < 0.0 {
        hour + 24.0
    } else if hour >= 24.0 {
        hour - 24.0
    } else {
        hour
    }
}

/// Temporal similarity coefficient between two time spans, in [0, 1].
///
/// Each span is first expanded by `expansion_coefficient` on both sides
/// and wrap-normalized into [0, 24). Then:
/// - one span contained in the other (ordering flips between starts and
///   ends) scores 1 when the shorter-duration span is the contained one,
///   otherwise 0;
/// - disjoint spans score 0;
/// - overlapping spans score the overlap-tightness ratio
///   `gap(earlier end, later start) / gap(earlier start, later end)`.
pub fn calculate_temporal_similarity(
    span1: &TimeSpan,
    span2: &TimeSpan,
    expansion_coefficient: f64,
) -> f64 {
    let e1 = TimeSpan::new(
        wrap_hour(span1.start - expansion_coefficient),
        wrap_hour(span1.end + expansion_coefficient),
    );
    let e2 = TimeSpan::new(
        wrap_hour(span2.start - expansion_coefficient),
        wrap_hour(span2.end + expansion_coefficient),
    );

    let start1_after_start2 = within_half_day_after(e1.start, e2.start);
    let end1_after_end2 = within_half_day_after(e1.end, e2.end);

    if start1_after_start2 && !end1_after_end2 {
        // span1 sits inside span2's window
        return if hour_gap(e1.start, e1.end) < hour_gap(e2.start, e2.end) {
            1.0
        } else {
            0.0
        };
    }
    if !start1_after_start2 && end1_after_end2 {
        // span2 sits inside span1's window
        return if hour_gap(e2.start, e2.end) < hour_gap(e1.start, e1.end) {
            1.0
        } else {
            0.0
        };
    }
    if !within_half_day_after(e1.end, e2.start) || !within_half_day_after(e2.end, e1.start) {
        // no overlap in either direction
        return 0.0;
    }

    let later_end = e1.end.max(e2.end);
    let earlier_end = e1.end.min(e2.end);
    let later_start = e1.start.max(e2.start);
    let earlier_start = e1.start.min(e2.start);

    let denominator = hour_gap(earlier_start, later_end);
    if denominator <= 0.0 {
        return 0.0;
    }
    (hour_gap(earlier_end, later_start) / denominator).clamp(0.0, 1.0)
}

// ============================================================================
// Refinement driver
// ============================================================================

/// Refine one terminal spatial cluster into temporal sub-clusters.
///
/// One singleton sub-cluster is created per member trip, ordered by start
/// hour ascending, then siblings whose temporal similarity exceeds the
/// configured threshold are merged greedily until a full pass makes no
/// merge.
pub fn refine_cluster(
    parent: &SpatialFlowCluster,
    config: &TemporalConfig,
) -> Vec<TemporalSubCluster> {
    let mut trips: Vec<&TripRecord> = parent.members().values().collect();
    trips.sort_by(|a, b| {
        a.start_hour
            .partial_cmp(&b.start_hour)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.trip_id.cmp(&b.trip_id))
    });

    let mut sub_clusters: Vec<TemporalSubCluster> = trips
        .iter()
        .enumerate()
        .map(|(index, trip)| TemporalSubCluster::from_trip(index, parent, trip))
        .collect();

    // Greedy merge passes until a fixed point.
    loop {
        let mut merged_any = false;

        'pass: for i in 0..sub_clusters.len() {
            for j in (i + 1)..sub_clusters.len() {
                let similarity = calculate_temporal_similarity(
                    &sub_clusters[i].span,
                    &sub_clusters[j].span,
                    config.expansion_coefficient,
                );
                if similarity > config.similarity_threshold {
                    let neighbor = sub_clusters.remove(j);
                    sub_clusters[i].merge_neighbor(&neighbor);
                    merged_any = true;
                    break 'pass;
                }
            }
        }

        if !merged_any {
            break;
        }
    }

    sub_clusters
}
