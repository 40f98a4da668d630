//! Commuting resolver.
//!
//! Pairs refined temporal sub-clusters into candidate round-trip legs,
//! detects transit transfers against the station index, and resolves one
//! final daily commuting classification per user.
//!
//! A candidate leg is a round trip: the morning sub-cluster's origin must
//! sit near the evening sub-cluster's destination and vice versa, with a
//! plausible working-hours gap in between. Transfers are inferred purely
//! from station proximity at one end of the combined flow.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::StationIndex;
use crate::error::{CommuteFlowError, Result};
use crate::geo_utils::{self, endpoints_far_apart};
use crate::temporal::TemporalSubCluster;
use crate::time_utils::{hour_gap, hour_to_time};
use crate::{FlowGeometry, ResolverConfig, TripPoint};

/// Working-hours gap at which the tentative role assignment flips: a gap
/// this long means the apparent morning leg is really the evening leg
/// seen across midnight.
const ROLE_SWAP_GAP_HOURS: f64 = 16.0;

/// Time-alignment tolerance in hours when pairing complementary legs.
const LEG_ALIGNMENT_TOLERANCE_HOURS: f64 = 2.0;

// ============================================================================
// Transfer types
// ============================================================================

/// Direction of a transit transfer within a commuting leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferType {
    /// Transit first, then bike: the matched station sits at the flow origin.
    TransitThenBike,
    /// Bike first, then transit: the matched station sits at the flow
    /// destination.
    BikeThenTransit,
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::TransitThenBike => write!(f, "transit-then-bike"),
            TransferType::BikeThenTransit => write!(f, "bike-then-transit"),
        }
    }
}

/// A matched transit transfer: direction plus the station it pivots on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_type: TransferType,
    pub station_id: String,
    pub station_location: TripPoint,
}

// ============================================================================
// Candidate commuting flow
// ============================================================================

/// A candidate round-trip commuting flow built from two temporal
/// sub-clusters, the earlier (outbound) and later (return) legs.
#[derive(Debug, Clone)]
pub struct SimplifiedCommutingFlow {
    /// Composite id of both legs
    pub id: String,
    pub earlier_leg: TemporalSubCluster,
    pub later_leg: TemporalSubCluster,
    /// Combined flow: each endpoint averages the earlier leg's endpoint
    /// with the later leg's opposite endpoint
    pub flow: FlowGeometry,
    /// Straight-line commuting distance in meters
    pub commuting_distance: f64,
    /// Gap between the earlier leg's end and the later leg's start,
    /// normalized into [0, 24)
    pub working_hours: f64,
    /// Member trips across both legs
    pub total_member_count: usize,
    /// Earlier-leg share of the member trips
    pub cycling_round_trip_rate: f64,
    /// Mean departure hour of the earlier leg
    pub earlier_departure_hour: f64,
    /// Mean departure hour of the later leg
    pub later_departure_hour: f64,
    /// Circular riding duration of the earlier leg in hours
    pub earlier_cycling_duration: f64,
    /// Circular riding duration of the later leg in hours
    pub later_cycling_duration: f64,
    /// Matched transit transfer, if any
    pub transfer: Option<Transfer>,
}

impl SimplifiedCommutingFlow {
    /// Build a candidate from an earlier/later leg assignment.
    fn new(earlier_leg: &TemporalSubCluster, later_leg: &TemporalSubCluster) -> Self {
        let flow = FlowGeometry::new(
            geo_utils::midpoint(&earlier_leg.flow.origin, &later_leg.flow.destination),
            geo_utils::midpoint(&earlier_leg.flow.destination, &later_leg.flow.origin),
        );

        let mut working_hours = later_leg.start_hour() - earlier_leg.end_hour();
        if working_hours < 0.0 {
            working_hours += 24.0;
        }

        let total_member_count = earlier_leg.member_count() + later_leg.member_count();

        Self {
            id: format!("{}_{}", earlier_leg.id, later_leg.id),
            flow,
            commuting_distance: flow.length(),
            working_hours,
            total_member_count,
            cycling_round_trip_rate: earlier_leg.member_count() as f64
                / total_member_count as f64,
            earlier_departure_hour: earlier_leg.start_hour(),
            later_departure_hour: later_leg.start_hour(),
            earlier_cycling_duration: hour_gap(earlier_leg.start_hour(), earlier_leg.end_hour()),
            later_cycling_duration: hour_gap(later_leg.start_hour(), later_leg.end_hour()),
            transfer: None,
            earlier_leg: earlier_leg.clone(),
            later_leg: later_leg.clone(),
        }
    }

    /// Display string for the transfer state, used in error context.
    fn transfer_label(&self) -> String {
        match &self.transfer {
            Some(transfer) => transfer.transfer_type.to_string(),
            None => "none".to_string(),
        }
    }
}

// ============================================================================
// Candidate identification
// ============================================================================

/// Evaluate two temporal sub-clusters as a candidate round trip.
///
/// The sub-cluster whose departure hour sits closer to the anchor hour is
/// the tentative earlier leg. The pair is accepted when the legs are
/// geometric mirrors of each other (each origin near the other's
/// destination, within twice the boundary radius) and the working-hours
/// gap is plausible. A gap of [`ROLE_SWAP_GAP_HOURS`] or more flips the
/// roles: the apparent morning leg is the evening leg across midnight.
pub fn identify_candidate(
    first: &TemporalSubCluster,
    second: &TemporalSubCluster,
    config: &ResolverConfig,
) -> Option<SimplifiedCommutingFlow> {
    let (earlier, later) = if (first.start_hour() - config.anchor_hour).abs()
        < (second.start_hour() - config.anchor_hour).abs()
    {
        (first, second)
    } else {
        (second, first)
    };

    let reciprocity_radius = 2.0 * config.boundary_radius;
    let origin_to_destination =
        geo_utils::distance(&earlier.flow.origin, &later.flow.destination);
    let destination_to_origin =
        geo_utils::distance(&earlier.flow.destination, &later.flow.origin);
    if origin_to_destination > reciprocity_radius || destination_to_origin > reciprocity_radius {
        return None;
    }

    let mut gap = later.start_hour() - earlier.end_hour();
    if gap < 0.0 {
        gap += 24.0;
    }
    if gap < config.working_hours_threshold {
        return None;
    }

    if gap < ROLE_SWAP_GAP_HOURS {
        Some(SimplifiedCommutingFlow::new(earlier, later))
    } else {
        Some(SimplifiedCommutingFlow::new(later, earlier))
    }
}

// ============================================================================
// Transfer detection
// ============================================================================

/// Detect a transit transfer at either end of a candidate flow.
///
/// Only evaluated when the earlier leg departs inside the daytime window.
/// A transfer is matched when one end sits within the distance threshold
/// of its nearest station, closer than the opposite end is to its own
/// nearest station, and the opposite end is far enough away that the leg
/// cannot be a station-to-station ride (twice its station distance
/// exceeds the flow length).
pub fn detect_transfer(
    candidate: &mut SimplifiedCommutingFlow,
    stations: &StationIndex,
    config: &ResolverConfig,
) {
    let departure = candidate.earlier_departure_hour;
    if departure <= config.daytime_window_start || departure >= config.daytime_window_end {
        return;
    }

    let origin_nearest = stations.nearest(&candidate.flow.origin);
    let destination_nearest = stations.nearest(&candidate.flow.destination);
    let (Some((origin_dist, origin_station)), Some((destination_dist, destination_station))) =
        (origin_nearest, destination_nearest)
    else {
        return;
    };

    let flow_length = candidate.flow.length();

    if origin_dist <= config.transfer_distance_threshold
        && origin_dist < destination_dist
        && destination_dist * 2.0 > flow_length
    {
        candidate.transfer = Some(Transfer {
            transfer_type: TransferType::TransitThenBike,
            station_id: origin_station.station_id.clone(),
            station_location: origin_station.location,
        });
    } else if destination_dist <= config.transfer_distance_threshold
        && destination_dist < origin_dist
        && origin_dist * 2.0 > flow_length
    {
        candidate.transfer = Some(Transfer {
            transfer_type: TransferType::BikeThenTransit,
            station_id: destination_station.station_id.clone(),
            station_location: destination_station.location,
        });
    }
}

// ============================================================================
// Daily commuting flow (output)
// ============================================================================

/// Final commuting classification for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommutingCategory {
    #[serde(rename = "Only-biking")]
    OnlyBiking,
    #[serde(rename = "Transit-biking")]
    TransitBiking,
    #[serde(rename = "Biking-transit")]
    BikingTransit,
    #[serde(rename = "Biking-transit-biking")]
    BikingTransitBiking,
}

impl fmt::Display for CommutingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommutingCategory::OnlyBiking => write!(f, "Only-biking"),
            CommutingCategory::TransitBiking => write!(f, "Transit-biking"),
            CommutingCategory::BikingTransit => write!(f, "Biking-transit"),
            CommutingCategory::BikingTransitBiking => write!(f, "Biking-transit-biking"),
        }
    }
}

/// Final per-user commuting record.
///
/// Built once from one or two [`SimplifiedCommutingFlow`] legs and never
/// mutated afterward. Which location and timing fields are present
/// depends on the category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCommutingFlow {
    pub id: String,
    pub commuting_category: CommutingCategory,
    pub home_location: Option<TripPoint>,
    pub work_location: Option<TripPoint>,
    pub to_transit_location: Option<TripPoint>,
    pub to_transit_station_id: Option<String>,
    pub to_transit_station_location: Option<TripPoint>,
    pub from_transit_location: Option<TripPoint>,
    pub from_transit_station_id: Option<String>,
    pub from_transit_station_location: Option<TripPoint>,
    /// Departure from home, "HH:MM:SS"
    pub moment_leave_home: Option<String>,
    /// Departure from work, "HH:MM:SS"
    pub moment_leave_work: Option<String>,
    /// Door-to-door outbound duration in hours
    pub duration_to_work: Option<f64>,
    /// Door-to-door return duration in hours
    pub duration_back_home: Option<f64>,
    /// Straight-line home-work distance in meters
    pub commuting_distance: Option<f64>,
    /// Gap between outbound arrival and return departure in hours
    pub working_hours: Option<f64>,
    pub cycling_round_trip_rate: f64,
    pub total_member_count: usize,
}

impl DailyCommutingFlow {
    /// Build the classification carried by a single candidate leg.
    pub fn from_single_leg(candidate: &SimplifiedCommutingFlow) -> Self {
        let mut daily = Self {
            id: candidate.id.clone(),
            commuting_category: CommutingCategory::OnlyBiking,
            home_location: None,
            work_location: None,
            to_transit_location: None,
            to_transit_station_id: None,
            to_transit_station_location: None,
            from_transit_location: None,
            from_transit_station_id: None,
            from_transit_station_location: None,
            moment_leave_home: None,
            moment_leave_work: None,
            duration_to_work: None,
            duration_back_home: None,
            commuting_distance: None,
            working_hours: None,
            cycling_round_trip_rate: candidate.cycling_round_trip_rate,
            total_member_count: candidate.total_member_count,
        };

        match &candidate.transfer {
            None => {
                daily.commuting_category = CommutingCategory::OnlyBiking;
                daily.home_location = Some(candidate.flow.origin);
                daily.work_location = Some(candidate.flow.destination);
                daily.moment_leave_home = Some(hour_to_time(candidate.earlier_departure_hour));
                daily.moment_leave_work = Some(hour_to_time(candidate.later_departure_hour));
                daily.duration_to_work = Some(candidate.earlier_cycling_duration);
                daily.duration_back_home = Some(candidate.later_cycling_duration);
                daily.commuting_distance = Some(candidate.commuting_distance);
                daily.working_hours = Some(candidate.working_hours);
            }
            Some(transfer) => match transfer.transfer_type {
                TransferType::TransitThenBike => {
                    daily.commuting_category = CommutingCategory::TransitBiking;
                    daily.work_location = Some(candidate.flow.destination);
                    daily.from_transit_location = Some(candidate.flow.origin);
                    daily.from_transit_station_id = Some(transfer.station_id.clone());
                    daily.from_transit_station_location = Some(transfer.station_location);
                    daily.moment_leave_work = Some(hour_to_time(candidate.later_departure_hour));
                    daily.working_hours = Some(candidate.working_hours);
                }
                TransferType::BikeThenTransit => {
                    daily.commuting_category = CommutingCategory::BikingTransit;
                    daily.home_location = Some(candidate.flow.origin);
                    daily.to_transit_location = Some(candidate.flow.destination);
                    daily.to_transit_station_id = Some(transfer.station_id.clone());
                    daily.to_transit_station_location = Some(transfer.station_location);
                    daily.moment_leave_home = Some(hour_to_time(candidate.earlier_departure_hour));
                }
            },
        }

        daily
    }

    /// Combine two complementary transfer legs into a
    /// `Biking-transit-biking` classification.
    ///
    /// One leg must carry a bike-then-transit transfer and the other a
    /// transit-then-bike transfer; any other combination is a
    /// classification error and produces no partial output.
    pub fn from_paired_legs(
        first: &SimplifiedCommutingFlow,
        second: &SimplifiedCommutingFlow,
    ) -> Result<Self> {
        let first_type = first.transfer.as_ref().map(|t| t.transfer_type);
        let second_type = second.transfer.as_ref().map(|t| t.transfer_type);

        // Home-side leg ends at a station; work-side leg starts at one.
        let (bike_transit_leg, transit_bike_leg) = match (first_type, second_type) {
            (Some(TransferType::BikeThenTransit), Some(TransferType::TransitThenBike)) => {
                (first, second)
            }
            (Some(TransferType::TransitThenBike), Some(TransferType::BikeThenTransit)) => {
                (second, first)
            }
            _ => {
                return Err(CommuteFlowError::IncompatibleTransferTypes {
                    primary: first.transfer_label(),
                    secondary: second.transfer_label(),
                })
            }
        };

        // Both legs carry a transfer by construction of the match above.
        let to_transit = bike_transit_leg
            .transfer
            .as_ref()
            .ok_or_else(|| CommuteFlowError::IncompatibleTransferTypes {
                primary: first.transfer_label(),
                secondary: second.transfer_label(),
            })?;
        let from_transit = transit_bike_leg
            .transfer
            .as_ref()
            .ok_or_else(|| CommuteFlowError::IncompatibleTransferTypes {
                primary: first.transfer_label(),
                secondary: second.transfer_label(),
            })?;

        let home_location = bike_transit_leg.flow.origin;
        let work_location = transit_bike_leg.flow.destination;

        let duration_to_work = (transit_bike_leg.earlier_departure_hour
            - bike_transit_leg.earlier_departure_hour)
            .abs()
            + transit_bike_leg.earlier_cycling_duration;
        let duration_back_home = (bike_transit_leg.later_departure_hour
            - transit_bike_leg.later_departure_hour)
            .abs()
            + bike_transit_leg.later_cycling_duration;

        let rate =
            (bike_transit_leg.cycling_round_trip_rate + transit_bike_leg.cycling_round_trip_rate)
                / 2.0;

        Ok(Self {
            id: format!("{}_&_{}", bike_transit_leg.id, transit_bike_leg.id),
            commuting_category: CommutingCategory::BikingTransitBiking,
            home_location: Some(home_location),
            work_location: Some(work_location),
            to_transit_location: Some(bike_transit_leg.flow.destination),
            to_transit_station_id: Some(to_transit.station_id.clone()),
            to_transit_station_location: Some(to_transit.station_location),
            from_transit_location: Some(transit_bike_leg.flow.origin),
            from_transit_station_id: Some(from_transit.station_id.clone()),
            from_transit_station_location: Some(from_transit.station_location),
            moment_leave_home: Some(hour_to_time(bike_transit_leg.earlier_departure_hour)),
            moment_leave_work: Some(hour_to_time(transit_bike_leg.later_departure_hour)),
            duration_to_work: Some(duration_to_work),
            duration_back_home: Some(duration_back_home),
            commuting_distance: Some(geo_utils::distance(&home_location, &work_location)),
            working_hours: Some(transit_bike_leg.working_hours),
            cycling_round_trip_rate: (rate * 1000.0).round() / 1000.0,
            total_member_count: bike_transit_leg.total_member_count
                + transit_bike_leg.total_member_count,
        })
    }
}

// ============================================================================
// Per-user resolution
// ============================================================================

/// Resolve one user's candidate flows into a final daily classification.
///
/// The candidate with the highest member count is primary. Without a
/// transfer it resolves alone as `Only-biking`. With a transfer, the
/// remaining candidates are searched for a complementary leg; when one is
/// found the pair resolves as `Biking-transit-biking`, otherwise the
/// primary resolves alone under its transfer category.
///
/// Returns `Ok(None)` when there are no candidates.
pub fn resolve_user(
    candidates: &[SimplifiedCommutingFlow],
    config: &ResolverConfig,
) -> Result<Option<DailyCommutingFlow>> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut ranked: Vec<&SimplifiedCommutingFlow> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_member_count
            .cmp(&a.total_member_count)
            .then_with(|| a.id.cmp(&b.id))
    });
    let primary = ranked[0];

    let daily = match &primary.transfer {
        None => DailyCommutingFlow::from_single_leg(primary),
        Some(_) => match find_complementary_leg(primary, &ranked, config) {
            Some(secondary) => DailyCommutingFlow::from_paired_legs(primary, secondary)?,
            None => DailyCommutingFlow::from_single_leg(primary),
        },
    };

    Ok(Some(daily))
}

/// Search the ranked candidates for a leg complementary to the primary.
///
/// A complementary leg carries the opposite transfer direction through a
/// different station, aligns with the primary's timing within
/// [`LEG_ALIGNMENT_TOLERANCE_HOURS`] on either the outbound or return
/// side, and covers geographically distinct ground: every pairing of the
/// two legs' four endpoints must clear twice the separation threshold
/// (the shorter leg's length scaled by `separation_coefficient`, capped
/// at the boundary radius).
fn find_complementary_leg<'a>(
    primary: &SimplifiedCommutingFlow,
    ranked: &[&'a SimplifiedCommutingFlow],
    config: &ResolverConfig,
) -> Option<&'a SimplifiedCommutingFlow> {
    if ranked.len() < 2 {
        return None;
    }
    let primary_transfer = primary.transfer.as_ref()?;

    for candidate in ranked {
        if candidate.id == primary.id {
            continue;
        }
        let Some(transfer) = &candidate.transfer else {
            continue;
        };
        if transfer.transfer_type == primary_transfer.transfer_type
            || transfer.station_id == primary_transfer.station_id
        {
            continue;
        }

        let return_aligned = (candidate.later_departure_hour
            - primary.later_departure_hour
            - primary.later_cycling_duration)
            .abs()
            <= LEG_ALIGNMENT_TOLERANCE_HOURS;
        let outbound_aligned = (candidate.earlier_departure_hour
            - primary.earlier_departure_hour
            - candidate.earlier_cycling_duration)
            .abs()
            <= LEG_ALIGNMENT_TOLERANCE_HOURS;
        if !return_aligned && !outbound_aligned {
            continue;
        }

        let separation = (primary.flow.length().min(candidate.flow.length())
            * config.separation_coefficient)
            .min(config.boundary_radius);
        if endpoints_far_apart(&candidate.flow, &primary.flow, separation * 2.0) {
            return Some(*candidate);
        }
    }

    None
}
