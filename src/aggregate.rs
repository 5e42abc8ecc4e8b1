//! Turns a store snapshot into per-location live load, cumulative breakdown
//! and congestion tiers, merged with the simulated sensor nodes.

use crate::config::{AggregationConfig, MAX_LIVE_WINDOW_SECS};
use crate::store::StoreSnapshot;
use crate::types::{
    empty_breakdown, Breakdown, CameraConfig, DetectionEvent, Intensity, LocationSnapshot,
    SimulatedNode, SourceType, TrafficSnapshot, VehicleType,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct AggregationParams {
    pub window: Duration,
    pub primary_camera: String,
    pub simulated_lanes: u32,
    pub simulated_min_load: u64,
    pub simulated_max_load: u64,
}

impl From<&AggregationConfig> for AggregationParams {
    fn from(cfg: &AggregationConfig) -> Self {
        Self {
            window: Duration::seconds(cfg.live_window_secs.clamp(1, MAX_LIVE_WINDOW_SECS)),
            primary_camera: cfg.primary_camera.clone(),
            simulated_lanes: cfg.simulated_lanes.max(1),
            simulated_min_load: cfg.simulated_min_load,
            simulated_max_load: cfg.simulated_max_load.max(cfg.simulated_min_load),
        }
    }
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self::from(&AggregationConfig::default())
    }
}

/// Lanes-normalised congestion tier. Upper bounds are inclusive:
/// `total <= lanes*2` is low, `total <= lanes*4` is moderate.
/// A lane count of 0 is treated as 1.
pub fn classify(total: u64, lanes: u32) -> Intensity {
    let lanes = lanes.max(1) as u64;
    let t_low = lanes * 2;
    let t_high = lanes * 4;

    if total <= t_low {
        Intensity::Low
    } else if total <= t_high {
        Intensity::Moderate
    } else {
        Intensity::Congestion
    }
}

/// Running per-type totals for one camera over every buffered event.
pub fn cumulative_breakdown(events: &[DetectionEvent], camera_id: &str) -> Breakdown {
    let mut breakdown = empty_breakdown();
    for event in events.iter().filter(|e| e.camera_id == camera_id) {
        *breakdown.entry(event.vehicle_type).or_insert(0) += event.count as u64;
    }
    breakdown
}

/// Per-type totals across every buffered event.
pub fn distribution(events: &[DetectionEvent]) -> Breakdown {
    let mut breakdown = empty_breakdown();
    for event in events {
        *breakdown.entry(event.vehicle_type).or_insert(0) += event.count as u64;
    }
    breakdown
}

/// Distinct vehicles seen by `camera_id` within `window` of `now`.
///
/// Track ids are unioned so the same vehicle seen over several frames counts
/// once. When no event in the window carries ids, the busiest single
/// timestamp (summed counts) stands in for the load.
pub fn live_load(
    events: &[DetectionEvent],
    camera_id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> u64 {
    let recent: Vec<&DetectionEvent> = events
        .iter()
        .filter(|e| e.camera_id == camera_id && now - e.timestamp < window)
        .collect();

    if recent.is_empty() {
        return 0;
    }

    let ids: HashSet<u64> = recent
        .iter()
        .flat_map(|e| e.track_ids.iter().copied())
        .collect();
    if !ids.is_empty() {
        return ids.len() as u64;
    }

    let mut per_timestamp: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
    for event in &recent {
        *per_timestamp.entry(event.timestamp).or_insert(0) += event.count as u64;
    }
    per_timestamp.values().copied().max().unwrap_or(0)
}

fn camera_location(
    camera: &CameraConfig,
    events: &[DetectionEvent],
    now: DateTime<Utc>,
    window: Duration,
) -> LocationSnapshot {
    let total = live_load(events, &camera.id, now, window);
    let intensity = classify(total, camera.lanes);
    LocationSnapshot {
        id: camera.id.clone(),
        lat: camera.lat,
        lng: camera.lng,
        name: camera.name.clone(),
        total,
        lanes: camera.lanes,
        breakdown: cumulative_breakdown(events, &camera.id),
        intensity,
        weighted_intensity: intensity.weight(),
        source_type: camera.source_type,
    }
}

fn simulated_location<R: Rng + ?Sized>(
    node: &SimulatedNode,
    params: &AggregationParams,
    rng: &mut R,
) -> LocationSnapshot {
    let total = rng.gen_range(params.simulated_min_load..=params.simulated_max_load);
    let intensity = classify(total, params.simulated_lanes);

    let mut breakdown = empty_breakdown();
    breakdown.insert(VehicleType::Car, total);

    LocationSnapshot {
        id: node.id.clone(),
        lat: node.lat,
        lng: node.lng,
        name: node.name.clone(),
        total,
        lanes: params.simulated_lanes,
        breakdown,
        intensity,
        weighted_intensity: intensity.weight(),
        source_type: SourceType::Simulated,
    }
}

/// Builds the dashboard aggregate. Real cameras come first, then simulated
/// nodes; simulated loads are drawn fresh from `rng` on every call.
pub fn aggregate<R: Rng + ?Sized>(
    snapshot: &StoreSnapshot,
    cameras: &[CameraConfig],
    nodes: &[SimulatedNode],
    now: DateTime<Utc>,
    params: &AggregationParams,
    rng: &mut R,
) -> TrafficSnapshot {
    let events = snapshot.events.as_slice();

    let mut locations: Vec<LocationSnapshot> = cameras
        .iter()
        .map(|camera| camera_location(camera, events, now, params.window))
        .collect();

    let total_vehicles = locations
        .iter()
        .find(|loc| loc.id == params.primary_camera)
        .map(|loc| loc.total)
        .unwrap_or(0);

    locations.extend(nodes.iter().map(|node| simulated_location(node, params, rng)));

    TrafficSnapshot {
        total_vehicles,
        distinct_vehicles: snapshot.distinct_vehicles,
        distribution: distribution(events),
        locations,
    }
}
