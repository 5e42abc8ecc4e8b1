use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ===== Vehicle Classes =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Bike,
    Bus,
    Truck,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [
        VehicleType::Car,
        VehicleType::Bike,
        VehicleType::Bus,
        VehicleType::Truck,
    ];

    /// Maps a detector class label onto a tracked vehicle type.
    /// Labels outside the four road classes are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "car" => Some(VehicleType::Car),
            "motorcycle" | "bike" => Some(VehicleType::Bike),
            "bus" => Some(VehicleType::Bus),
            "truck" => Some(VehicleType::Truck),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Bike => "bike",
            VehicleType::Bus => "bus",
            VehicleType::Truck => "truck",
        }
    }
}

/// Per-type counts. Always carries all four keys so charts have a stable shape.
pub type Breakdown = BTreeMap<VehicleType, u64>;

pub fn empty_breakdown() -> Breakdown {
    VehicleType::ALL.iter().map(|v| (*v, 0)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    LiveCctv,
    #[serde(alias = "simulated_cctv")]
    Simulated,
}

// ===== Events =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: Uuid,
    pub camera_id: String,
    pub camera_name: String,
    pub lat: f64,
    pub lng: f64,
    pub vehicle_type: VehicleType,
    pub count: u32,
    #[serde(default)]
    pub track_ids: Vec<u64>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    /// Event for `camera` carrying explicit track ids. The count is the id count.
    pub fn tracked(
        camera: &CameraConfig,
        vehicle_type: VehicleType,
        track_ids: Vec<u64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_id: camera.id.clone(),
            camera_name: camera.name.clone(),
            lat: camera.lat,
            lng: camera.lng,
            vehicle_type,
            count: track_ids.len() as u32,
            track_ids,
            timestamp,
        }
    }

    /// Event with a bare count and no track ids (simulated sensors).
    pub fn counted(
        camera: &CameraConfig,
        vehicle_type: VehicleType,
        count: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_id: camera.id.clone(),
            camera_name: camera.name.clone(),
            lat: camera.lat,
            lng: camera.lng,
            vehicle_type,
            count,
            track_ids: Vec::new(),
            timestamp,
        }
    }
}

// ===== Locations =====

fn default_lanes() -> u32 {
    2
}

fn default_source_type() -> SourceType {
    SourceType::LiveCctv
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    #[serde(default = "default_lanes")]
    pub lanes: u32,
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
    /// Video file or stream the real backend decodes for this camera.
    #[serde(default)]
    pub video: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedNode {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub source_type: SourceType,
}

impl SimulatedNode {
    pub fn from_road_points(points: &[(f64, f64)]) -> Vec<Self> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| SimulatedNode {
                id: format!("SIM_{}", i),
                lat,
                lng,
                name: format!("Sensor Node #{}", i + 1),
                source_type: SourceType::Simulated,
            })
            .collect()
    }
}

// ===== Aggregates =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Moderate,
    Congestion,
}

impl Intensity {
    pub fn weight(&self) -> f64 {
        match self {
            Intensity::Low => 0.2,
            Intensity::Moderate => 0.5,
            Intensity::Congestion => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::Congestion => "congestion",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub total: u64,
    pub lanes: u32,
    pub breakdown: Breakdown,
    pub intensity: Intensity,
    pub weighted_intensity: f64,
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    /// Live load of the primary camera, the dashboard headline.
    pub total_vehicles: u64,
    /// Lifetime count of distinct track ids.
    pub distinct_vehicles: u64,
    pub distribution: Breakdown,
    pub locations: Vec<LocationSnapshot>,
}
