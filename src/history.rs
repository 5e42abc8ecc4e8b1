//! Time-of-day slices over the buffered events.

use crate::aggregate::distribution;
use crate::error::{HistoryError, HistoryResult};
use crate::types::{Breakdown, CameraConfig, DetectionEvent};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Midday,
    Evening,
    Night,
}

impl Slot {
    /// Same hour bands the traffic patterns use: morning rush, midday,
    /// evening rush, everything else.
    pub fn contains_hour(&self, hour: u32) -> bool {
        match self {
            Slot::Morning => (6..=9).contains(&hour),
            Slot::Midday => (10..=15).contains(&hour),
            Slot::Evening => (16..=19).contains(&hour),
            Slot::Night => !(6..=19).contains(&hour),
        }
    }

    pub fn hours(&self) -> Vec<u32> {
        (0..24).filter(|h| self.contains_hour(*h)).collect()
    }
}

impl FromStr for Slot {
    type Err = HistoryError;

    fn from_str(s: &str) -> HistoryResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Slot::Morning),
            "midday" | "afternoon" => Ok(Slot::Midday),
            "evening" => Ok(Slot::Evening),
            "night" => Ok(Slot::Night),
            other => Err(HistoryError::UnknownSlot(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotLocation {
    pub id: String,
    pub name: String,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyVolume {
    pub hour: u32,
    pub vehicles: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub slot: Slot,
    pub events: usize,
    pub total: u64,
    pub distribution: Breakdown,
    pub locations: Vec<SlotLocation>,
    pub hourly: Vec<HourlyVolume>,
}

pub fn history_slice(events: &[DetectionEvent], cameras: &[CameraConfig], slot: Slot) -> HistorySummary {
    let in_slot: Vec<DetectionEvent> = events
        .iter()
        .filter(|e| slot.contains_hour(e.timestamp.hour()))
        .cloned()
        .collect();

    let total = in_slot.iter().map(|e| e.count as u64).sum();

    let locations = cameras
        .iter()
        .map(|camera| SlotLocation {
            id: camera.id.clone(),
            name: camera.name.clone(),
            total: in_slot
                .iter()
                .filter(|e| e.camera_id == camera.id)
                .map(|e| e.count as u64)
                .sum(),
        })
        .collect();

    let hourly = slot
        .hours()
        .into_iter()
        .map(|hour| HourlyVolume {
            hour,
            vehicles: in_slot
                .iter()
                .filter(|e| e.timestamp.hour() == hour)
                .map(|e| e.count as u64)
                .sum(),
        })
        .collect();

    HistorySummary {
        slot,
        events: in_slot.len(),
        total,
        distribution: distribution(&in_slot),
        locations,
        hourly,
    }
}
