use crate::store::EventStore;
use crate::types::{CameraConfig, DetectionEvent, VehicleType};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::debug;

/// Randomised detections for every configured camera, no track ids.
pub struct SimulatedProducer {
    cameras: Vec<CameraConfig>,
    detection_probability: f64,
    rng: StdRng,
}

impl SimulatedProducer {
    pub fn new(cameras: Vec<CameraConfig>, detection_probability: f64) -> Self {
        Self::with_rng(cameras, detection_probability, StdRng::from_entropy())
    }

    pub fn with_rng(cameras: Vec<CameraConfig>, detection_probability: f64, rng: StdRng) -> Self {
        Self {
            cameras,
            detection_probability: detection_probability.clamp(0.0, 1.0),
            rng,
        }
    }

    /// One Bernoulli draw per camera; a hit yields a single event with a
    /// uniform type and a count in 1..=3. All events share `now`.
    pub fn generate(&mut self, now: DateTime<Utc>) -> Vec<DetectionEvent> {
        let mut events = Vec::new();
        for camera in &self.cameras {
            if !self.rng.gen_bool(self.detection_probability) {
                continue;
            }
            let vehicle_type = *VehicleType::ALL
                .choose(&mut self.rng)
                .unwrap_or(&VehicleType::Car);
            let count = self.rng.gen_range(1..=3);
            events.push(DetectionEvent::counted(camera, vehicle_type, count, now));
        }
        events
    }

    pub async fn tick(&mut self, store: &EventStore, now: DateTime<Utc>) -> Vec<DetectionEvent> {
        let events = self.generate(now);
        debug!(events = events.len(), "Simulated tick");
        store.append_batch(events.clone(), std::iter::empty()).await;
        events
    }
}
