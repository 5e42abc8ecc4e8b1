//! Detector-driven producer. Video decoding, the tracking model, the clock
//! overlay and JPEG encoding belong to a [`DetectionBackend`].

use crate::error::BackendResult;
use crate::store::EventStore;
use crate::types::{CameraConfig, DetectionEvent, VehicleType};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use tokio::task;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub track_id: u64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct TrackPass {
    pub objects: Vec<TrackedObject>,
    /// Input frame with boxes drawn.
    pub annotated: Frame,
}

pub trait FrameSource: Send {
    /// Next decoded frame, `None` at end of stream.
    fn read(&mut self) -> BackendResult<Option<Frame>>;
    fn rewind(&mut self) -> BackendResult<()>;
}

pub trait Tracker: Send {
    /// Detection plus tracking; ids persist across calls.
    fn track(&mut self, frame: &Frame) -> BackendResult<TrackPass>;
}

pub trait DetectionBackend: Send + Sync {
    fn name(&self) -> &str;
    fn load_tracker(&self) -> BackendResult<Box<dyn Tracker>>;
    fn open_source(&self, camera: &CameraConfig) -> BackendResult<Box<dyn FrameSource>>;
    fn stamp_clock(&self, frame: &mut Frame, clock: &str);
    fn encode_jpeg(&self, frame: &Frame) -> BackendResult<Vec<u8>>;
}

struct CameraFeed {
    camera: CameraConfig,
    source: Box<dyn FrameSource>,
    frames_read: u64,
    last_annotated: Option<Frame>,
}

/// Groups one pass's objects into at most one event per vehicle type.
/// Returns the events and every track id seen in the pass.
pub fn events_from_pass(
    camera: &CameraConfig,
    objects: &[TrackedObject],
    now: DateTime<Utc>,
) -> (Vec<DetectionEvent>, Vec<u64>) {
    let mut by_type: BTreeMap<VehicleType, Vec<u64>> = BTreeMap::new();
    for object in objects {
        if let Some(vehicle_type) = VehicleType::from_label(&object.label) {
            by_type.entry(vehicle_type).or_default().push(object.track_id);
        }
    }

    let events = by_type
        .into_iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(vehicle_type, ids)| DetectionEvent::tracked(camera, vehicle_type, ids, now))
        .collect();
    let seen = objects.iter().map(|o| o.track_id).collect();
    (events, seen)
}

/// What one camera produced in a tick, handed back from the blocking pool.
struct FeedOutput {
    camera_id: String,
    events: Vec<DetectionEvent>,
    track_ids: Vec<u64>,
    jpeg: Option<Vec<u8>>,
}

/// Model and sources. Everything in here is synchronous and may be slow.
struct Pipeline {
    backend: Arc<dyn DetectionBackend>,
    tracker: Box<dyn Tracker>,
    feeds: Vec<CameraFeed>,
    frame_interval: u64,
}

impl Pipeline {
    fn step(&mut self, now: DateTime<Utc>) -> Vec<FeedOutput> {
        let clock = now.format("%H:%M:%S").to_string();
        let mut outputs = Vec::with_capacity(self.feeds.len());

        for feed in self.feeds.iter_mut() {
            let frame = match feed.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(camera = %feed.camera.id, "Looping video");
                    if let Err(e) = feed.source.rewind() {
                        warn!(camera = %feed.camera.id, error = %e, "Rewind failed");
                    }
                    continue;
                }
                Err(e) => {
                    warn!(camera = %feed.camera.id, error = %e, "Frame read failed");
                    continue;
                }
            };

            feed.frames_read += 1;
            let run_detector = feed.frames_read % self.frame_interval == 0;

            let mut events = Vec::new();
            let mut track_ids = Vec::new();
            let mut display = if run_detector {
                match self.tracker.track(&frame) {
                    Ok(pass) => {
                        (events, track_ids) = events_from_pass(&feed.camera, &pass.objects, now);
                        feed.last_annotated = Some(pass.annotated.clone());
                        pass.annotated
                    }
                    Err(e) => {
                        warn!(camera = %feed.camera.id, error = %e, "Tracking pass failed");
                        feed.last_annotated.clone().unwrap_or(frame)
                    }
                }
            } else {
                feed.last_annotated.clone().unwrap_or(frame)
            };

            self.backend.stamp_clock(&mut display, &clock);
            let jpeg = match self.backend.encode_jpeg(&display) {
                Ok(jpeg) => Some(jpeg),
                Err(e) => {
                    debug!(camera = %feed.camera.id, error = %e, "Frame encode failed");
                    None
                }
            };

            outputs.push(FeedOutput {
                camera_id: feed.camera.id.clone(),
                events,
                track_ids,
                jpeg,
            });
        }

        outputs
    }
}

pub struct RealProducer {
    /// `None` only while a pass is running on the blocking pool, or after
    /// a pass panicked.
    pipeline: Option<Pipeline>,
}

impl RealProducer {
    /// Loads the model and opens every camera source. A model failure is
    /// returned; a camera that cannot be opened is skipped for the run.
    pub fn new(
        backend: Arc<dyn DetectionBackend>,
        cameras: &[CameraConfig],
        frame_interval: u64,
    ) -> BackendResult<Self> {
        let tracker = backend.load_tracker()?;
        info!(backend = backend.name(), "Detection model loaded");

        let mut feeds = Vec::new();
        for camera in cameras {
            match backend.open_source(camera) {
                Ok(source) => {
                    info!(camera = %camera.id, video = %camera.video, "Camera source opened");
                    feeds.push(CameraFeed {
                        camera: camera.clone(),
                        source,
                        frames_read: 0,
                        last_annotated: None,
                    });
                }
                Err(e) => warn!(camera = %camera.id, error = %e, "Skipping camera"),
            }
        }

        Ok(Self {
            pipeline: Some(Pipeline {
                backend,
                tracker,
                feeds,
                frame_interval: frame_interval.max(1),
            }),
        })
    }

    pub fn active_cameras(&self) -> usize {
        self.pipeline.as_ref().map_or(0, |p| p.feeds.len())
    }

    /// Decodes, tracks and encodes on the blocking pool so a slow model pass
    /// delays this tick only, never the runtime's other tasks.
    pub async fn tick(&mut self, store: &EventStore, now: DateTime<Utc>) -> Vec<DetectionEvent> {
        let Some(mut pipeline) = self.pipeline.take() else {
            return Vec::new();
        };

        let outputs = match task::spawn_blocking(move || {
            let outputs = pipeline.step(now);
            (pipeline, outputs)
        })
        .await
        {
            Ok((pipeline, outputs)) => {
                self.pipeline = Some(pipeline);
                outputs
            }
            Err(e) => {
                error!(error = %e, "Detection pass aborted, real producer stopped");
                return Vec::new();
            }
        };

        let mut emitted = Vec::new();
        for output in outputs {
            if !output.events.is_empty() || !output.track_ids.is_empty() {
                store.append_batch(output.events.clone(), output.track_ids).await;
                emitted.extend(output.events);
            }
            if let Some(jpeg) = output.jpeg {
                store.put_frame(&output.camera_id, Bytes::from(jpeg)).await;
            }
        }

        emitted
    }
}
