//! Query facade and producer lifecycle. Built once by `main` and shared
//! with the HTTP handlers.

use crate::aggregate::{aggregate, AggregationParams};
use crate::config::{resolve_mode, AppConfig, Mode};
use crate::geometry::{resolve_road_points, RoadGeometry};
use crate::history::{history_slice, HistorySummary, Slot};
use crate::producer::{DetectionBackend, EventSink, ProducerStrategy, RealProducer, SimulatedProducer};
use crate::store::EventStore;
use crate::types::{CameraConfig, SimulatedNode, TrafficSnapshot};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

pub struct TrafficService {
    store: Arc<EventStore>,
    cameras: Vec<CameraConfig>,
    nodes: Vec<SimulatedNode>,
    params: AggregationParams,
    mode: Mode,
    period: Duration,
    sink: Option<Arc<dyn EventSink>>,
    producer: Mutex<Option<ProducerStrategy>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TrafficService {
    pub fn new(
        store: Arc<EventStore>,
        cameras: Vec<CameraConfig>,
        nodes: Vec<SimulatedNode>,
        params: AggregationParams,
        producer: ProducerStrategy,
        period: Duration,
    ) -> Self {
        Self {
            store,
            cameras,
            nodes,
            params,
            mode: producer.mode(),
            period,
            sink: None,
            producer: Mutex::new(Some(producer)),
            handle: Mutex::new(None),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Resolves the run mode, seeds simulated nodes from `geometry` and
    /// prepares the producer. Nothing here fails: a missing backend or a
    /// model that will not load degrades to mock mode.
    pub async fn build(
        config: &AppConfig,
        backend: Option<Arc<dyn DetectionBackend>>,
        geometry: &dyn RoadGeometry,
    ) -> Self {
        let mut mode = resolve_mode(config.mode, backend.is_some());

        let road_points = resolve_road_points(geometry, &config.geometry).await;
        let nodes = SimulatedNode::from_road_points(&road_points);

        let mut real = None;
        if let (Mode::Real, Some(backend)) = (mode, backend) {
            match RealProducer::new(backend, &config.cameras, config.producer.frame_interval) {
                Ok(producer) => {
                    if producer.active_cameras() == 0 {
                        warn!("No camera source could be opened, real mode will emit no events");
                    }
                    real = Some(producer);
                }
                Err(e) => {
                    error!(error = %e, "Failed to load detection model, falling back to mock");
                    mode = Mode::Mock;
                }
            }
        }

        let strategy = match real {
            Some(producer) => ProducerStrategy::Real(producer),
            None => ProducerStrategy::Simulated(SimulatedProducer::new(
                config.cameras.clone(),
                config.producer.mock_detection_probability,
            )),
        };

        info!(
            mode = ?mode,
            cameras = config.cameras.len(),
            simulated_nodes = nodes.len(),
            "Traffic service ready"
        );

        Self::new(
            Arc::new(EventStore::new(config.buffer_cap(mode))),
            config.cameras.clone(),
            nodes,
            AggregationParams::from(&config.aggregation),
            strategy,
            config.tick_interval(mode),
        )
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn cameras(&self) -> &[CameraConfig] {
        &self.cameras
    }

    pub fn simulated_nodes(&self) -> &[SimulatedNode] {
        &self.nodes
    }

    /// Spawns the producer task. The producer runs once per service, so
    /// later calls are no-ops.
    pub async fn start(&self) {
        let Some(producer) = self.producer.lock().await.take() else {
            return;
        };
        let task = producer.run(self.store.clone(), self.period, self.sink.clone());
        *self.handle.lock().await = Some(tokio::spawn(task));
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Aborts the producer task and waits for it to wind down.
    pub async fn stop(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            info!("Producer stopped");
        }
    }

    pub async fn snapshot(&self) -> TrafficSnapshot {
        self.snapshot_at(Utc::now()).await
    }

    /// The store lock is held only for the copy; aggregation runs on it afterwards.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> TrafficSnapshot {
        let copy = self.store.snapshot().await;
        let mut rng = rand::thread_rng();
        aggregate(&copy, &self.cameras, &self.nodes, now, &self.params, &mut rng)
    }

    pub async fn history(&self, slot: Slot) -> HistorySummary {
        let copy = self.store.snapshot().await;
        history_slice(&copy.events, &self.cameras, slot)
    }

    pub async fn latest_frame(&self, camera_id: &str) -> Option<Bytes> {
        self.store.latest_frame(camera_id).await
    }
}
