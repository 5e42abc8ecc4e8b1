//! Background event producer: one strategy, chosen once at startup.

pub mod real;
pub mod simulated;

#[cfg(feature = "kafka")]
pub mod kafka;

use crate::config::Mode;
use crate::store::EventStore;
use crate::types::DetectionEvent;
use chrono::Utc;
use futures::future::BoxFuture;
use std::{sync::Arc, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

pub use real::{DetectionBackend, Frame, FrameSource, RealProducer, TrackPass, TrackedObject, Tracker};
pub use simulated::SimulatedProducer;

/// Downstream consumer of emitted events. Failures stay inside the sink.
pub trait EventSink: Send + Sync {
    fn publish<'a>(&'a self, events: &'a [DetectionEvent]) -> BoxFuture<'a, ()>;
}

pub enum ProducerStrategy {
    Real(RealProducer),
    Simulated(SimulatedProducer),
}

impl ProducerStrategy {
    pub fn mode(&self) -> Mode {
        match self {
            ProducerStrategy::Real(_) => Mode::Real,
            ProducerStrategy::Simulated(_) => Mode::Mock,
        }
    }

    pub async fn tick(&mut self, store: &EventStore) -> Vec<DetectionEvent> {
        let now = Utc::now();
        match self {
            ProducerStrategy::Real(producer) => producer.tick(store, now).await,
            ProducerStrategy::Simulated(producer) => producer.tick(store, now).await,
        }
    }

    /// Runs until the task is aborted, sleeping `period` between ticks.
    pub async fn run(
        mut self,
        store: Arc<EventStore>,
        period: Duration,
        sink: Option<Arc<dyn EventSink>>,
    ) {
        info!(mode = ?self.mode(), period_ms = period.as_millis() as u64, "Producer started");

        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let events = self.tick(&store).await;
            if let Some(sink) = &sink {
                if !events.is_empty() {
                    sink.publish(&events).await;
                }
            }
        }
    }
}
