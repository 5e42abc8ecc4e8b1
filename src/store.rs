//! Bounded, lock-guarded buffer of detection events plus the latest
//! encoded frame per camera.

use crate::types::DetectionEvent;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

/// Point-in-time copy handed to the aggregation engine.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub events: Vec<DetectionEvent>,
    pub distinct_vehicles: u64,
}

#[derive(Default)]
struct StoreInner {
    events: VecDeque<DetectionEvent>,
    unique_ids: HashSet<u64>,
    frames: HashMap<String, Bytes>,
}

impl StoreInner {
    fn prune(&mut self, cap: usize) {
        while self.events.len() > cap {
            self.events.pop_front();
        }
    }
}

pub struct EventStore {
    inner: Mutex<StoreInner>,
    cap: usize,
}

impl EventStore {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub async fn append(&self, event: DetectionEvent) {
        let mut inner = self.inner.lock().await;
        inner.events.push_back(event);
        inner.prune(self.cap);
    }

    /// Appends one detection pass atomically and records its track ids
    /// in the lifetime set.
    pub async fn append_batch<I>(&self, events: Vec<DetectionEvent>, track_ids: I)
    where
        I: IntoIterator<Item = u64>,
    {
        let mut inner = self.inner.lock().await;
        inner.unique_ids.extend(track_ids);
        inner.events.extend(events);
        inner.prune(self.cap);
    }

    pub async fn query<P>(&self, predicate: P) -> Vec<DetectionEvent>
    where
        P: Fn(&DetectionEvent) -> bool,
    {
        let inner = self.inner.lock().await;
        inner.events.iter().filter(|e| predicate(e)).cloned().collect()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock().await;
        StoreSnapshot {
            events: inner.events.iter().cloned().collect(),
            distinct_vehicles: inner.unique_ids.len() as u64,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.events.is_empty()
    }

    pub async fn distinct_vehicles(&self) -> u64 {
        self.inner.lock().await.unique_ids.len() as u64
    }

    pub async fn put_frame(&self, camera_id: &str, jpeg: Bytes) {
        let mut inner = self.inner.lock().await;
        inner.frames.insert(camera_id.to_string(), jpeg);
    }

    /// `None` until the producer has encoded a frame for this camera.
    pub async fn latest_frame(&self, camera_id: &str) -> Option<Bytes> {
        self.inner.lock().await.frames.get(camera_id).cloned()
    }
}
