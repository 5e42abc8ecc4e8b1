use super::EventSink;
use crate::types::DetectionEvent;
use futures::future::BoxFuture;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::time::Duration;
use tracing::warn;

/// Mirrors detection events to a Kafka topic, keyed by camera id.
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(KafkaSink {
            producer,
            topic: topic.to_string(),
        })
    }

    async fn send_all(&self, events: &[DetectionEvent]) {
        for event in events {
            let payload = match serde_json::to_string(event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Could not serialise detection event");
                    continue;
                }
            };

            let record = FutureRecord::to(&self.topic)
                .payload(&payload)
                .key(&event.camera_id);
            if let Err((e, _)) = self
                .producer
                .send(record, Timeout::After(Duration::from_secs(0)))
                .await
            {
                warn!(topic = %self.topic, error = %e, "Kafka publish failed");
            }
        }
    }
}

impl EventSink for KafkaSink {
    fn publish<'a>(&'a self, events: &'a [DetectionEvent]) -> BoxFuture<'a, ()> {
        Box::pin(self.send_all(events))
    }
}
