#![warn(keyword_idents_2024)]
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traffic_monitor::{
    advisory::AdvisoryService,
    api::{self, ApiState},
    config::AppConfig,
    geometry::OverpassClient,
    geometry::{FALLBACK_ROAD_POINTS, RoadGeometry},
    producer::DetectionBackend,
    service::TrafficService,
};

// ===== Fallback geometry when the HTTP client cannot be built =====

struct StaticGeometry;

impl RoadGeometry for StaticGeometry {
    fn road_points(
        &self,
        _lat: f64,
        _lng: f64,
        _radius_m: u32,
    ) -> futures::future::BoxFuture<'_, traffic_monitor::error::GeometryResult<Vec<(f64, f64)>>> {
        Box::pin(async { Ok(FALLBACK_ROAD_POINTS.to_vec()) })
    }
}

// ===== Main Application =====
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("traffic_monitor=info,tower_http=warn")),
        )
        .init();

    info!("Starting Traffic Monitor");

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(bind = %config.bind, mode = ?config.mode, cameras = config.cameras.len(), "Configuration ready");

    // No detector is linked into this binary; embedders pass their own.
    let backend: Option<Arc<dyn DetectionBackend>> = None;

    let geometry: Box<dyn RoadGeometry> = match OverpassClient::new(&config.geometry) {
        Ok(client) => Box::new(client),
        Err(e) => {
            warn!(error = %e, "Could not build map client, using fallback coordinates");
            Box::new(StaticGeometry)
        }
    };

    #[allow(unused_mut)]
    let mut service = TrafficService::build(&config, backend, geometry.as_ref()).await;

    #[cfg(feature = "kafka")]
    if let Some(brokers) = config.kafka.brokers.as_deref() {
        match traffic_monitor::producer::kafka::KafkaSink::new(brokers, &config.kafka.topic) {
            Ok(sink) => {
                info!(brokers, topic = %config.kafka.topic, "Mirroring detection events to Kafka");
                service = service.with_sink(Arc::new(sink));
            }
            Err(e) => warn!(error = %e, "Kafka sink unavailable, events stay local"),
        }
    }

    let service = Arc::new(service);
    service.start().await;

    let advisory = Arc::new(AdvisoryService::from_config(&config.advisory));
    let app = api::router(ApiState {
        service: service.clone(),
        advisory,
        stream_poll: Duration::from_millis(config.stream_poll_ms),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    service.stop().await;
    Ok(())
}
