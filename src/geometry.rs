//! Road coordinates for seeding simulated sensor nodes.

use crate::config::GeometryConfig;
use crate::error::{GeometryError, GeometryResult};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tracing::{info, warn};

/// Points along Seaport-Airport Rd and its cross street, used whenever the
/// map service cannot be reached.
pub const FALLBACK_ROAD_POINTS: [(f64, f64); 16] = [
    (10.0300, 76.3115),
    (10.0290, 76.3116),
    (10.0280, 76.3117),
    (10.0270, 76.3118),
    (10.0260, 76.3119),
    (10.0250, 76.3120),
    (10.0240, 76.3121),
    (10.0230, 76.3122),
    (10.0220, 76.3123),
    (10.0210, 76.3124),
    (10.0250, 76.3090),
    (10.0250, 76.3100),
    (10.0250, 76.3110),
    (10.0252, 76.3130),
    (10.0253, 76.3140),
    (10.0255, 76.3150),
];

pub trait RoadGeometry: Send + Sync {
    fn road_points(&self, lat: f64, lng: f64, radius_m: u32) -> BoxFuture<'_, GeometryResult<Vec<(f64, f64)>>>;
}

// ===== Overpass =====

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node { id: u64, lat: f64, lon: f64 },
    Way { nodes: Vec<u64> },
    #[serde(other)]
    Other,
}

/// Flattens an Overpass response into way-ordered points, keeping every
/// other node of each way so the map is not saturated.
pub fn parse_overpass(body: &str) -> GeometryResult<Vec<(f64, f64)>> {
    let response: OverpassResponse = serde_json::from_str(body)?;

    let mut nodes = HashMap::new();
    let mut ways = Vec::new();
    for element in response.elements {
        match element {
            OverpassElement::Node { id, lat, lon } => {
                nodes.insert(id, (lat, lon));
            }
            OverpassElement::Way { nodes: way_nodes } => ways.push(way_nodes),
            OverpassElement::Other => {}
        }
    }

    let points = ways
        .iter()
        .flat_map(|way| way.iter().step_by(2))
        .filter_map(|id| nodes.get(id).copied())
        .collect();
    Ok(points)
}

pub struct OverpassClient {
    url: String,
    http_client: reqwest::Client,
}

impl OverpassClient {
    pub fn new(cfg: &GeometryConfig) -> GeometryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            url: cfg.overpass_url.clone(),
            http_client,
        })
    }

    async fn fetch(&self, lat: f64, lng: f64, radius_m: u32) -> GeometryResult<Vec<(f64, f64)>> {
        let query = format!(
            "[out:json];way[\"highway\"](around:{},{},{});(._;>;);out body;",
            radius_m, lat, lng
        );

        let response = self
            .http_client
            .get(&self.url)
            .query(&[("data", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeometryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_overpass(&body)
    }
}

impl RoadGeometry for OverpassClient {
    fn road_points(&self, lat: f64, lng: f64, radius_m: u32) -> BoxFuture<'_, GeometryResult<Vec<(f64, f64)>>> {
        Box::pin(self.fetch(lat, lng, radius_m))
    }
}

/// Fetches road points around the configured center, falling back to
/// [`FALLBACK_ROAD_POINTS`] on error or an empty result.
pub async fn resolve_road_points(source: &dyn RoadGeometry, cfg: &GeometryConfig) -> Vec<(f64, f64)> {
    match source
        .road_points(cfg.center_lat, cfg.center_lng, cfg.radius_m)
        .await
    {
        Ok(points) if !points.is_empty() => {
            info!(points = points.len(), "Fetched road points from map service");
            points
        }
        Ok(_) => {
            warn!("Map service returned no road points, using fallback coordinates");
            FALLBACK_ROAD_POINTS.to_vec()
        }
        Err(e) => {
            warn!(error = %e, "Road geometry fetch failed, using fallback coordinates");
            FALLBACK_ROAD_POINTS.to_vec()
        }
    }
}
