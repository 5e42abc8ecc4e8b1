use crate::error::{ConfigError, ConfigResult};
use crate::types::{CameraConfig, SourceType};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, str::FromStr, time::Duration};
use tracing::{error, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// Upper bound on the live window; anything longer is not "live".
pub const MAX_LIVE_WINDOW_SECS: i64 = 3600;

// ===== Mode Selection =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Real,
    Mock,
    Auto,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Mode::Real),
            "mock" => Ok(Mode::Mock),
            "auto" => Ok(Mode::Auto),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Resolves the requested mode against backend availability.
/// Only `Real` or `Mock` come out of this.
pub fn resolve_mode(requested: Mode, backend_available: bool) -> Mode {
    match (requested, backend_available) {
        (Mode::Real, true) | (Mode::Auto, true) => Mode::Real,
        (Mode::Real, false) => {
            warn!("Real mode requested but no detection backend is available, falling back to mock");
            Mode::Mock
        }
        (Mode::Auto, false) | (Mode::Mock, _) => Mode::Mock,
    }
}

// ===== Sections =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Run the detector on every Nth decoded frame.
    pub frame_interval: u64,
    pub real_tick_ms: u64,
    pub mock_tick_ms: u64,
    pub real_buffer_cap: usize,
    pub mock_buffer_cap: usize,
    /// Probability that a simulated camera reports a detection in a tick.
    pub mock_detection_probability: f64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            frame_interval: 3,
            real_tick_ms: 16,
            mock_tick_ms: 2000,
            real_buffer_cap: 2000,
            mock_buffer_cap: 1000,
            mock_detection_probability: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub live_window_secs: i64,
    /// Camera whose live load is the dashboard headline.
    pub primary_camera: String,
    pub simulated_lanes: u32,
    pub simulated_min_load: u64,
    pub simulated_max_load: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            live_window_secs: 5,
            primary_camera: "CAM_002".to_string(),
            simulated_lanes: 2,
            simulated_min_load: 5,
            simulated_max_load: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: u32,
    pub overpass_url: String,
    pub timeout_secs: u64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            center_lat: 10.0229,
            center_lng: 76.3095,
            radius_m: 200,
            overpass_url: "http://overpass-api.de/api/interpreter".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Read from `GEMINI_API_KEY` when not set in the file.
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-flash-latest".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

#[cfg(feature = "kafka")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    pub topic: String,
}

#[cfg(feature = "kafka")]
impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: None,
            topic: "detection-events".to_string(),
        }
    }
}

// ===== Application Config =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub mode: Mode,
    pub stream_poll_ms: u64,
    pub cameras: Vec<CameraConfig>,
    pub producer: ProducerConfig,
    pub aggregation: AggregationConfig,
    pub geometry: GeometryConfig,
    pub advisory: AdvisoryConfig,
    #[cfg(feature = "kafka")]
    pub kafka: KafkaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            mode: Mode::Auto,
            stream_poll_ms: 50,
            cameras: vec![CameraConfig {
                id: "CAM_002".to_string(),
                lat: 10.0229,
                lng: 76.3095,
                name: "Seaport-Airport Rd".to_string(),
                lanes: 8,
                source_type: SourceType::LiveCctv,
                video: "traffic_cam2.mp4".to_string(),
            }],
            producer: ProducerConfig::default(),
            aggregation: AggregationConfig::default(),
            geometry: GeometryConfig::default(),
            advisory: AdvisoryConfig::default(),
            #[cfg(feature = "kafka")]
            kafka: KafkaConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads `TRAFFIC_CONFIG` (or `config.yaml`), then applies environment overrides.
    /// Only an explicitly named file that cannot be loaded is an error.
    pub fn from_env() -> ConfigResult<Self> {
        let explicit = std::env::var("TRAFFIC_CONFIG").ok();
        match explicit.as_deref() {
            Some(path) => Self::from_sources(path, true, |key| std::env::var(key).ok()),
            None => Self::from_sources(DEFAULT_CONFIG_PATH, false, |key| std::env::var(key).ok()),
        }
    }

    /// `explicit` marks a path the operator named. A missing or broken file at
    /// the default path logs and falls back to built-in defaults.
    pub fn from_sources<F>(path: &str, explicit: bool, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if explicit {
            let config = Self::load(path)?;
            info!(path, "Configuration loaded");
            config
        } else if Path::new(path).exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!(path, "Configuration loaded");
                    config
                }
                Err(e) => {
                    error!(path, error = %e, "Ignoring unreadable configuration, using built-in defaults");
                    Self::default()
                }
            }
        } else {
            info!("No {} found, using built-in defaults", path);
            Self::default()
        };

        config.apply_overrides(lookup);
        config.sanitize();
        Ok(config)
    }

    /// Applies `GEMINI_API_KEY`, `TRAFFIC_MODE` and `TRAFFIC_BIND` from `lookup`.
    /// An unrecognised mode is logged and the current mode kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.advisory.api_key = Some(key);
        }
        if let Some(mode) = lookup("TRAFFIC_MODE") {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => warn!(error = %e, mode = ?self.mode, "Ignoring TRAFFIC_MODE"),
            }
        }
        if let Some(bind) = lookup("TRAFFIC_BIND") {
            self.bind = bind;
        }
    }

    /// Pulls out-of-range values back into range, warning for each one.
    pub fn sanitize(&mut self) {
        for camera in self.cameras.iter_mut().filter(|c| c.lanes == 0) {
            warn!(camera = %camera.id, "Camera configured with 0 lanes, using 1");
            camera.lanes = 1;
        }
        if self.aggregation.simulated_lanes == 0 {
            warn!("simulated_lanes is 0, using 1");
            self.aggregation.simulated_lanes = 1;
        }

        let window = self.aggregation.live_window_secs;
        let clamped = window.clamp(1, MAX_LIVE_WINDOW_SECS);
        if clamped != window {
            warn!(configured = window, using = clamped, "live_window_secs out of range");
            self.aggregation.live_window_secs = clamped;
        }

        if self.advisory.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.advisory.api_key = None;
        }
    }

    pub fn buffer_cap(&self, mode: Mode) -> usize {
        match mode {
            Mode::Real => self.producer.real_buffer_cap,
            Mode::Mock | Mode::Auto => self.producer.mock_buffer_cap,
        }
    }

    pub fn tick_interval(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Real => Duration::from_millis(self.producer.real_tick_ms),
            Mode::Mock | Mode::Auto => Duration::from_millis(self.producer.mock_tick_ms),
        }
    }
}
