//! Error types for each collaborator boundary.

use thiserror::Error;

/// Road geometry lookup failures. Callers fall back to a static point list.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("map request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("map service returned status {0}")]
    Status(u16),

    #[error("malformed map response: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type GeometryResult<T> = Result<T, GeometryError>;

/// Text-generation failures. Converted to a fixed message before reaching users.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text generation service returned status {0}")]
    Status(u16),

    #[error("text generation returned no candidates")]
    EmptyResponse,
}

pub type AdvisoryResult<T> = Result<T, AdvisoryError>;

/// Detection backend failures: model loading, video sources, encoding.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("detection model unavailable: {0}")]
    Model(String),

    #[error("video source {source_path} for {camera_id} could not be opened: {reason}")]
    SourceUnavailable {
        camera_id: String,
        source_path: String,
        reason: String,
    },

    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("frame encode failed: {0}")]
    Encode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown mode {0:?}, expected real, mock or auto")]
    UnknownMode(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("unknown slot {0:?}, expected morning, midday, evening or night")]
    UnknownSlot(String),
}

pub type HistoryResult<T> = Result<T, HistoryError>;
