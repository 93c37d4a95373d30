use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Coordinate ({lat}, {lon}) maps to cell ({row}, {col}) outside the {height}x{width} grid")]
    OutOfBounds {
        lat: f64,
        lon: f64,
        row: i64,
        col: i64,
        height: usize,
        width: usize,
    },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Interpolation failed: {0}")]
    Interpolation(String),

    #[error("Cached artifact {} is corrupt: {reason}", .path.display())]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Artifact reassembly failed: {0}")]
    ArtifactReassembly(String),
}

impl ProcessingError {
    pub fn cache_corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ProcessingError::CacheCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
