//! Error handling for aggregation pipeline operations.
//!
//! Provides error types with context for boundary cleaning, grid
//! construction, spatial weighting, and panel assembly failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Boundary file not found at path: {path}")]
    BoundaryNotFound { path: PathBuf },

    #[error("Missing required columns in {path}: {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("Country '{name}' not found in boundary data")]
    CountryNotFound { name: String },

    #[error("Ambiguous country name '{name}': matches both '{first}' and '{second}'")]
    AmbiguousCountry {
        name: String,
        first: String,
        second: String,
    },

    #[error("No measurement files found in {path}")]
    NoInputFiles { path: PathBuf },

    #[error("No valid grid cells could be constructed from {path}")]
    NoValidGridCells { path: PathBuf },

    #[error("Grid extent and boundary extent do not overlap")]
    NoSpatialOverlap,

    #[error("All intersection weights are zero")]
    AllWeightsZero,

    #[error("No climate data produced from input files")]
    NoClimateData,

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Download failed: {message}")]
    Download { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
