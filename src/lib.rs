//! ERA5 Aggregator Library
//!
//! A Rust library for preparing analysis-ready climate panels from ERA5
//! reanalysis data and administrative boundary shapefiles.
//!
//! This library provides tools for:
//! - Cleaning boundary shapefiles: duplicate identifiers, invalid
//!   geometries, country-code mismatches, and sliver overlap repair
//! - Reconstructing the ERA5 grid from measurement file coordinates
//! - Computing exact area-weighted intersections between grid cells and
//!   administrative units
//! - Memory-bounded chunked aggregation to a complete unit-by-day panel
//! - Gap interpolation for units without grid coverage
//! - Bulk measurement download with a retrying worker pool

pub mod aggregate;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod constants;
pub mod download;
pub mod error;
pub mod grid;
pub mod interpolate;
pub mod matching;
pub mod models;
pub mod report;
pub mod weighting;

// Re-export commonly used types
pub use config::AggregatorConfig;
pub use error::{AggregatorError, Result};
