//! Core data structures and types for climate aggregation.
//!
//! Defines climate variable types, administrative unit and grid cell
//! geometries, cleaning reports, and processing statistics used
//! throughout the library.

use geo_types::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{PRECIP_FILE_SUFFIX, TEMP_FILE_SUFFIX, columns};

/// Climate variable families present in the raw measurement files
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClimateVariable {
    Temperature,
    Precipitation,
}

impl ClimateVariable {
    /// Detect variable type from the filename suffix convention
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();

        if name.ends_with(TEMP_FILE_SUFFIX) {
            Some(ClimateVariable::Temperature)
        } else if name.ends_with(PRECIP_FILE_SUFFIX) {
            Some(ClimateVariable::Precipitation)
        } else {
            None
        }
    }

    /// Filename suffix used for files of this variable
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ClimateVariable::Temperature => TEMP_FILE_SUFFIX,
            ClimateVariable::Precipitation => PRECIP_FILE_SUFFIX,
        }
    }

    /// Measurement columns expected in files of this variable
    pub fn value_columns(&self) -> &'static [&'static str] {
        match self {
            ClimateVariable::Temperature => &[columns::TEMP_MEAN, columns::TEMP_MAX],
            ClimateVariable::Precipitation => &[columns::PRECIP],
        }
    }
}

/// Gap interpolation strategies for units without grid coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Copy the full day series of the nearest unit by centroid distance
    NearestNeighbor,
    /// Average donors within a fixed radius (falls back to nearest neighbour)
    Buffer,
    /// Inverse-distance weighted donor average (falls back to nearest neighbour)
    Idw,
    /// Leave missing units as explicit nulls
    None,
}

impl InterpolationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMethod::NearestNeighbor => "nearest-neighbor",
            InterpolationMethod::Buffer => "buffer",
            InterpolationMethod::Idw => "idw",
            InterpolationMethod::None => "none",
        }
    }
}

/// An administrative subunit with attributes and cleaned geometry
#[derive(Debug, Clone)]
pub struct AdminUnit {
    /// Unique subunit identifier, prefixed by the country code
    pub smallest: String,
    /// Country name
    pub country: String,
    /// Country code prefix expected on the identifier
    pub country_code: String,
    /// Unit geometry in WGS84
    pub geometry: MultiPolygon<f64>,
}

/// One rectangular grid cell centred on a rounded coordinate pair
#[derive(Debug, Clone)]
pub struct GridCell {
    pub latitude: f64,
    pub longitude: f64,
    pub polygon: Polygon<f64>,
}

/// Per-step record in the boundary cleaning log
#[derive(Debug, Clone, Serialize)]
pub struct CleaningStep {
    pub name: String,
    pub removed: usize,
    pub remaining: usize,
}

/// Summary of an entire boundary cleaning run
#[derive(Debug, Default, Serialize)]
pub struct CleaningReport {
    pub input_count: usize,
    pub steps: Vec<CleaningStep>,
    pub final_count: usize,
    pub overlap_pairs_found: usize,
    pub overlap_pairs_repaired: usize,
    pub geometries_salvaged: usize,
}

impl CleaningReport {
    /// Record the outcome of one cleaning step
    pub fn record_step(&mut self, name: &str, removed: usize, remaining: usize) {
        self.steps.push(CleaningStep {
            name: name.to_string(),
            removed,
            remaining,
        });
        self.final_count = remaining;
    }

    /// Fraction of input records surviving the full pipeline
    pub fn retention_rate(&self) -> f64 {
        if self.input_count == 0 {
            return 0.0;
        }
        self.final_count as f64 / self.input_count as f64
    }
}

/// Processing statistics for an aggregation run
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub total_rows: usize,
    pub units: usize,
    pub interpolated_units: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}
