//! Configuration management and validation.
//!
//! Provides the configuration structure for cleaning and aggregation
//! parameters, with builder methods and validation rules.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BUFFER_RADIUS_KM, DEFAULT_CHUNK_SIZE, DEFAULT_DOWNLOAD_WORKERS, DEFAULT_GRID_STEP,
    DEFAULT_IDW_POWER, DEFAULT_MAX_NEIGHBORS, FUZZY_SCORE_CUTOFF, SLIVER_OVERLAP_MAX_PCT,
};
use crate::error::{AggregatorError, Result};
use crate::models::InterpolationMethod;

/// Global configuration for cleaning and aggregation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Rows read per chunk from measurement parquet files
    pub chunk_size: usize,

    /// Grid spacing in degrees used when spacing cannot be inferred
    pub grid_fallback_step: f64,

    /// Maximum mutual overlap percentage treated as a repairable sliver
    pub sliver_threshold_pct: f64,

    /// Strategy for filling units without grid coverage
    pub interpolation_method: InterpolationMethod,

    /// Radius in kilometres for buffer-based interpolation
    pub buffer_radius_km: f64,

    /// Power parameter for inverse-distance weighting
    pub idw_power: f64,

    /// Neighbour count for distance-based interpolation
    pub max_neighbors: usize,

    /// Enable fuzzy country-name matching
    pub fuzzy_matching: bool,

    /// Minimum similarity score accepted by the fuzzy matcher
    pub fuzzy_score_cutoff: f64,

    /// Number of concurrent download workers
    pub download_workers: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            grid_fallback_step: DEFAULT_GRID_STEP,
            sliver_threshold_pct: SLIVER_OVERLAP_MAX_PCT,
            interpolation_method: InterpolationMethod::NearestNeighbor,
            buffer_radius_km: DEFAULT_BUFFER_RADIUS_KM,
            idw_power: DEFAULT_IDW_POWER,
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            fuzzy_matching: true,
            fuzzy_score_cutoff: FUZZY_SCORE_CUTOFF,
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
        }
    }
}

impl AggregatorConfig {
    /// Create configuration with a custom chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Create configuration with a custom sliver threshold
    pub fn with_sliver_threshold(mut self, threshold_pct: f64) -> Self {
        self.sliver_threshold_pct = threshold_pct;
        self
    }

    /// Create configuration with a custom interpolation method
    pub fn with_interpolation_method(mut self, method: InterpolationMethod) -> Self {
        self.interpolation_method = method;
        self
    }

    /// Disable fuzzy country-name matching
    pub fn with_exact_matching(mut self) -> Self {
        self.fuzzy_matching = false;
        self
    }

    /// Create configuration with a custom download worker count
    pub fn with_download_workers(mut self, workers: usize) -> Self {
        self.download_workers = workers;
        self
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AggregatorError::Configuration {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        if self.grid_fallback_step <= 0.0 {
            return Err(AggregatorError::Configuration {
                message: "grid_fallback_step must be positive".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.sliver_threshold_pct) {
            return Err(AggregatorError::Configuration {
                message: format!(
                    "sliver_threshold_pct must be in [0, 100], got {}",
                    self.sliver_threshold_pct
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.fuzzy_score_cutoff) {
            return Err(AggregatorError::Configuration {
                message: format!(
                    "fuzzy_score_cutoff must be in [0, 1], got {}",
                    self.fuzzy_score_cutoff
                ),
            });
        }
        if self.download_workers == 0 {
            return Err(AggregatorError::Configuration {
                message: "download_workers must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AggregatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = AggregatorConfig::default()
            .with_chunk_size(50_000)
            .with_sliver_threshold(2.5)
            .with_interpolation_method(InterpolationMethod::None)
            .with_exact_matching();

        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.sliver_threshold_pct, 2.5);
        assert_eq!(config.interpolation_method, InterpolationMethod::None);
        assert!(!config.fuzzy_matching);
    }

    #[test]
    fn test_download_workers_builder() {
        let config = AggregatorConfig::default().with_download_workers(8);
        assert_eq!(config.download_workers, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_download_workers_rejected() {
        let config = AggregatorConfig::default().with_download_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = AggregatorConfig::default().with_chunk_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = AggregatorConfig::default().with_sliver_threshold(150.0);
        assert!(config.validate().is_err());
    }
}
