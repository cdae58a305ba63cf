//! Application constants for the ERA5 aggregator
//!
//! This module contains configuration constants, default values,
//! and column name mappings used throughout the application.

// =============================================================================
// Coordinate and Grid Constants
// =============================================================================

/// Decimal places used when rounding coordinates before matching
///
/// Raw measurement files and the constructed grid must round identically,
/// otherwise the join between them silently drops rows.
pub const COORD_DECIMALS: u32 = 3;

/// Fallback grid spacing in degrees when spacing cannot be inferred
///
/// ERA5 data is published on a 0.25 degree grid, so this is the spacing
/// assumed when a file contains fewer than two distinct coordinate values.
pub const DEFAULT_GRID_STEP: f64 = 0.25;

/// Nudge applied to degenerate (zero width or height) grid cells, in degrees
pub const DEGENERATE_CELL_NUDGE: f64 = 0.001;

// =============================================================================
// Boundary Cleaning Constants
// =============================================================================

/// Maximum mutual overlap (percent of each polygon's area) treated as a sliver
pub const SLIVER_OVERLAP_MAX_PCT: f64 = 5.0;

/// Minimum area retention for the boundary-split repair strategy
pub const BOUNDARY_SPLIT_MIN_RETENTION: f64 = 0.8;

/// Minimum area retention for convex-hull geometry salvage
pub const HULL_SALVAGE_MIN_RETENTION: f64 = 0.5;

/// Epsilon in degrees for the simplification salvage step
pub const SIMPLIFY_EPSILON: f64 = 1e-7;

// =============================================================================
// Aggregation Constants
// =============================================================================

/// Default number of rows read per chunk from measurement files
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Default gap interpolation buffer radius in kilometres
pub const DEFAULT_BUFFER_RADIUS_KM: f64 = 50.0;

/// Default power parameter for inverse-distance weighting
pub const DEFAULT_IDW_POWER: f64 = 2.0;

/// Default neighbour count for distance-based interpolation
pub const DEFAULT_MAX_NEIGHBORS: usize = 5;

// =============================================================================
// Country Matching Constants
// =============================================================================

/// Minimum similarity score for a fuzzy country-name match (0.0 - 1.0)
pub const FUZZY_SCORE_CUTOFF: f64 = 0.85;

/// Minimum score gap between the best and second-best fuzzy match
///
/// When two candidates score within this margin of each other the match
/// is ambiguous and the run aborts rather than guessing.
pub const FUZZY_AMBIGUITY_MARGIN: f64 = 0.05;

// =============================================================================
// File and Directory Constants
// =============================================================================

/// Filename suffix identifying temperature measurement files
pub const TEMP_FILE_SUFFIX: &str = "_temp.parquet";

/// Filename suffix identifying precipitation measurement files
pub const PRECIP_FILE_SUFFIX: &str = "_precip.parquet";

/// Regex pattern for extracting four-digit year segments from a filename
pub const YEAR_PATTERN: &str = r"_(\d{4})";

/// Default output filename for the subunit-day panel
pub const PANEL_OUTPUT_FILENAME: &str = "subunit_day_panel.parquet";

/// Cleaning report filename written alongside the cleaned shapefile
pub const CLEANING_REPORT_FILENAME: &str = "cleaning_report.txt";

// =============================================================================
// Download Constants
// =============================================================================

/// Default number of concurrent download workers
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 4;

/// Environment variable holding the climate API token
pub const API_TOKEN_ENV_VAR: &str = "ERA5_API_TOKEN";

// =============================================================================
// Column Name Constants
// =============================================================================

/// Column names in boundary attributes and measurement files
pub mod columns {
    // Boundary attribute columns
    pub const SMALLEST: &str = "SMALLEST";
    pub const COUNTRY: &str = "COUNTRY";
    pub const COUNTRY_CODE: &str = "CNTRY_CD";

    // Measurement file columns
    pub const VALID_TIME: &str = "valid_time";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const TEMP_MEAN: &str = "temp_mean";
    pub const TEMP_MAX: &str = "temp_max";
    pub const PRECIP: &str = "precip";

    // Derived panel columns
    pub const UNIT: &str = "smallest";
    pub const PANEL_COUNTRY: &str = "country";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const DAY: &str = "day";

    // Weighting table columns
    pub const INTERSECTION_AREA: &str = "intersection_area";
    pub const CELL_AREA: &str = "cell_area";
    pub const WEIGHT: &str = "weight";
}

/// Panel output column order
pub const PANEL_COLUMN_ORDER: &[&str] = &[
    columns::UNIT,
    columns::PANEL_COUNTRY,
    columns::YEAR,
    columns::MONTH,
    columns::DAY,
    columns::TEMP_MEAN,
    columns::TEMP_MAX,
    columns::PRECIP,
];

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the dropped-records CSV filename for a cleaning step
pub fn dropped_records_filename(step: &str) -> String {
    format!("dropped_{}.csv", step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_column_order() {
        assert_eq!(PANEL_COLUMN_ORDER.len(), 8);
        assert_eq!(PANEL_COLUMN_ORDER[0], "smallest");
        assert_eq!(PANEL_COLUMN_ORDER[7], "precip");
    }

    #[test]
    fn test_dropped_records_filename() {
        assert_eq!(
            dropped_records_filename("null_geometry"),
            "dropped_null_geometry.csv"
        );
    }
}
