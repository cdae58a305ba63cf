//! Grid construction from measurement file coordinates.
//!
//! Builds one rectangular cell per distinct rounded coordinate pair in
//! the first measurement file. Cell spacing is inferred from the data,
//! with a fixed fallback when inference is impossible. The grid is built
//! once per source and reused for every file from that source.

use geo::Area;
use geo_types::{Polygon, Rect, coord};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::{COORD_DECIMALS, DEGENERATE_CELL_NUDGE, columns};
use crate::error::{AggregatorError, Result};
use crate::models::GridCell;

/// Grid of rectangular cells aligned to the measurement coordinates
#[derive(Debug, Clone)]
pub struct Grid {
    pub cells: Vec<GridCell>,
    pub lat_step: f64,
    pub lon_step: f64,
}

/// Build the grid from the coordinates of one measurement file
pub fn build_grid(sample_path: &Path, fallback_step: f64) -> Result<Grid> {
    let coordinates = LazyFrame::scan_parquet(sample_path, Default::default())?
        .select([
            col(columns::LATITUDE).round(COORD_DECIMALS, RoundMode::HalfToEven),
            col(columns::LONGITUDE).round(COORD_DECIMALS, RoundMode::HalfToEven),
        ])
        .drop_nulls(None)
        .group_by([col(columns::LATITUDE), col(columns::LONGITUDE)])
        .agg::<Vec<Expr>>(vec![])
        .collect()?;

    let latitudes = coordinates.column(columns::LATITUDE)?.f64()?;
    let longitudes = coordinates.column(columns::LONGITUDE)?.f64()?;
    let pairs: Vec<(f64, f64)> = latitudes
        .into_no_null_iter()
        .zip(longitudes.into_no_null_iter())
        .collect();

    debug!(
        "Read {} distinct coordinate pairs from {}",
        pairs.len(),
        sample_path.display()
    );

    grid_from_coordinates(&pairs, fallback_step).ok_or_else(|| {
        AggregatorError::NoValidGridCells {
            path: sample_path.to_path_buf(),
        }
    })
}

/// Build a grid from already-rounded coordinate pairs.
///
/// Returns `None` when no valid cell can be constructed.
pub fn grid_from_coordinates(pairs: &[(f64, f64)], fallback_step: f64) -> Option<Grid> {
    if pairs.is_empty() {
        return None;
    }

    let lats: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let lons: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let lat_step = estimate_step(lats, fallback_step, "latitude");
    let lon_step = estimate_step(lons, fallback_step, "longitude");

    let cells: Vec<GridCell> = pairs
        .iter()
        .filter_map(|&(latitude, longitude)| {
            make_cell(latitude, longitude, lat_step, lon_step)
        })
        .collect();

    if cells.is_empty() {
        return None;
    }

    Some(Grid {
        cells,
        lat_step,
        lon_step,
    })
}

/// Estimate axis spacing as the median of positive consecutive differences
fn estimate_step(mut values: Vec<f64>, fallback_step: f64, axis: &str) -> f64 {
    values.sort_by(f64::total_cmp);
    values.dedup();

    if values.len() < 2 {
        warn!(
            "Fewer than two distinct {} values, assuming {} degree spacing",
            axis, fallback_step
        );
        return fallback_step;
    }

    let mut diffs: Vec<f64> = values
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .collect();

    if diffs.is_empty() {
        warn!(
            "No positive {} spacing found, assuming {} degree spacing",
            axis, fallback_step
        );
        return fallback_step;
    }

    diffs.sort_by(f64::total_cmp);
    let mid = diffs.len() / 2;
    let median = if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        diffs[mid]
    };

    if median > 0.0 {
        median
    } else {
        warn!(
            "Zero median {} spacing, assuming {} degree spacing",
            axis, fallback_step
        );
        fallback_step
    }
}

/// Build one cell rectangle, nudging degenerate extents
fn make_cell(latitude: f64, longitude: f64, lat_step: f64, lon_step: f64) -> Option<GridCell> {
    let mut min_x = longitude - lon_step / 2.0;
    let mut max_x = longitude + lon_step / 2.0;
    let mut min_y = latitude - lat_step / 2.0;
    let mut max_y = latitude + lat_step / 2.0;

    if max_x <= min_x {
        min_x = longitude - DEGENERATE_CELL_NUDGE;
        max_x = longitude + DEGENERATE_CELL_NUDGE;
    }
    if max_y <= min_y {
        min_y = latitude - DEGENERATE_CELL_NUDGE;
        max_y = latitude + DEGENERATE_CELL_NUDGE;
    }

    let rect = Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: max_y },
    );
    let polygon: Polygon<f64> = rect.to_polygon();

    if polygon.unsigned_area() <= 0.0 {
        return None;
    }

    Some(GridCell {
        latitude,
        longitude,
        polygon,
    })
}
