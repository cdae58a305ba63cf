//! Spatial intersection weighting between grid cells and admin units.
//!
//! Joins the grid against the cleaned unit geometries with a cascade of
//! progressively looser predicates, computes exact intersection areas,
//! and produces the cell-to-unit weight table reused across every
//! measurement file.

use geo::{Area, BooleanOps, BoundingRect, Intersects, Relate, Within};
use geo_types::{MultiPolygon, Polygon, Rect};
use polars::prelude::*;
use rstar::{AABB, RTree, RTreeObject};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::constants::columns;
use crate::error::{AggregatorError, Result};
use crate::grid::Grid;
use crate::models::AdminUnit;

/// Weight table plus the units that matched no cell at all
#[derive(Debug)]
pub struct WeightingResult {
    /// Columns: latitude, longitude, smallest, intersection_area,
    /// cell_area, weight
    pub table: DataFrame,
    /// Units needing gap interpolation
    pub dropped_units: Vec<String>,
}

struct UnitEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for UnitEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

type Predicate = fn(&Polygon<f64>, &MultiPolygon<f64>) -> bool;

fn predicate_cascade() -> [(&'static str, Predicate); 3] {
    [
        ("intersects", |cell, unit| cell.intersects(unit)),
        ("overlaps", |cell, unit| cell.relate(unit).is_overlaps()),
        ("within", |cell, unit| cell.is_within(unit)),
    ]
}

fn rect_overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}

fn grid_extent(grid: &Grid) -> Option<Rect<f64>> {
    let mut extent: Option<Rect<f64>> = None;
    for cell in &grid.cells {
        let rect = cell.polygon.bounding_rect()?;
        extent = Some(match extent {
            None => rect,
            Some(current) => Rect::new(
                geo_types::coord! {
                    x: current.min().x.min(rect.min().x),
                    y: current.min().y.min(rect.min().y),
                },
                geo_types::coord! {
                    x: current.max().x.max(rect.max().x),
                    y: current.max().y.max(rect.max().y),
                },
            ),
        });
    }
    extent
}

fn units_extent(units: &[AdminUnit]) -> Option<Rect<f64>> {
    let mut extent: Option<Rect<f64>> = None;
    for unit in units {
        let Some(rect) = unit.geometry.bounding_rect() else {
            continue;
        };
        extent = Some(match extent {
            None => rect,
            Some(current) => Rect::new(
                geo_types::coord! {
                    x: current.min().x.min(rect.min().x),
                    y: current.min().y.min(rect.min().y),
                },
                geo_types::coord! {
                    x: current.max().x.max(rect.max().x),
                    y: current.max().y.max(rect.max().y),
                },
            ),
        });
    }
    extent
}

/// Compute the weight table for a grid against the cleaned units.
///
/// Fatal when the two extents are disjoint or when every computed weight
/// is zero; either means the wrong boundary or the wrong measurement
/// source was supplied.
pub fn compute_weights(grid: &Grid, units: &[AdminUnit]) -> Result<WeightingResult> {
    let grid_bbox = grid_extent(grid).ok_or(AggregatorError::NoSpatialOverlap)?;
    let units_bbox = units_extent(units).ok_or(AggregatorError::NoSpatialOverlap)?;
    if !rect_overlaps(&grid_bbox, &units_bbox) {
        return Err(AggregatorError::NoSpatialOverlap);
    }

    let envelopes: Vec<UnitEnvelope> = units
        .iter()
        .enumerate()
        .filter_map(|(index, unit)| {
            unit.geometry.bounding_rect().map(|rect| UnitEnvelope {
                index,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    // Try each predicate until one produces matches at all
    let mut matches: Vec<(usize, usize)> = Vec::new();
    for (name, predicate) in predicate_cascade() {
        matches = collect_matches(grid, units, &tree, predicate);
        if !matches.is_empty() {
            debug!("Spatial join matched {} pairs with '{}'", matches.len(), name);
            break;
        }
        warn!("Spatial join found no pairs with '{}', loosening predicate", name);
    }

    if matches.is_empty() {
        return Err(AggregatorError::NoSpatialOverlap);
    }

    let mut latitudes = Vec::new();
    let mut longitudes = Vec::new();
    let mut identifiers = Vec::new();
    let mut intersection_areas = Vec::new();
    let mut cell_areas = Vec::new();
    let mut weights = Vec::new();
    let mut matched_units: HashSet<usize> = HashSet::new();

    for (cell_index, unit_index) in matches {
        let cell = &grid.cells[cell_index];
        let unit = &units[unit_index];

        let cell_multi = MultiPolygon::new(vec![cell.polygon.clone()]);
        let intersection_area = unit.geometry.intersection(&cell_multi).unsigned_area();
        if intersection_area <= 0.0 {
            continue;
        }

        let cell_area = cell.polygon.unsigned_area();
        let weight = (intersection_area / cell_area).clamp(0.0, 1.0);

        latitudes.push(cell.latitude);
        longitudes.push(cell.longitude);
        identifiers.push(unit.smallest.as_str());
        intersection_areas.push(intersection_area);
        cell_areas.push(cell_area);
        weights.push(weight);
        matched_units.insert(unit_index);
    }

    if weights.is_empty() || weights.iter().all(|w| *w == 0.0) {
        return Err(AggregatorError::AllWeightsZero);
    }

    let raw = df!(
        columns::LATITUDE => latitudes,
        columns::LONGITUDE => longitudes,
        columns::UNIT => identifiers,
        columns::INTERSECTION_AREA => intersection_areas,
        columns::CELL_AREA => cell_areas,
        columns::WEIGHT => weights,
    )?;

    // Multi-part geometries can match the same cell more than once; sum
    // their contributions and clip the combined weight back into range.
    let table = raw
        .lazy()
        .group_by([
            col(columns::LATITUDE),
            col(columns::LONGITUDE),
            col(columns::UNIT),
        ])
        .agg([
            col(columns::INTERSECTION_AREA).sum(),
            col(columns::CELL_AREA).first(),
            col(columns::WEIGHT).sum(),
        ])
        .with_column(col(columns::WEIGHT).clip(lit(0.0), lit(1.0)))
        .collect()?;

    let dropped_units: Vec<String> = units
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_units.contains(index))
        .map(|(_, unit)| unit.smallest.clone())
        .collect();

    if !dropped_units.is_empty() {
        info!(
            "{} units have no grid coverage and will need interpolation",
            dropped_units.len()
        );
    }

    Ok(WeightingResult {
        table,
        dropped_units,
    })
}

fn collect_matches(
    grid: &Grid,
    units: &[AdminUnit],
    tree: &RTree<UnitEnvelope>,
    predicate: Predicate,
) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();

    for (cell_index, cell) in grid.cells.iter().enumerate() {
        let Some(rect) = cell.polygon.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            if predicate(&cell.polygon, &units[candidate.index].geometry) {
                matches.push((cell_index, candidate.index));
            }
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::grid_from_coordinates;
    use geo_types::polygon;

    fn square_unit(id: &str, min_x: f64, min_y: f64, size: f64) -> AdminUnit {
        let geometry = MultiPolygon::new(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]]);
        AdminUnit {
            smallest: id.to_string(),
            country: "Testland".to_string(),
            country_code: id[..2].to_string(),
            geometry,
        }
    }

    #[test]
    fn test_weights_are_bounded() {
        let grid = grid_from_coordinates(&[(0.0, 0.0), (0.0, 0.25), (0.25, 0.0)], 0.25).unwrap();
        let units = vec![square_unit("TZ001", -0.5, -0.5, 1.0)];

        let result = compute_weights(&grid, &units).unwrap();
        let weights = result.table.column("weight").unwrap().f64().unwrap();

        for weight in weights.into_no_null_iter() {
            assert!((0.0..=1.0).contains(&weight));
        }
    }

    #[test]
    fn test_fully_covered_cell_has_weight_one() {
        let grid = grid_from_coordinates(&[(0.0, 0.0)], 0.25).unwrap();
        let units = vec![square_unit("TZ001", -1.0, -1.0, 2.0)];

        let result = compute_weights(&grid, &units).unwrap();
        let weight = result
            .table
            .column("weight")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();

        assert!((weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_extents_are_fatal() {
        let grid = grid_from_coordinates(&[(0.0, 0.0)], 0.25).unwrap();
        let units = vec![square_unit("TZ001", 50.0, 50.0, 1.0)];

        let result = compute_weights(&grid, &units);
        assert!(matches!(result, Err(AggregatorError::NoSpatialOverlap)));
    }

    #[test]
    fn test_unmatched_unit_is_reported_dropped() {
        // Two cells near the origin, one unit far outside the grid but
        // with an extent overlapping the grid bbox through another unit.
        let grid =
            grid_from_coordinates(&[(0.0, 0.0), (0.0, 0.25)], 0.25).unwrap();
        let units = vec![
            square_unit("TZ001", -0.5, -0.5, 1.0),
            square_unit("TZ002", 0.05, 40.0, 0.5),
        ];

        let result = compute_weights(&grid, &units).unwrap();

        assert_eq!(result.dropped_units, vec!["TZ002".to_string()]);
    }

    #[test]
    fn test_quarter_covered_cell_weight() {
        // Unit covers exactly one quarter of the single cell.
        let grid = grid_from_coordinates(&[(0.0, 0.0)], 0.25).unwrap();
        let units = vec![square_unit("TZ001", -0.125, -0.125, 0.125)];

        let result = compute_weights(&grid, &units).unwrap();
        let weight = result
            .table
            .column("weight")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();

        // Covered area is 0.125 x 0.125 of a 0.25 x 0.25 cell
        assert!((weight - 0.25).abs() < 1e-9);
    }
}
