//! Gap interpolation for units without grid coverage.
//!
//! Units too small or oddly shaped to intersect any grid cell end up in
//! the panel with all-null measurements. Interpolation fills those rows
//! from spatially nearby donor units. Only nearest-neighbour donation is
//! implemented; the buffer and IDW methods fall back to it with a
//! warning until they are built out.

use geo::Centroid;
use polars::prelude::*;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use tracing::{debug, info, warn};

use crate::constants::columns;
use crate::error::Result;
use crate::models::{AdminUnit, InterpolationMethod};

type DonorPoint = GeomWithData<[f64; 2], String>;

/// Fill all-null panel rows for uncovered units from donor units.
///
/// Returns the updated panel and the number of units interpolated. The
/// panel passes through untouched when interpolation is disabled or no
/// units need filling.
pub fn interpolate_gaps(
    panel: DataFrame,
    units: &[AdminUnit],
    uncovered: &[String],
    method: InterpolationMethod,
) -> Result<(DataFrame, usize)> {
    if uncovered.is_empty() || method == InterpolationMethod::None {
        return Ok((panel, 0));
    }

    match method {
        InterpolationMethod::Buffer | InterpolationMethod::Idw => {
            warn!(
                "Interpolation method '{}' is not implemented, using nearest neighbour",
                method.as_str()
            );
        }
        _ => {}
    }

    let donors = donor_tree(units, uncovered);
    if donors.size() == 0 {
        warn!("No donor units with valid centroids, leaving gaps unfilled");
        return Ok((panel, 0));
    }

    // Recipients keep their own identifier but take a copy of the
    // nearest donor's measurement rows.
    let mut assignments: Vec<(String, String)> = Vec::new();
    for unit in units {
        if !uncovered.contains(&unit.smallest) {
            continue;
        }
        let Some(centroid) = unit.geometry.centroid() else {
            warn!("Unit '{}' has no centroid, leaving gap unfilled", unit.smallest);
            continue;
        };
        if let Some(donor) = donors.nearest_neighbor(&[centroid.x(), centroid.y()]) {
            debug!("Unit '{}' takes values from '{}'", unit.smallest, donor.data);
            assignments.push((unit.smallest.clone(), donor.data.clone()));
        }
    }

    if assignments.is_empty() {
        return Ok((panel, 0));
    }

    // Drop the recipients' all-null rows, then append relabelled donor
    // rows in their place.
    let filled_count = assignments.len();
    let recipient_filter = assignments
        .iter()
        .fold(lit(true), |accumulated, (recipient, _)| {
            accumulated.and(col(columns::UNIT).neq(lit(recipient.clone())))
        });

    let mut frames: Vec<LazyFrame> = vec![panel.clone().lazy().filter(recipient_filter)];
    for (recipient, donor) in &assignments {
        frames.push(
            panel
                .clone()
                .lazy()
                .filter(col(columns::UNIT).eq(lit(donor.clone())))
                .with_column(lit(recipient.clone()).alias(columns::UNIT)),
        );
    }

    let filled = concat(frames, UnionArgs::default())?
        .sort(
            [columns::UNIT, columns::YEAR, columns::MONTH, columns::DAY],
            SortMultipleOptions::default(),
        )
        .collect()?;

    info!("Interpolated {} uncovered units", filled_count);
    Ok((filled, filled_count))
}

fn donor_tree(units: &[AdminUnit], uncovered: &[String]) -> RTree<DonorPoint> {
    let points: Vec<DonorPoint> = units
        .iter()
        .filter(|unit| !uncovered.contains(&unit.smallest))
        .filter_map(|unit| {
            unit.geometry
                .centroid()
                .map(|centroid| DonorPoint::new([centroid.x(), centroid.y()], unit.smallest.clone()))
        })
        .collect();
    RTree::bulk_load(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{MultiPolygon, polygon};

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
            country_code: "TZ".to_string(),
            geometry,
        }
    }

    fn three_unit_panel() -> DataFrame {
        df!(
            columns::UNIT => ["TZ001", "TZ002", "TZ003"],
            columns::YEAR => [2000i32, 2000, 2000],
            columns::MONTH => [1i32, 1, 1],
            columns::DAY => [1i32, 1, 1],
            columns::TEMP_MEAN => [Some(20.0), Some(30.0), None],
        )
        .unwrap()
    }

    #[test]
    fn test_no_gaps_passthrough() {
        let panel = three_unit_panel();
        let units = vec![square_unit("TZ001", 0.0, 0.0, 1.0)];

        let (result, count) =
            interpolate_gaps(panel.clone(), &units, &[], InterpolationMethod::NearestNeighbor)
                .unwrap();

        assert_eq!(count, 0);
        assert_eq!(result.height(), panel.height());
    }

    #[test]
    fn test_method_none_passthrough() {
        let panel = three_unit_panel();
        let units = vec![square_unit("TZ001", 0.0, 0.0, 1.0)];
        let uncovered = vec!["TZ003".to_string()];

        let (_, count) =
            interpolate_gaps(panel, &units, &uncovered, InterpolationMethod::None).unwrap();

        assert_eq!(count, 0);
    }

    #[test]
    fn test_nearest_donor_fills_gap() {
        // TZ003 sits next to TZ002 and far from TZ001, so it must take
        // TZ002's value.
        let panel = three_unit_panel();
        let units = vec![
            square_unit("TZ001", 0.0, 0.0, 1.0),
            square_unit("TZ002", 10.0, 10.0, 1.0),
            square_unit("TZ003", 11.5, 10.0, 1.0),
        ];
        let uncovered = vec!["TZ003".to_string()];

        let (result, count) =
            interpolate_gaps(panel, &units, &uncovered, InterpolationMethod::NearestNeighbor)
                .unwrap();

        assert_eq!(count, 1);
        assert_eq!(result.height(), 3);

        let filled = result
            .lazy()
            .filter(col(columns::UNIT).eq(lit("TZ003")))
            .collect()
            .unwrap();
        let value = filled
            .column(columns::TEMP_MEAN)
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert!((value - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_falls_back_to_nearest() {
        let panel = three_unit_panel();
        let units = vec![
            square_unit("TZ001", 0.0, 0.0, 1.0),
            square_unit("TZ002", 10.0, 10.0, 1.0),
            square_unit("TZ003", 11.5, 10.0, 1.0),
        ];
        let uncovered = vec!["TZ003".to_string()];

        let (_, count) =
            interpolate_gaps(panel, &units, &uncovered, InterpolationMethod::Buffer).unwrap();

        assert_eq!(count, 1);
    }
}
