//! Fatal handling of unusable measurement files

use polars::prelude::*;
use tempfile::TempDir;

use crate::aggregate::AggregationPipeline;
use crate::aggregate::chunked::aggregate_file;
use crate::boundary::io::write_boundary_file;
use crate::boundary::tests::{square, unit};
use crate::constants::columns;
use crate::error::AggregatorError;
use crate::models::ClimateVariable;

// 2000-01-01T00:00:00Z in epoch milliseconds
const DAY_ONE_MS: i64 = 946_684_800_000;

/// Temperature file deliberately missing the temp_max column
fn write_incomplete_temperature_file(path: &std::path::Path) {
    let mut frame = df!(
        columns::VALID_TIME => [DAY_ONE_MS],
        columns::LATITUDE => [0.5f64],
        columns::LONGITUDE => [0.5f64],
        columns::TEMP_MEAN => [20.0f64],
    )
    .unwrap()
    .lazy()
    .with_column(col(columns::VALID_TIME).cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
    .collect()
    .unwrap();

    let file = std::fs::File::create(path).unwrap();
    ParquetWriter::new(file).finish(&mut frame).unwrap();
}

#[test]
fn test_missing_column_is_reported_per_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("era5_2000_temp.parquet");
    write_incomplete_temperature_file(&path);

    let weights = df!(
        columns::LATITUDE => [0.5f64],
        columns::LONGITUDE => [0.5f64],
        columns::UNIT => ["TZ001"],
        columns::INTERSECTION_AREA => [0.0625f64],
        columns::CELL_AREA => [0.0625f64],
        columns::WEIGHT => [1.0f64],
    )
    .unwrap();

    let result = aggregate_file(&path, &weights, &ClimateVariable::Temperature, 1_000);
    assert!(matches!(
        result,
        Err(AggregatorError::MissingColumns { ref columns, .. }) if columns == &["temp_max"]
    ));
}

#[tokio::test]
async fn test_missing_column_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let boundary = dir.path().join("boundary.shp");
    write_boundary_file(&boundary, &[unit("TZ001", square(0.0, 0.0, 1.0))]).unwrap();
    write_incomplete_temperature_file(&dir.path().join("era5_2000_temp.parquet"));

    let pipeline = AggregationPipeline::new(
        boundary,
        dir.path().to_path_buf(),
        None,
        "Testland".to_string(),
    )
    .unwrap();

    let result = pipeline.run().await;
    assert!(matches!(
        result,
        Err(AggregatorError::MissingColumns { .. })
    ));
}
