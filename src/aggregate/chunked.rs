//! Chunked aggregation of measurement files.
//!
//! Measurement parquet files are read in bounded row windows so memory
//! use stays flat regardless of file size. Each chunk contributes
//! weighted partial sums per (unit, day) group; the partials combine
//! exactly, so results do not depend on where chunk boundaries fall.

use polars::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::constants::{COORD_DECIMALS, columns};
use crate::error::{AggregatorError, Result};
use crate::models::ClimateVariable;

/// Partial-sum column names carried between chunks for one variable
pub fn partial_columns(variable: &ClimateVariable) -> Vec<String> {
    let mut names = Vec::new();
    for value_column in variable.value_columns() {
        if *value_column == columns::TEMP_MAX {
            names.push(format!("{}_max", value_column));
        } else {
            names.push(format!("{}_num", value_column));
            names.push(format!("{}_den", value_column));
        }
    }
    names
}

/// Aggregate one measurement file into per-group weighted partial sums.
///
/// Returns `None` when the file joins to zero rows, which happens when
/// its coordinates all fall outside the weighted grid.
pub fn aggregate_file(
    path: &Path,
    weights: &DataFrame,
    variable: &ClimateVariable,
    chunk_size: usize,
) -> Result<Option<LazyFrame>> {
    let total_rows = count_rows(path)?;
    if total_rows == 0 {
        return Ok(None);
    }

    let source = LazyFrame::scan_parquet(path, Default::default())?;
    check_columns(path, &source, variable)?;

    let mut partials: Vec<LazyFrame> = Vec::new();
    let mut offset: usize = 0;
    while offset < total_rows {
        let window = chunk_size.min(total_rows - offset);
        let chunk = source.clone().slice(offset as i64, window as u32);
        partials.push(aggregate_chunk(chunk, weights, variable));
        offset += window;
    }

    debug!(
        "Aggregated {} in {} chunks of up to {} rows",
        path.display(),
        partials.len(),
        chunk_size
    );

    let combined = concat(partials, UnionArgs::default())?;
    Ok(Some(combined))
}

fn count_rows(path: &Path) -> Result<usize> {
    let frame = LazyFrame::scan_parquet(path, Default::default())?
        .select([len()])
        .collect()?;
    let rows = frame
        .column("len")?
        .get(0)?
        .try_extract::<usize>()
        .unwrap_or(0);
    Ok(rows)
}

fn check_columns(path: &Path, source: &LazyFrame, variable: &ClimateVariable) -> Result<()> {
    let schema = source
        .clone()
        .collect_schema()
        .map_err(AggregatorError::Polars)?;

    let mut required: Vec<&str> = vec![columns::VALID_TIME, columns::LATITUDE, columns::LONGITUDE];
    required.extend_from_slice(variable.value_columns());

    let missing: Vec<String> = required
        .into_iter()
        .filter(|name| schema.get(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AggregatorError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}

/// Aggregate one chunk into per-group partial sums.
///
/// For weighted-mean columns the masked weight excludes non-positive
/// weights and null values, so a group whose weights are all invalid
/// ends with a zero denominator and finalizes to null.
pub fn aggregate_chunk(
    chunk: LazyFrame,
    weights: &DataFrame,
    variable: &ClimateVariable,
) -> LazyFrame {
    let joined = chunk
        .with_columns([
            col(columns::LATITUDE).round(COORD_DECIMALS, RoundMode::HalfToEven),
            col(columns::LONGITUDE).round(COORD_DECIMALS, RoundMode::HalfToEven),
        ])
        .join(
            weights.clone().lazy(),
            [col(columns::LATITUDE), col(columns::LONGITUDE)],
            [col(columns::LATITUDE), col(columns::LONGITUDE)],
            JoinArgs::new(JoinType::Inner),
        )
        .with_columns([
            col(columns::VALID_TIME).dt().year().alias(columns::YEAR),
            col(columns::VALID_TIME).dt().month().alias(columns::MONTH),
            col(columns::VALID_TIME).dt().day().alias(columns::DAY),
        ]);

    let mut aggregations: Vec<Expr> = Vec::new();
    for value_column in variable.value_columns() {
        if *value_column == columns::TEMP_MAX {
            aggregations.push(
                col(*value_column)
                    .max()
                    .alias(format!("{}_max", value_column)),
            );
        } else {
            let masked_weight = when(
                col(columns::WEIGHT)
                    .gt(lit(0.0))
                    .and(col(*value_column).is_not_null()),
            )
            .then(col(columns::WEIGHT))
            .otherwise(lit(NULL));

            aggregations.push(
                (col(*value_column) * masked_weight.clone())
                    .sum()
                    .alias(format!("{}_num", value_column)),
            );
            aggregations.push(
                masked_weight
                    .sum()
                    .alias(format!("{}_den", value_column)),
            );
        }
    }

    joined
        .group_by([
            col(columns::UNIT),
            col(columns::YEAR),
            col(columns::MONTH),
            col(columns::DAY),
        ])
        .agg(aggregations)
}
