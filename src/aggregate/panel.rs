//! Panel assembly: combining partial sums, merging variables, and
//! reindexing to the complete unit-day grid.
//!
//! The finalize step divides accumulated weighted sums exactly once, so
//! weighted means are identical no matter how files or chunks split the
//! data. The completed panel holds exactly one row per unit per calendar
//! day with explicit nulls where no measurement exists.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{PANEL_COLUMN_ORDER, columns};
use crate::error::{AggregatorError, Result};
use crate::models::ClimateVariable;
use crate::report;

/// Combine per-chunk partial sums and finalize the variable's columns.
///
/// Numerators and denominators are summed across all partials, maxima
/// take the group maximum, and the final weighted mean is the quotient,
/// null when the denominator is zero.
pub fn finalize_variable(
    partials: Vec<LazyFrame>,
    variable: &ClimateVariable,
) -> Result<Option<DataFrame>> {
    if partials.is_empty() {
        return Ok(None);
    }

    let mut combine: Vec<Expr> = Vec::new();
    let mut finalize: Vec<Expr> = Vec::new();
    let mut keep: Vec<Expr> = vec![
        col(columns::UNIT),
        col(columns::YEAR),
        col(columns::MONTH),
        col(columns::DAY),
    ];

    for value_column in variable.value_columns() {
        if *value_column == columns::TEMP_MAX {
            let max_name = format!("{}_max", value_column);
            combine.push(col(max_name.as_str()).max());
            finalize.push(col(max_name.as_str()).alias(*value_column));
        } else {
            let num_name = format!("{}_num", value_column);
            let den_name = format!("{}_den", value_column);
            combine.push(col(num_name.as_str()).sum());
            combine.push(col(den_name.as_str()).sum());
            finalize.push(
                when(col(den_name.as_str()).gt(lit(0.0)))
                    .then(col(num_name.as_str()) / col(den_name.as_str()))
                    .otherwise(lit(NULL))
                    .alias(*value_column),
            );
        }
        keep.push(col(*value_column));
    }

    let frame = concat(partials, UnionArgs::default())?
        .group_by([
            col(columns::UNIT),
            col(columns::YEAR),
            col(columns::MONTH),
            col(columns::DAY),
        ])
        .agg(combine)
        .with_columns(finalize)
        .select(keep)
        .collect()?;

    if frame.height() == 0 {
        return Ok(None);
    }

    debug!(
        "Finalized {:?} into {} group rows",
        variable,
        frame.height()
    );
    Ok(Some(frame))
}

/// Outer-merge the finalized variables on the unit-day key.
///
/// Fatal when neither variable produced any data.
pub fn merge_variables(
    temperature: Option<DataFrame>,
    precipitation: Option<DataFrame>,
) -> Result<DataFrame> {
    let keys = [
        col(columns::UNIT),
        col(columns::YEAR),
        col(columns::MONTH),
        col(columns::DAY),
    ];

    match (temperature, precipitation) {
        (Some(temp), Some(precip)) => {
            let merged = temp
                .lazy()
                .join(
                    precip.lazy(),
                    keys.clone(),
                    keys,
                    JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
                )
                .collect()?;
            Ok(merged)
        }
        (Some(temp), None) => Ok(temp),
        (None, Some(precip)) => Ok(precip),
        (None, None) => Err(AggregatorError::NoClimateData),
    }
}

/// Enumerate every calendar day in the inclusive year range
fn calendar_days(first_year: i32, last_year: i32) -> (Vec<i32>, Vec<i8>, Vec<i8>) {
    let mut years = Vec::new();
    let mut months = Vec::new();
    let mut days = Vec::new();

    let mut date = NaiveDate::from_ymd_opt(first_year, 1, 1);
    while let Some(current) = date {
        if current.year() > last_year {
            break;
        }
        years.push(current.year());
        months.push(current.month() as i8);
        days.push(current.day() as i8);
        date = current.succ_opt();
    }

    (years, months, days)
}

/// Reindex the merged data to the complete unit-by-day panel.
///
/// Every unit gets a row for every calendar day in the year range, with
/// nulls where no measurement was aggregated. Output dtypes are
/// narrowed: 16-bit date parts and 32-bit measurements.
pub fn complete_panel(
    merged: DataFrame,
    unit_ids: &[String],
    country: &str,
    year_range: (i32, i32),
) -> Result<DataFrame> {
    let (first_year, last_year) = year_range;
    let (years, months, days) = calendar_days(first_year, last_year);
    let day_count = years.len();

    // When only one variable had input files the other's columns are
    // absent; pad them with nulls so the output schema is stable.
    let mut pad: Vec<Expr> = Vec::new();
    for name in [columns::TEMP_MEAN, columns::TEMP_MAX, columns::PRECIP] {
        if merged.column(name).is_err() {
            pad.push(lit(NULL).cast(DataType::Float64).alias(name));
        }
    }

    let units_frame = df!(columns::UNIT => unit_ids)?;
    let dates_frame = df!(
        columns::YEAR => years,
        columns::MONTH => months,
        columns::DAY => days,
    )?;

    let keys = [
        col(columns::UNIT),
        col(columns::YEAR),
        col(columns::MONTH),
        col(columns::DAY),
    ];

    let panel = units_frame
        .lazy()
        .cross_join(dates_frame.lazy(), None)
        .join(
            merged
                .lazy()
                .with_columns(pad)
                .with_columns([
                    col(columns::YEAR).cast(DataType::Int32),
                    col(columns::MONTH).cast(DataType::Int8),
                    col(columns::DAY).cast(DataType::Int8),
                ]),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            lit(country).alias(columns::PANEL_COUNTRY),
            col(columns::YEAR).cast(DataType::Int16),
            col(columns::MONTH).cast(DataType::Int16),
            col(columns::DAY).cast(DataType::Int16),
            col(columns::TEMP_MEAN).cast(DataType::Float32),
            col(columns::TEMP_MAX).cast(DataType::Float32),
            col(columns::PRECIP).cast(DataType::Float32),
        ])
        .select(
            PANEL_COLUMN_ORDER
                .iter()
                .map(|name| col(*name))
                .collect::<Vec<_>>(),
        )
        .sort(
            [columns::UNIT, columns::YEAR, columns::MONTH, columns::DAY],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let expected = unit_ids.len() * day_count;
    if panel.height() != expected {
        return Err(AggregatorError::ProcessingFailed {
            path: Path::new("panel").to_path_buf(),
            reason: format!(
                "Panel has {} rows, expected {} ({} units x {} days)",
                panel.height(),
                expected,
                unit_ids.len(),
                day_count
            ),
        });
    }

    info!(
        "Panel complete: {} units x {} days = {} rows",
        unit_ids.len(),
        day_count,
        panel.height()
    );
    Ok(panel)
}

/// Write the finished panel atomically
pub fn write_panel(panel: &mut DataFrame, path: &Path) -> Result<()> {
    report::write_parquet_atomic(panel, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_days_regular_year() {
        let (years, _, _) = calendar_days(2001, 2001);
        assert_eq!(years.len(), 365);
    }

    #[test]
    fn test_calendar_days_leap_year() {
        let (years, months, days) = calendar_days(2000, 2000);
        assert_eq!(years.len(), 366);
        // Feb 29 must be present
        assert!(
            months
                .iter()
                .zip(days.iter())
                .any(|(m, d)| *m == 2 && *d == 29)
        );
    }

    #[test]
    fn test_calendar_days_multi_year() {
        let (years, _, _) = calendar_days(1999, 2000);
        assert_eq!(years.len(), 365 + 366);
    }
}
