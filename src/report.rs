//! Report rendering and atomic output writing.
//!
//! Outputs are staged to a temporary path in the destination directory
//! and renamed into place, so an aborted run never clobbers a previous
//! good output.

use polars::prelude::{CsvWriter, DataFrame, ParquetCompression, ParquetWriter, SerWriter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::CleaningReport;

/// Staging path next to the final destination, safe to rename from
pub fn staged_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// Write a DataFrame to parquet via a staged temporary file
pub fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staged_path(path);
    let file = fs::File::create(&staged)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)?;
    fs::rename(&staged, path)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Write a DataFrame to CSV via a staged temporary file
pub fn write_csv_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staged_path(path);
    let file = fs::File::create(&staged)?;
    CsvWriter::new(file).finish(df)?;
    fs::rename(&staged, path)?;
    Ok(())
}

/// Render the cleaning report as human-readable text
pub fn render_cleaning_report(report: &CleaningReport) -> String {
    let mut out = String::new();
    out.push_str("Boundary Cleaning Report\n");
    out.push_str("========================\n\n");
    out.push_str(&format!("Input records:  {}\n", report.input_count));
    out.push_str(&format!("Final records:  {}\n", report.final_count));
    out.push_str(&format!(
        "Retention rate: {:.1}%\n\n",
        report.retention_rate() * 100.0
    ));

    out.push_str("Steps:\n");
    for step in &report.steps {
        out.push_str(&format!(
            "  {:<24} removed {:>6}, remaining {:>6}\n",
            step.name, step.removed, step.remaining
        ));
    }

    out.push_str(&format!(
        "\nOverlapping pairs found:    {}\n",
        report.overlap_pairs_found
    ));
    out.push_str(&format!(
        "Overlapping pairs repaired: {}\n",
        report.overlap_pairs_repaired
    ));
    out.push_str(&format!(
        "Geometries salvaged:        {}\n",
        report.geometries_salvaged
    ));
    out
}

/// Write the cleaning report text via a staged temporary file
pub fn write_cleaning_report(report: &CleaningReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staged_path(path);
    fs::write(&staged, render_cleaning_report(report))?;
    fs::rename(&staged, path)?;
    Ok(())
}
