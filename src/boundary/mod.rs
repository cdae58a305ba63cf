//! Boundary cleaning engine.
//!
//! Repairs a raw administrative shapefile through an ordered sequence of
//! irreversible steps: dropping unusable records, resolving sliver
//! overlaps, dissolving duplicate identifiers, and revalidating every
//! geometry before the cleaned file is written.

pub mod io;
pub mod repair;

#[cfg(test)]
pub mod tests;

use colored::*;
use geo::BooleanOps;
use polars::prelude::{DataFrame, df};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::AggregatorConfig;
use crate::constants::{CLEANING_REPORT_FILENAME, dropped_records_filename};
use crate::error::{AggregatorError, Result};
use crate::models::{AdminUnit, CleaningReport};
use crate::report;

use self::io::RawBoundaryRecord;
use self::repair::{resolve_overlaps, salvage_geometry, valid_multipolygon};

/// Records excluded during cleaning, kept for diagnostic CSV output
#[derive(Debug, Default)]
pub struct DroppedRecords {
    pub missing_identifier: Vec<(String, String, String)>,
    pub null_geometry: Vec<(String, String, String)>,
    pub code_mismatch: Vec<(String, String, String)>,
    pub invalid_geometry: Vec<(String, String, String)>,
}

fn dropped_row(record: &RawBoundaryRecord) -> (String, String, String) {
    (
        record.label(),
        record.country.clone().unwrap_or_default(),
        record.country_code.clone().unwrap_or_default(),
    )
}

fn unit_row(unit: &AdminUnit) -> (String, String, String) {
    (
        unit.smallest.clone(),
        unit.country.clone(),
        unit.country_code.clone(),
    )
}

/// Boundary cleaner for raw administrative shapefiles
#[derive(Debug)]
pub struct BoundaryCleaner {
    input_path: PathBuf,
    output_path: PathBuf,
    report_dir: PathBuf,
    config: AggregatorConfig,
}

impl BoundaryCleaner {
    /// Create a new cleaner for the given input and output paths
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Result<Self> {
        if !input_path.exists() {
            return Err(AggregatorError::BoundaryNotFound { path: input_path });
        }

        let report_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            input_path,
            output_path,
            report_dir,
            config: AggregatorConfig::default(),
        })
    }

    /// Configure the cleaner
    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the directory for report and dropped-record outputs
    pub fn with_report_dir(mut self, report_dir: PathBuf) -> Self {
        self.report_dir = report_dir;
        self
    }

    /// Run the full cleaning pipeline and write all outputs
    pub fn clean(&self) -> Result<CleaningReport> {
        println!(
            "{}",
            "Starting boundary cleaning".bright_green().bold()
        );
        println!(
            "  {} {}",
            "Input:".bright_cyan(),
            self.input_path.display()
        );
        println!(
            "  {} {}",
            "Output:".bright_cyan(),
            self.output_path.display()
        );

        let records = io::read_boundary_file(&self.input_path)?;
        println!(
            "  {} {} boundary records",
            "Found".bright_green(),
            records.len().to_string().bright_white().bold()
        );

        let (units, cleaning_report, dropped) =
            clean_records(records, self.config.sliver_threshold_pct);

        io::write_boundary_file(&self.output_path, &units)?;
        self.write_side_outputs(&cleaning_report, &dropped)?;

        println!("\n{}", "Cleaning Summary".bright_green().bold());
        for step in &cleaning_report.steps {
            println!(
                "  {} removed {}, remaining {}",
                format!("{}:", step.name).bright_cyan(),
                step.removed.to_string().bright_white(),
                step.remaining.to_string().bright_white().bold()
            );
        }
        println!(
            "  {} {:.1}%",
            "Retention:".bright_cyan(),
            cleaning_report.retention_rate() * 100.0
        );

        Ok(cleaning_report)
    }

    fn write_side_outputs(
        &self,
        cleaning_report: &CleaningReport,
        dropped: &DroppedRecords,
    ) -> Result<()> {
        report::write_cleaning_report(
            cleaning_report,
            &self.report_dir.join(CLEANING_REPORT_FILENAME),
        )?;

        let listings = [
            ("missing_identifier", &dropped.missing_identifier),
            ("null_geometry", &dropped.null_geometry),
            ("code_mismatch", &dropped.code_mismatch),
            ("invalid_geometry", &dropped.invalid_geometry),
        ];

        for (step, rows) in listings {
            if rows.is_empty() {
                continue;
            }
            let mut frame = dropped_frame(rows)?;
            let path = self.report_dir.join(dropped_records_filename(step));
            report::write_csv_atomic(&mut frame, &path)?;
            info!("Wrote {} dropped records to {}", rows.len(), path.display());
        }

        Ok(())
    }
}

fn dropped_frame(rows: &[(String, String, String)]) -> Result<DataFrame> {
    let smallest: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
    let country: Vec<&str> = rows.iter().map(|r| r.1.as_str()).collect();
    let code: Vec<&str> = rows.iter().map(|r| r.2.as_str()).collect();

    Ok(df!(
        "smallest" => smallest,
        "country" => country,
        "country_code" => code,
    )?)
}

/// Run the cleaning steps over in-memory records.
///
/// Separated from file handling so the pipeline is testable without
/// shapefile round trips.
pub fn clean_records(
    records: Vec<RawBoundaryRecord>,
    sliver_threshold_pct: f64,
) -> (Vec<AdminUnit>, CleaningReport, DroppedRecords) {
    let mut cleaning_report = CleaningReport {
        input_count: records.len(),
        ..Default::default()
    };
    let mut dropped = DroppedRecords::default();

    // Step 1: records without a usable identifier cannot be carried further
    let (with_id, missing_id): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| r.smallest.as_deref().is_some_and(|s| !s.is_empty()));
    dropped.missing_identifier = missing_id.iter().map(dropped_row).collect();
    cleaning_report.record_step("missing_identifier", missing_id.len(), with_id.len());

    // Step 2: null or non-polygon geometries
    let (with_geometry, null_geometry): (Vec<_>, Vec<_>) = with_id
        .into_iter()
        .partition(|r| r.geometry.is_some());
    dropped.null_geometry = null_geometry.iter().map(dropped_row).collect();
    cleaning_report.record_step("null_geometry", null_geometry.len(), with_geometry.len());

    // Step 3: identifier must start with the record's own country code.
    // Mismatches are reported and excluded, never rewritten.
    let (matched, mismatched): (Vec<_>, Vec<_>) =
        with_geometry.into_iter().partition(|r| {
            match (&r.smallest, &r.country_code) {
                (Some(smallest), Some(code)) => smallest.starts_with(code.as_str()),
                _ => false,
            }
        });
    dropped.code_mismatch = mismatched.iter().map(dropped_row).collect();
    cleaning_report.record_step("code_mismatch", mismatched.len(), matched.len());

    // Promote to admin units; fields are guaranteed present by the partitions
    let mut units: Vec<AdminUnit> = matched
        .into_iter()
        .filter_map(|r| {
            Some(AdminUnit {
                smallest: r.smallest?,
                country: r.country.unwrap_or_default(),
                country_code: r.country_code?,
                geometry: r.geometry?,
            })
        })
        .collect();

    // Step 4: dissolve duplicate identifiers into single units
    let before_dissolve = units.len();
    units = dissolve_by_identifier(units);
    cleaning_report.record_step(
        "dissolve_duplicates",
        before_dissolve - units.len(),
        units.len(),
    );

    // Step 5: resolve sliver overlaps with the repair cascade
    let overlap_stats = resolve_overlaps(&mut units, sliver_threshold_pct);
    cleaning_report.overlap_pairs_found = overlap_stats.pairs_found;
    cleaning_report.overlap_pairs_repaired = overlap_stats.pairs_repaired;
    cleaning_report.geometries_salvaged = overlap_stats.geometries_salvaged;
    cleaning_report.record_step(
        "sliver_overlaps",
        overlap_stats.units_removed,
        units.len(),
    );

    // Step 6: final validation pass; salvage what can be salvaged
    let before_validation = units.len();
    let mut validation_salvaged = 0usize;
    units = units
        .into_iter()
        .filter_map(|mut unit| {
            if valid_multipolygon(unit.geometry.clone()).is_some() {
                return Some(unit);
            }
            match salvage_geometry(&unit.geometry) {
                Some(salvaged) => {
                    warn!("Salvaged invalid geometry for '{}'", unit.smallest);
                    unit.geometry = salvaged;
                    validation_salvaged += 1;
                    Some(unit)
                }
                None => {
                    dropped.invalid_geometry.push(unit_row(&unit));
                    None
                }
            }
        })
        .collect();
    cleaning_report.record_step(
        "invalid_geometry",
        before_validation - units.len(),
        units.len(),
    );
    cleaning_report.geometries_salvaged += validation_salvaged;

    (units, cleaning_report, dropped)
}

/// Union geometries sharing an identifier into one unit per identifier.
///
/// First occurrence order is preserved so output files remain stable
/// across runs.
pub fn dissolve_by_identifier(units: Vec<AdminUnit>) -> Vec<AdminUnit> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, AdminUnit> = HashMap::new();

    for unit in units {
        match merged.get_mut(&unit.smallest) {
            Some(existing) => {
                existing.geometry = existing.geometry.union(&unit.geometry);
            }
            None => {
                order.push(unit.smallest.clone());
                merged.insert(unit.smallest.clone(), unit);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect()
}
