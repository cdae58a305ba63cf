//! Aggregation pipeline: from measurement files and a cleaned boundary
//! to the unit-by-day climate panel.
//!
//! The pipeline builds the grid once from a sample file, computes the
//! cell-to-unit weight table once, then folds every measurement file
//! through the chunked aggregator. An empty file is reported and
//! skipped; an unreadable file or one missing required columns aborts
//! the run, since a panel built from a partial file set would carry
//! silent gaps.

pub mod chunked;
pub mod discovery;
pub mod panel;

#[cfg(test)]
pub mod tests;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::boundary::io::read_admin_units;
use crate::config::AggregatorConfig;
use crate::constants::{PANEL_OUTPUT_FILENAME, columns};
use crate::error::{AggregatorError, Result};
use crate::grid::build_grid;
use crate::interpolate::interpolate_gaps;
use crate::matching::match_country;
use crate::models::{AdminUnit, ClimateVariable, ProcessingStats};
use crate::weighting::compute_weights;

/// Orchestrates one aggregation run for a single country
pub struct AggregationPipeline {
    boundary_path: PathBuf,
    input_dir: PathBuf,
    output_path: PathBuf,
    country_query: String,
    config: AggregatorConfig,
}

impl AggregationPipeline {
    /// Create a new aggregation pipeline
    pub fn new(
        boundary_path: PathBuf,
        input_dir: PathBuf,
        output_path: Option<PathBuf>,
        country_query: String,
    ) -> Result<Self> {
        if !boundary_path.exists() {
            return Err(AggregatorError::BoundaryNotFound {
                path: boundary_path,
            });
        }
        if !input_dir.is_dir() {
            return Err(AggregatorError::NoInputFiles { path: input_dir });
        }

        let output_path = output_path.unwrap_or_else(|| input_dir.join(PANEL_OUTPUT_FILENAME));

        Ok(Self {
            boundary_path,
            input_dir,
            output_path,
            country_query,
            config: AggregatorConfig::default(),
        })
    }

    /// Configure the pipeline
    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full aggregation pipeline
    pub async fn run(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        self.config.validate()?;

        println!(
            "{}",
            "Starting climate panel aggregation".bright_green().bold()
        );
        println!(
            "  {} {}",
            "Boundary:".bright_cyan(),
            self.boundary_path.display()
        );
        println!(
            "  {} {}",
            "Input:".bright_cyan(),
            self.input_dir.display()
        );
        println!(
            "  {} {}",
            "Output:".bright_cyan(),
            self.output_path.display()
        );

        // Step 1: Load cleaned boundary and resolve the country
        println!("\n{}", "Loading boundary units...".bright_yellow());
        let all_units = read_admin_units(&self.boundary_path)?;
        let units = self.select_country_units(all_units)?;
        println!(
            "  {} {} units",
            "Selected".bright_green(),
            units.len().to_string().bright_white().bold()
        );

        // Step 2: Discover measurement files
        println!("\n{}", "Discovering measurement files...".bright_yellow());
        let files = discovery::discover_measurement_files(&self.input_dir)?;
        println!(
            "  {} {} temperature, {} precipitation",
            "Found".bright_green(),
            files.temperature.len().to_string().bright_white().bold(),
            files.precipitation.len().to_string().bright_white().bold()
        );

        // Step 3: Build the grid from a sample file
        let sample = files
            .sample_file()
            .ok_or_else(|| AggregatorError::NoInputFiles {
                path: self.input_dir.clone(),
            })?;
        let grid = build_grid(sample, self.config.grid_fallback_step)?;
        println!(
            "  {} {} grid cells",
            "Built".bright_green(),
            grid.cells.len().to_string().bright_white().bold()
        );

        // Step 4: Compute the cell-to-unit weight table
        println!("\n{}", "Computing intersection weights...".bright_yellow());
        let weighting = compute_weights(&grid, &units)?;
        println!(
            "  {} {} weighted cell-unit pairs",
            "Computed".bright_green(),
            weighting.table.height().to_string().bright_white().bold()
        );
        if !weighting.dropped_units.is_empty() {
            println!(
                "  {} {} units without grid coverage",
                "Warning:".bright_yellow(),
                weighting.dropped_units.len()
            );
        }

        // Step 5: Aggregate every measurement file
        println!("\n{}", "Aggregating measurement files...".bright_yellow());
        let progress = build_progress_bar(files.total() as u64);

        let mut files_processed = 0usize;
        let mut files_skipped = 0usize;
        let mut temperature_partials: Vec<LazyFrame> = Vec::new();
        let mut precipitation_partials: Vec<LazyFrame> = Vec::new();

        for (variable, paths) in [
            (ClimateVariable::Temperature, &files.temperature),
            (ClimateVariable::Precipitation, &files.precipitation),
        ] {
            for path in paths {
                progress.set_message(
                    path.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
                match chunked::aggregate_file(
                    path,
                    &weighting.table,
                    &variable,
                    self.config.chunk_size,
                ) {
                    Ok(Some(partial)) => {
                        match variable {
                            ClimateVariable::Temperature => temperature_partials.push(partial),
                            ClimateVariable::Precipitation => precipitation_partials.push(partial),
                        }
                        files_processed += 1;
                    }
                    Ok(None) => {
                        warn!("File {} holds no rows, skipping", path.display());
                        files_skipped += 1;
                    }
                    Err(e) => {
                        progress.finish_and_clear();
                        return Err(e);
                    }
                }
                progress.inc(1);
            }
        }
        progress.finish_with_message("done");

        // Step 6: Finalize, merge, and complete the panel
        println!("\n{}", "Assembling panel...".bright_yellow());
        let temperature =
            panel::finalize_variable(temperature_partials, &ClimateVariable::Temperature)?;
        let precipitation =
            panel::finalize_variable(precipitation_partials, &ClimateVariable::Precipitation)?;
        let merged = panel::merge_variables(temperature, precipitation)?;

        let year_range = self.resolve_year_range(&files, &merged)?;
        info!("Panel year range: {} - {}", year_range.0, year_range.1);

        let unit_ids: Vec<String> = units.iter().map(|unit| unit.smallest.clone()).collect();
        let country = units
            .first()
            .map(|unit| unit.country.clone())
            .unwrap_or_else(|| self.country_query.clone());
        let complete = panel::complete_panel(merged, &unit_ids, &country, year_range)?;

        // Step 7: Fill gaps for uncovered units
        let (filled, interpolated_units) = interpolate_gaps(
            complete,
            &units,
            &weighting.dropped_units,
            self.config.interpolation_method,
        )?;

        // Step 8: Write the panel atomically
        let mut output = filled;
        panel::write_panel(&mut output, &self.output_path)?;

        let total_time = start_time.elapsed().as_millis();
        println!("\n{}", "Aggregation Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            total_time.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files processed:".bright_cyan(),
            files_processed.to_string().bright_white()
        );
        if files_skipped > 0 {
            println!(
                "  {} {}",
                "Files skipped:".bright_yellow(),
                files_skipped.to_string().bright_yellow().bold()
            );
        }
        println!(
            "  {} {}",
            "Panel rows:".bright_cyan(),
            output.height().to_string().bright_white().bold()
        );
        println!(
            "  {} {}",
            "Written to:".bright_cyan(),
            self.output_path.display()
        );

        Ok(ProcessingStats {
            files_processed,
            files_skipped,
            total_rows: output.height(),
            units: unit_ids.len(),
            interpolated_units,
            output_path: self.output_path.clone(),
            processing_time_ms: total_time,
        })
    }

    /// Resolve the country query against the boundary's country values
    /// and keep only that country's units
    fn select_country_units(&self, all_units: Vec<AdminUnit>) -> Result<Vec<AdminUnit>> {
        let mut candidates: Vec<String> = all_units
            .iter()
            .map(|unit| unit.country.clone())
            .collect();
        candidates.sort();
        candidates.dedup();

        let matched = match_country(
            &self.country_query,
            &candidates,
            !self.config.fuzzy_matching,
            self.config.fuzzy_score_cutoff,
        )?;
        if matched != self.country_query {
            info!("Matched country '{}' to '{}'", self.country_query, matched);
        }

        let units: Vec<AdminUnit> = all_units
            .into_iter()
            .filter(|unit| unit.country == matched)
            .collect();

        if units.is_empty() {
            return Err(AggregatorError::CountryNotFound {
                name: self.country_query.clone(),
            });
        }
        Ok(units)
    }

    /// Year range from filenames, falling back to the aggregated data
    fn resolve_year_range(
        &self,
        files: &discovery::MeasurementFiles,
        merged: &DataFrame,
    ) -> Result<(i32, i32)> {
        let all_files: Vec<&PathBuf> = files
            .temperature
            .iter()
            .chain(files.precipitation.iter())
            .collect();

        if let Some(range) = discovery::detect_year_range(&all_files) {
            return Ok(range);
        }

        warn!("No year segments in filenames, using the data's year range");
        let bounds = merged
            .clone()
            .lazy()
            .select([
                col(columns::YEAR).min().alias("first"),
                col(columns::YEAR).max().alias("last"),
            ])
            .collect()?;
        let first = bounds
            .column("first")?
            .get(0)?
            .try_extract::<i32>()
            .map_err(AggregatorError::Polars)?;
        let last = bounds
            .column("last")?
            .get(0)?
            .try_extract::<i32>()
            .map_err(AggregatorError::Polars)?;
        Ok((first, last))
    }
}

fn build_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}
