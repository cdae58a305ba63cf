//! Command-line argument definitions for the ERA5 aggregator
//!
//! This module defines the complete CLI interface using the clap derive
//! API: boundary cleaning, panel aggregation, and bulk download.

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DOWNLOAD_WORKERS, SLIVER_OVERLAP_MAX_PCT,
};
use crate::error::{AggregatorError, Result};
use crate::models::InterpolationMethod;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the ERA5 climate panel aggregator
///
/// Prepares subnational climate panels from ERA5 reanalysis data: cleans
/// administrative boundary shapefiles, spatially aggregates gridded
/// temperature and precipitation to administrative units, and downloads
/// raw measurement files in bulk.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "era5-aggregator",
    version,
    about = "Aggregate ERA5 gridded climate data to administrative-unit daily panels",
    long_about = "Prepares analysis-ready climate panels from ERA5 reanalysis data. Cleans \
                  administrative boundary shapefiles (slivers, duplicates, invalid geometries), \
                  computes area-weighted aggregation from the ERA5 grid to administrative units, \
                  and produces a complete unit-by-day Parquet panel with optional gap \
                  interpolation for uncovered units."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the aggregator
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Clean an administrative boundary shapefile
    Clean(CleanArgs),
    /// Aggregate measurement files into a unit-by-day panel
    Aggregate(AggregateArgs),
    /// Download measurement files from the climate data API
    Download(DownloadArgs),
}

/// Arguments for the clean command (boundary shapefile repair)
#[derive(Debug, Clone, Parser)]
pub struct CleanArgs {
    /// Input boundary shapefile
    ///
    /// Must be the .shp component of a shapefile with SMALLEST, COUNTRY
    /// and CNTRY_CD attribute columns.
    #[arg(
        short = 'i',
        long = "input",
        value_name = "SHP",
        help = "Input boundary shapefile (.shp)"
    )]
    pub input_path: PathBuf,

    /// Output path for the cleaned shapefile
    ///
    /// If not specified, writes next to the input with a _cleaned suffix.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "SHP",
        help = "Output path for the cleaned shapefile"
    )]
    pub output_path: Option<PathBuf>,

    /// Directory for the cleaning report and dropped-record CSVs
    ///
    /// Defaults to the output file's directory.
    #[arg(
        long = "report-dir",
        value_name = "PATH",
        help = "Directory for cleaning report and dropped-record CSVs"
    )]
    pub report_dir: Option<PathBuf>,

    /// Maximum mutual overlap treated as a repairable sliver
    ///
    /// Overlapping pairs where the shared area exceeds this percentage
    /// of either polygon are left alone and reported instead.
    #[arg(
        long = "sliver-threshold",
        value_name = "PCT",
        default_value_t = SLIVER_OVERLAP_MAX_PCT,
        help = "Maximum overlap percentage treated as a sliver"
    )]
    pub sliver_threshold: f64,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Arguments for the aggregate command (panel construction)
#[derive(Debug, Clone, Parser)]
pub struct AggregateArgs {
    /// Cleaned boundary shapefile
    #[arg(
        short = 'b',
        long = "boundary",
        value_name = "SHP",
        help = "Cleaned boundary shapefile (.shp)"
    )]
    pub boundary_path: PathBuf,

    /// Directory containing measurement parquet files
    ///
    /// Temperature files end in _temp.parquet, precipitation files in
    /// _precip.parquet. Other files are ignored.
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        help = "Directory containing measurement parquet files"
    )]
    pub input_dir: PathBuf,

    /// Output path for the panel parquet file
    ///
    /// If not specified, writes subunit_day_panel.parquet into the
    /// input directory.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "Output path for the panel parquet file"
    )]
    pub output_path: Option<PathBuf>,

    /// Country to aggregate
    ///
    /// Matched against the boundary's COUNTRY values, fuzzily unless
    /// --exact is given.
    #[arg(
        short = 'c',
        long = "country",
        value_name = "NAME",
        help = "Country to aggregate"
    )]
    pub country: String,

    /// Require an exact country name match
    #[arg(long = "exact", help = "Disable fuzzy country name matching")]
    pub exact: bool,

    /// Rows read per chunk from measurement files
    ///
    /// Larger chunks are faster but use more memory.
    #[arg(
        long = "chunk-size",
        value_name = "ROWS",
        default_value_t = DEFAULT_CHUNK_SIZE,
        help = "Rows read per chunk from measurement files"
    )]
    pub chunk_size: usize,

    /// Gap interpolation method for units without grid coverage
    #[arg(
        long = "interpolation",
        value_enum,
        default_value = "nearest",
        help = "Gap interpolation method for uncovered units"
    )]
    pub interpolation: InterpolationChoice,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Arguments for the download command (bulk measurement retrieval)
#[derive(Debug, Clone, Parser)]
pub struct DownloadArgs {
    /// Region name used in the API request and output filenames
    #[arg(
        short = 'r',
        long = "region",
        value_name = "NAME",
        help = "Region name for the API request"
    )]
    pub region: String,

    /// Year range to download
    ///
    /// Inclusive range in START-END form, one request per year.
    #[arg(
        short = 'y',
        long = "years",
        value_name = "RANGE",
        help = "Inclusive year range to download (e.g. 1998-2016)"
    )]
    pub years: String,

    /// Bounding box for the request
    ///
    /// Comma-separated as min_lat,min_lon,max_lat,max_lon.
    #[arg(
        long = "bbox",
        value_name = "BBOX",
        help = "Bounding box (min_lat,min_lon,max_lat,max_lon)"
    )]
    pub bbox: String,

    /// Dataset identifier sent to the API
    #[arg(
        long = "dataset",
        value_name = "NAME",
        default_value = "era5-land",
        help = "Dataset identifier sent to the API"
    )]
    pub dataset: String,

    /// Variables to request (comma-separated)
    #[arg(
        long = "variables",
        value_name = "LIST",
        default_value = "2m_temperature,total_precipitation",
        help = "Comma-separated variables to request"
    )]
    pub variables: String,

    /// Output directory for downloaded files
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        default_value = "./downloads",
        help = "Output directory for downloaded files"
    )]
    pub output_dir: PathBuf,

    /// API endpoint URL
    #[arg(
        long = "api-url",
        value_name = "URL",
        default_value = "https://era5.rjl.dev/api/v1/extract",
        help = "API endpoint URL"
    )]
    pub api_url: String,

    /// Number of concurrent download workers
    #[arg(
        short = 'j',
        long = "workers",
        value_name = "COUNT",
        default_value_t = DEFAULT_DOWNLOAD_WORKERS,
        help = "Number of concurrent download workers"
    )]
    pub workers: usize,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Gap interpolation choices exposed on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InterpolationChoice {
    /// Copy the nearest covered unit's day series
    Nearest,
    /// Average of units within a buffer radius
    Buffer,
    /// Inverse-distance weighted average of nearby units
    Idw,
    /// Leave uncovered units as nulls
    None,
}

impl From<InterpolationChoice> for InterpolationMethod {
    fn from(choice: InterpolationChoice) -> Self {
        match choice {
            InterpolationChoice::Nearest => InterpolationMethod::NearestNeighbor,
            InterpolationChoice::Buffer => InterpolationMethod::Buffer,
            InterpolationChoice::Idw => InterpolationMethod::Idw,
            InterpolationChoice::None => InterpolationMethod::None,
        }
    }
}

impl Args {
    /// Get the command if one was specified
    pub fn get_command(&self) -> Commands {
        self.command
            .clone()
            .expect("Command should be present when get_command() is called")
    }
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl CleanArgs {
    /// Validate the clean command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.input_path.exists() {
            return Err(AggregatorError::Configuration {
                message: format!(
                    "Input shapefile does not exist: {}",
                    self.input_path.display()
                ),
            });
        }
        if !(0.0..=50.0).contains(&self.sliver_threshold) {
            return Err(AggregatorError::Configuration {
                message: "Sliver threshold must be between 0 and 50 percent".to_string(),
            });
        }
        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }

    /// Default output path: input with a _cleaned suffix
    pub fn resolved_output_path(&self) -> PathBuf {
        match &self.output_path {
            Some(path) => path.clone(),
            None => {
                let stem = self
                    .input_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "boundary".to_string());
                self.input_path.with_file_name(format!("{}_cleaned.shp", stem))
            }
        }
    }
}

impl AggregateArgs {
    /// Validate the aggregate command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.boundary_path.exists() {
            return Err(AggregatorError::Configuration {
                message: format!(
                    "Boundary shapefile does not exist: {}",
                    self.boundary_path.display()
                ),
            });
        }
        if !self.input_dir.is_dir() {
            return Err(AggregatorError::Configuration {
                message: format!(
                    "Input path is not a directory: {}",
                    self.input_dir.display()
                ),
            });
        }
        if self.chunk_size == 0 {
            return Err(AggregatorError::Configuration {
                message: "Chunk size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }
}

impl DownloadArgs {
    /// Validate the download command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        self.parse_years()?;
        self.parse_bbox()?;
        if self.workers == 0 || self.workers > 32 {
            return Err(AggregatorError::Configuration {
                message: "Worker count must be between 1 and 32".to_string(),
            });
        }
        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }

    /// Parse the inclusive year range string
    pub fn parse_years(&self) -> Result<(i32, i32)> {
        let parts: Vec<&str> = self.years.split('-').collect();
        if parts.len() != 2 {
            return Err(AggregatorError::Configuration {
                message: "Years must be in START-END form, e.g. 1998-2016".to_string(),
            });
        }

        let first: i32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| AggregatorError::Configuration {
                message: format!("Invalid start year: {}", parts[0]),
            })?;
        let last: i32 = parts[1]
            .trim()
            .parse()
            .map_err(|_| AggregatorError::Configuration {
                message: format!("Invalid end year: {}", parts[1]),
            })?;

        if first > last {
            return Err(AggregatorError::Configuration {
                message: "Start year must not be after end year".to_string(),
            });
        }
        Ok((first, last))
    }

    /// Parse the bounding box string
    pub fn parse_bbox(&self) -> Result<[f64; 4]> {
        let parts: Vec<&str> = self.bbox.split(',').collect();
        if parts.len() != 4 {
            return Err(AggregatorError::Configuration {
                message: "Bounding box must be min_lat,min_lon,max_lat,max_lon".to_string(),
            });
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(parts.iter()) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| AggregatorError::Configuration {
                    message: format!("Invalid bounding box value: {}", part),
                })?;
        }

        if values[0] >= values[2] || values[1] >= values[3] {
            return Err(AggregatorError::Configuration {
                message: "Bounding box minimums must be less than maximums".to_string(),
            });
        }
        Ok(values)
    }

    /// Variables as a list, trimmed and non-empty
    pub fn variable_list(&self) -> Vec<String> {
        self.variables
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download_args() -> DownloadArgs {
        DownloadArgs {
            region: "tanzania".to_string(),
            years: "1998-2016".to_string(),
            bbox: "-12.0,29.0,-1.0,41.0".to_string(),
            dataset: "era5-land".to_string(),
            variables: "2m_temperature, total_precipitation".to_string(),
            output_dir: PathBuf::from("./downloads"),
            api_url: "https://example.invalid/api".to_string(),
            workers: 4,
            verbose: 0,
            quiet: false,
        }
    }

    #[test]
    fn test_year_range_parsing() {
        let args = download_args();
        assert_eq!(args.parse_years().unwrap(), (1998, 2016));

        let mut bad = download_args();
        bad.years = "2016-1998".to_string();
        assert!(bad.parse_years().is_err());

        bad.years = "1998".to_string();
        assert!(bad.parse_years().is_err());
    }

    #[test]
    fn test_bbox_parsing() {
        let args = download_args();
        assert_eq!(args.parse_bbox().unwrap(), [-12.0, 29.0, -1.0, 41.0]);

        let mut bad = download_args();
        bad.bbox = "1.0,2.0,3.0".to_string();
        assert!(bad.parse_bbox().is_err());

        bad.bbox = "3.0,2.0,1.0,4.0".to_string();
        assert!(bad.parse_bbox().is_err());
    }

    #[test]
    fn test_variable_list_trims_entries() {
        let args = download_args();
        assert_eq!(
            args.variable_list(),
            vec!["2m_temperature", "total_precipitation"]
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = download_args();
        assert_eq!(args.get_log_level(), "warn");

        args.verbose = 1;
        assert_eq!(args.get_log_level(), "info");
        args.verbose = 3;
        assert_eq!(args.get_log_level(), "trace");

        args.quiet = true;
        args.verbose = 0;
        assert_eq!(args.get_log_level(), "error");
    }

    #[test]
    fn test_interpolation_choice_conversion() {
        assert_eq!(
            InterpolationMethod::from(InterpolationChoice::Nearest),
            InterpolationMethod::NearestNeighbor
        );
        assert_eq!(
            InterpolationMethod::from(InterpolationChoice::None),
            InterpolationMethod::None
        );
    }

    #[test]
    fn test_cleaned_output_path_default() {
        let args = CleanArgs {
            input_path: PathBuf::from("/data/boundaries.shp"),
            output_path: None,
            report_dir: None,
            sliver_threshold: SLIVER_OVERLAP_MAX_PCT,
            verbose: 0,
            quiet: false,
        };
        assert_eq!(
            args.resolved_output_path(),
            PathBuf::from("/data/boundaries_cleaned.shp")
        );
    }
}
