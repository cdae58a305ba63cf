//! Measurement file discovery.
//!
//! Finds temperature and precipitation parquet files by their filename
//! suffix convention and extracts the covered year range from the
//! filenames.

use glob::glob;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::YEAR_PATTERN;
use crate::error::{AggregatorError, Result};
use crate::models::ClimateVariable;

/// Discovered measurement files, grouped by variable
#[derive(Debug, Default)]
pub struct MeasurementFiles {
    pub temperature: Vec<PathBuf>,
    pub precipitation: Vec<PathBuf>,
}

impl MeasurementFiles {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty() && self.precipitation.is_empty()
    }

    pub fn total(&self) -> usize {
        self.temperature.len() + self.precipitation.len()
    }

    /// Any file usable as the grid construction sample
    pub fn sample_file(&self) -> Option<&PathBuf> {
        self.temperature.first().or_else(|| self.precipitation.first())
    }
}

/// Discover measurement files in a directory.
///
/// Fatal when the directory contains no recognizable files at all.
pub fn discover_measurement_files(input_dir: &Path) -> Result<MeasurementFiles> {
    let pattern = input_dir.join("*.parquet");
    let pattern_str = pattern.to_string_lossy();

    let mut files = MeasurementFiles::default();
    for entry in glob(&pattern_str).map_err(|e| AggregatorError::Configuration {
        message: format!("Invalid glob pattern '{}': {}", pattern_str, e),
    })? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                debug!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        match ClimateVariable::from_path(&path) {
            Some(ClimateVariable::Temperature) => files.temperature.push(path),
            Some(ClimateVariable::Precipitation) => files.precipitation.push(path),
            None => debug!("Ignoring non-measurement file {}", path.display()),
        }
    }

    files.temperature.sort();
    files.precipitation.sort();

    if files.is_empty() {
        return Err(AggregatorError::NoInputFiles {
            path: input_dir.to_path_buf(),
        });
    }

    debug!(
        "Discovered {} temperature and {} precipitation files",
        files.temperature.len(),
        files.precipitation.len()
    );
    Ok(files)
}

/// Extract the covered year range from filename year segments
pub fn detect_year_range(files: &[&PathBuf]) -> Option<(i32, i32)> {
    let pattern = Regex::new(YEAR_PATTERN).ok()?;

    let years: Vec<i32> = files
        .iter()
        .filter_map(|path| path.file_name())
        .flat_map(|name| {
            let name = name.to_string_lossy().into_owned();
            pattern
                .captures_iter(&name)
                .filter_map(|captures| captures.get(1)?.as_str().parse::<i32>().ok())
                .filter(|year| (1900..2100).contains(year))
                .collect::<Vec<_>>()
        })
        .collect();

    let min = years.iter().min().copied()?;
    let max = years.iter().max().copied()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn test_discovery_classifies_by_suffix() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "era5_1998_2005_temp.parquet");
        touch(&dir, "era5_2006_2016_temp.parquet");
        touch(&dir, "era5_1998_2016_precip.parquet");
        touch(&dir, "stations.parquet");
        touch(&dir, "notes.txt");

        let files = discover_measurement_files(dir.path()).unwrap();

        assert_eq!(files.temperature.len(), 2);
        assert_eq!(files.precipitation.len(), 1);
        assert_eq!(files.total(), 3);
    }

    #[test]
    fn test_empty_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "notes.txt");

        let result = discover_measurement_files(dir.path());
        assert!(matches!(result, Err(AggregatorError::NoInputFiles { .. })));
    }

    #[test]
    fn test_year_range_detection() {
        let a = PathBuf::from("era5_1998_2005_temp.parquet");
        let b = PathBuf::from("era5_2006_2016_temp.parquet");

        let range = detect_year_range(&[&a, &b]);
        assert_eq!(range, Some((1998, 2016)));
    }

    #[test]
    fn test_year_range_without_years() {
        let a = PathBuf::from("era5temp.parquet");
        assert_eq!(detect_year_range(&[&a]), None);
    }
}
