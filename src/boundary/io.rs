//! Shapefile input and output for administrative boundaries.
//!
//! Reads raw boundary records with their SMALLEST / COUNTRY / CNTRY_CD
//! attributes, and writes cleaned units back out through a staged
//! temporary path so partial writes never replace a good file.

use geo_types::{Geometry, MultiPolygon};
use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::columns;
use crate::error::{AggregatorError, Result};
use crate::models::AdminUnit;

/// One record as read from the raw shapefile, before cleaning
#[derive(Debug, Clone)]
pub struct RawBoundaryRecord {
    pub smallest: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl RawBoundaryRecord {
    /// Identifier for diagnostic listings, even when the record is partial
    pub fn label(&self) -> String {
        self.smallest
            .clone()
            .unwrap_or_else(|| "<missing>".to_string())
    }
}

fn string_field(record: &Record, name: &str) -> Option<String> {
    match record.get(name) {
        Some(FieldValue::Character(Some(value))) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(FieldValue::Numeric(Some(value))) => Some(value.to_string()),
        _ => None,
    }
}

fn multipolygon_from_shape(shape: shapefile::Shape) -> Option<MultiPolygon<f64>> {
    match Geometry::<f64>::try_from(shape) {
        Ok(Geometry::Polygon(polygon)) => Some(MultiPolygon::new(vec![polygon])),
        Ok(Geometry::MultiPolygon(multi)) => Some(multi),
        Ok(_) | Err(_) => None,
    }
}

/// Read all records from a raw boundary shapefile.
///
/// Fails when the file is unreadable or the attribute table lacks the
/// required columns; individual bad geometries are carried through as
/// `None` for the cleaning steps to report and drop.
pub fn read_boundary_file(path: &Path) -> Result<Vec<RawBoundaryRecord>> {
    if !path.exists() {
        return Err(AggregatorError::BoundaryNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = shapefile::Reader::from_path(path)?;
    let mut records = Vec::new();
    let mut columns_checked = false;

    for shape_record in reader.iter_shapes_and_records() {
        let (shape, record) = shape_record?;

        if !columns_checked {
            check_required_columns(path, &record)?;
            columns_checked = true;
        }

        records.push(RawBoundaryRecord {
            smallest: string_field(&record, columns::SMALLEST),
            country: string_field(&record, columns::COUNTRY),
            country_code: string_field(&record, columns::COUNTRY_CODE),
            geometry: multipolygon_from_shape(shape),
        });
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

fn check_required_columns(path: &Path, record: &Record) -> Result<()> {
    let missing: Vec<String> = [columns::SMALLEST, columns::COUNTRY, columns::COUNTRY_CODE]
        .iter()
        .filter(|name| record.get(name).is_none())
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

/// Read a cleaned boundary file into fully-populated admin units.
///
/// Cleaned files are expected to be complete; any record with a missing
/// attribute or geometry is reported and skipped.
pub fn read_admin_units(path: &Path) -> Result<Vec<AdminUnit>> {
    let records = read_boundary_file(path)?;
    let total = records.len();

    let units: Vec<AdminUnit> = records
        .into_iter()
        .filter_map(|record| {
            let label = record.label();
            match (
                record.smallest,
                record.country,
                record.country_code,
                record.geometry,
            ) {
                (Some(smallest), Some(country), Some(country_code), Some(geometry)) => {
                    Some(AdminUnit {
                        smallest,
                        country,
                        country_code,
                        geometry,
                    })
                }
                _ => {
                    warn!("Skipping incomplete record '{}' in cleaned boundary file", label);
                    None
                }
            }
        })
        .collect();

    if units.len() < total {
        warn!(
            "Cleaned boundary file {} had {} incomplete records",
            path.display(),
            total - units.len()
        );
    }

    Ok(units)
}

fn field_name(name: &str) -> Result<shapefile::dbase::FieldName> {
    name.try_into()
        .map_err(|e| AggregatorError::Configuration {
            message: format!("Invalid dbase field name '{}': {:?}", name, e),
        })
}

/// Sibling paths a shapefile writer produces for a given `.shp` path
fn component_paths(shp_path: &Path) -> [PathBuf; 3] {
    [
        shp_path.with_extension("shp"),
        shp_path.with_extension("shx"),
        shp_path.with_extension("dbf"),
    ]
}

/// Write cleaned units to a shapefile through staged temporary components.
///
/// The `.shp`, `.shx`, and `.dbf` components are written under a staging
/// name in the destination directory and renamed into place together.
pub fn write_boundary_file(path: &Path, units: &[AdminUnit]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staged = staged_shapefile_path(path);

    let table = TableWriterBuilder::new()
        .add_character_field(field_name(columns::SMALLEST)?, 50)
        .add_character_field(field_name(columns::COUNTRY)?, 50)
        .add_character_field(field_name(columns::COUNTRY_CODE)?, 10);

    {
        let mut writer = shapefile::Writer::from_path(&staged, table)?;
        for unit in units {
            let polygon = shapefile::Polygon::from(unit.geometry.clone());
            let mut record = Record::default();
            record.insert(
                columns::SMALLEST.to_string(),
                FieldValue::Character(Some(unit.smallest.clone())),
            );
            record.insert(
                columns::COUNTRY.to_string(),
                FieldValue::Character(Some(unit.country.clone())),
            );
            record.insert(
                columns::COUNTRY_CODE.to_string(),
                FieldValue::Character(Some(unit.country_code.clone())),
            );
            writer.write_shape_and_record(&polygon, &record)?;
        }
    }

    for (from, to) in component_paths(&staged)
        .iter()
        .zip(component_paths(path).iter())
    {
        if from.exists() {
            fs::rename(from, to)?;
        }
    }

    debug!("Wrote {} units to {}", units.len(), path.display());
    Ok(())
}

fn staged_shapefile_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "boundary".to_string());
    path.with_file_name(format!("{}_staged.shp", stem))
}
