//! Record-level cleaning steps

use geo_types::MultiPolygon;

use super::square;
use crate::boundary::io::RawBoundaryRecord;
use crate::boundary::{clean_records, dissolve_by_identifier};
use crate::constants::SLIVER_OVERLAP_MAX_PCT;
use crate::models::AdminUnit;
use geo::Area;

fn record(
    smallest: Option<&str>,
    code: Option<&str>,
    geometry: Option<MultiPolygon<f64>>,
) -> RawBoundaryRecord {
    RawBoundaryRecord {
        smallest: smallest.map(str::to_string),
        country: Some("Testland".to_string()),
        country_code: code.map(str::to_string),
        geometry,
    }
}

#[test]
fn test_missing_identifier_is_dropped() {
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(None, Some("TZ"), Some(square(2.0, 0.0, 1.0))),
        record(Some(""), Some("TZ"), Some(square(4.0, 0.0, 1.0))),
    ];

    let (units, report, dropped) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(units.len(), 1);
    assert_eq!(dropped.missing_identifier.len(), 2);
    assert_eq!(report.steps[0].name, "missing_identifier");
    assert_eq!(report.steps[0].removed, 2);
}

#[test]
fn test_null_geometry_is_dropped() {
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(Some("TZ002"), Some("TZ"), None),
    ];

    let (units, _, dropped) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(units.len(), 1);
    assert_eq!(dropped.null_geometry.len(), 1);
    assert_eq!(dropped.null_geometry[0].0, "TZ002");
}

#[test]
fn test_code_mismatch_is_dropped_not_rewritten() {
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(Some("KE002"), Some("TZ"), Some(square(2.0, 0.0, 1.0))),
    ];

    let (units, _, dropped) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].smallest, "TZ001");
    assert_eq!(dropped.code_mismatch.len(), 1);
    assert_eq!(dropped.code_mismatch[0].0, "KE002");
}

#[test]
fn test_duplicate_identifiers_are_dissolved() {
    // Two disjoint parts of the same unit become one multipart geometry
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(Some("TZ001"), Some("TZ"), Some(square(5.0, 0.0, 1.0))),
        record(Some("TZ002"), Some("TZ"), Some(square(10.0, 0.0, 1.0))),
    ];

    let (units, report, _) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(units.len(), 2);
    let dissolved = units.iter().find(|u| u.smallest == "TZ001").unwrap();
    assert!((dissolved.geometry.unsigned_area() - 2.0).abs() < 1e-9);

    let dissolve_step = report
        .steps
        .iter()
        .find(|s| s.name == "dissolve_duplicates")
        .unwrap();
    assert_eq!(dissolve_step.removed, 1);
}

#[test]
fn test_dissolve_preserves_first_occurrence_order() {
    let units = vec![
        super::unit("TZ003", square(0.0, 0.0, 1.0)),
        super::unit("TZ001", square(2.0, 0.0, 1.0)),
        super::unit("TZ003", square(4.0, 0.0, 1.0)),
    ];

    let dissolved = dissolve_by_identifier(units);

    let ids: Vec<&str> = dissolved.iter().map(|u| u.smallest.as_str()).collect();
    assert_eq!(ids, vec!["TZ003", "TZ001"]);
}

#[test]
fn test_report_accounts_for_every_record() {
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(None, Some("TZ"), Some(square(2.0, 0.0, 1.0))),
        record(Some("TZ003"), Some("TZ"), None),
        record(Some("KE004"), Some("TZ"), Some(square(6.0, 0.0, 1.0))),
    ];

    let (units, report, dropped) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(report.input_count, 4);
    assert_eq!(report.final_count, units.len());
    let total_dropped = dropped.missing_identifier.len()
        + dropped.null_geometry.len()
        + dropped.code_mismatch.len()
        + dropped.invalid_geometry.len();
    assert_eq!(report.input_count, units.len() + total_dropped);
}

#[test]
fn test_clean_input_passes_through() {
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(Some("TZ002"), Some("TZ"), Some(square(2.0, 0.0, 1.0))),
    ];

    let (units, report, _) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(units.len(), 2);
    assert!((report.retention_rate() - 1.0).abs() < 1e-9);
}

#[test]
fn test_cleaning_is_idempotent() {
    // Feeding cleaned units back through produces the same set
    let records = vec![
        record(Some("TZ001"), Some("TZ"), Some(square(0.0, 0.0, 1.0))),
        record(Some("TZ001"), Some("TZ"), Some(square(0.5, 0.0, 1.0))),
        record(Some("TZ002"), Some("TZ"), Some(square(5.0, 0.0, 1.0))),
    ];

    let (first_pass, _, _) = clean_records(records, SLIVER_OVERLAP_MAX_PCT);

    let again: Vec<RawBoundaryRecord> = first_pass
        .iter()
        .map(|u: &AdminUnit| RawBoundaryRecord {
            smallest: Some(u.smallest.clone()),
            country: Some(u.country.clone()),
            country_code: Some(u.country_code.clone()),
            geometry: Some(u.geometry.clone()),
        })
        .collect();
    let (second_pass, report, _) = clean_records(again, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(second_pass.len(), first_pass.len());
    assert!((report.retention_rate() - 1.0).abs() < 1e-9);
}
