//! Shapefile write and re-read

use tempfile::TempDir;

use super::{square, unit};
use crate::boundary::io::{read_admin_units, write_boundary_file};
use crate::error::AggregatorError;

#[test]
fn test_written_file_reads_back_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cleaned.shp");

    let units = vec![
        unit("TZ001", square(0.0, 0.0, 1.0)),
        unit("TZ002", square(2.0, 0.0, 1.0)),
        unit("TZ003", square(4.0, 0.0, 1.0)),
    ];

    write_boundary_file(&path, &units).unwrap();
    let reread = read_admin_units(&path).unwrap();

    assert_eq!(reread.len(), units.len());
    let mut ids: Vec<&str> = reread.iter().map(|u| u.smallest.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["TZ001", "TZ002", "TZ003"]);
    for u in &reread {
        assert_eq!(u.country, "Testland");
        assert_eq!(u.country_code, "TZ");
    }
}

#[test]
fn test_no_staging_files_remain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cleaned.shp");

    write_boundary_file(&path, &[unit("TZ001", square(0.0, 0.0, 1.0))]).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("_staged"))
        .collect();
    assert!(leftovers.is_empty(), "staging files left behind: {:?}", leftovers);
}

#[test]
fn test_missing_file_is_reported() {
    let result = read_admin_units(std::path::Path::new("/nonexistent/boundaries.shp"));
    assert!(matches!(
        result,
        Err(AggregatorError::BoundaryNotFound { .. })
    ));
}
