//! Sliver detection, the repair cascade, and geometry salvage

use geo::{Area, Relate};
use geo_types::MultiPolygon;

use super::{square, unit};
use crate::boundary::repair::{
    RepairStrategy, find_sliver_pairs, resolve_overlaps, salvage_geometry, strategies,
    valid_multipolygon,
};
use crate::constants::SLIVER_OVERLAP_MAX_PCT;

fn strategy_named(name: &str) -> RepairStrategy {
    strategies()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, s)| s)
        .unwrap()
}

/// Two unit squares overlapping in a 0.02 wide strip (2% of each area)
fn sliver_pair() -> (MultiPolygon<f64>, MultiPolygon<f64>) {
    (square(0.0, 0.0, 1.0), square(0.98, 0.0, 1.0))
}

#[test]
fn test_sliver_pair_is_detected() {
    let (a, b) = sliver_pair();
    let units = vec![unit("TZ001", a), unit("TZ002", b)];

    let pairs = find_sliver_pairs(&units, SLIVER_OVERLAP_MAX_PCT);
    assert_eq!(pairs, vec![(0, 1)]);
}

#[test]
fn test_large_overlap_is_not_a_sliver() {
    // Half-overlapping squares are a data problem, not a sliver
    let units = vec![
        unit("TZ001", square(0.0, 0.0, 1.0)),
        unit("TZ002", square(0.5, 0.0, 1.0)),
    ];

    let pairs = find_sliver_pairs(&units, SLIVER_OVERLAP_MAX_PCT);
    assert!(pairs.is_empty());
}

#[test]
fn test_disjoint_units_have_no_pairs() {
    let units = vec![
        unit("TZ001", square(0.0, 0.0, 1.0)),
        unit("TZ002", square(5.0, 0.0, 1.0)),
    ];

    let pairs = find_sliver_pairs(&units, SLIVER_OVERLAP_MAX_PCT);
    assert!(pairs.is_empty());
}

#[test]
fn test_first_strategy_removes_the_overlap() {
    let (a, b) = sliver_pair();
    let (name, strategy) = strategies()[0];
    assert_eq!(name, "subtract_from_second");

    let repair = strategy(&a, &b).unwrap();

    // The repaired geometry must no longer overlap the first
    assert!(!a.relate(&repair.geometry).is_overlaps());
    // And must have lost only the sliver
    assert!((repair.geometry.unsigned_area() - 0.98).abs() < 1e-6);
}

#[test]
fn test_boundary_split_keeps_the_remainder() {
    let (a, b) = sliver_pair();
    let repair = strategy_named("boundary_split")(&a, &b).unwrap();

    assert!(!a.relate(&repair.geometry).is_overlaps());
    assert!((repair.geometry.unsigned_area() - 0.98).abs() < 1e-6);
}

#[test]
fn test_boundary_split_refuses_large_losses() {
    // A 30% overlap leaves the remainder under the retention gate
    let a = square(0.0, 0.0, 1.0);
    let b = square(0.7, 0.0, 1.0);

    assert!(strategy_named("boundary_split")(&a, &b).is_none());
}

#[test]
fn test_every_strategy_produces_valid_geometry() {
    let (a, b) = sliver_pair();

    for (name, strategy) in strategies() {
        if let Some(repair) = strategy(&a, &b) {
            assert!(
                valid_multipolygon(repair.geometry).is_some(),
                "strategy {} produced an invalid geometry",
                name
            );
        }
    }
}

#[test]
fn test_resolve_overlaps_repairs_sliver_pair() {
    let (a, b) = sliver_pair();
    let mut units = vec![unit("TZ001", a), unit("TZ002", b)];

    let stats = resolve_overlaps(&mut units, SLIVER_OVERLAP_MAX_PCT);

    assert_eq!(stats.pairs_found, 1);
    assert_eq!(stats.pairs_repaired, 1);
    assert_eq!(stats.units_removed, 0);
    assert_eq!(units.len(), 2);
    assert!(
        !units[0]
            .geometry
            .relate(&units[1].geometry)
            .is_overlaps()
    );
}

#[test]
fn test_resolve_overlaps_is_idempotent() {
    let (a, b) = sliver_pair();
    let mut units = vec![unit("TZ001", a), unit("TZ002", b)];

    resolve_overlaps(&mut units, SLIVER_OVERLAP_MAX_PCT);
    let after_first: Vec<f64> = units.iter().map(|u| u.geometry.unsigned_area()).collect();

    let stats = resolve_overlaps(&mut units, SLIVER_OVERLAP_MAX_PCT);
    let after_second: Vec<f64> = units.iter().map(|u| u.geometry.unsigned_area()).collect();

    assert_eq!(stats.pairs_found, 0);
    assert_eq!(after_first, after_second);
}

#[test]
fn test_valid_multipolygon_rejects_empty() {
    assert!(valid_multipolygon(MultiPolygon::<f64>::new(Vec::new())).is_none());
}

#[test]
fn test_valid_multipolygon_accepts_square() {
    assert!(valid_multipolygon(square(0.0, 0.0, 1.0)).is_some());
}

#[test]
fn test_salvage_keeps_valid_geometry_area() {
    let original = square(0.0, 0.0, 1.0);
    let salvaged = salvage_geometry(&original).unwrap();
    assert!((salvaged.unsigned_area() - original.unsigned_area()).abs() < 1e-9);
}
