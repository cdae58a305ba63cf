//! Sliver overlap detection and repair for boundary geometries.
//!
//! Overlapping pairs are found through an R-tree over geometry envelopes,
//! then repaired by an ordered cascade of strategies sharing a common
//! signature. The first strategy producing a valid geometry wins.

use geo::{Area, BooleanOps, ConvexHull, Relate, Simplify, Validation};
use geo_types::MultiPolygon;
use rstar::{AABB, RTree, RTreeObject};
use tracing::{debug, warn};

use crate::constants::{
    BOUNDARY_SPLIT_MIN_RETENTION, HULL_SALVAGE_MIN_RETENTION, SIMPLIFY_EPSILON,
};
use crate::models::AdminUnit;

/// Which member of an overlapping pair a repair replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTarget {
    First,
    Second,
}

/// A candidate replacement geometry produced by a repair strategy
#[derive(Debug, Clone)]
pub struct Repair {
    pub target: RepairTarget,
    pub geometry: MultiPolygon<f64>,
}

/// Common signature for all pairwise repair strategies
pub type RepairStrategy = fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> Option<Repair>;

/// Ordered repair cascade, tried until one strategy succeeds
pub fn strategies() -> [(&'static str, RepairStrategy); 4] {
    [
        ("subtract_from_second", subtract_from_second),
        ("boundary_split", boundary_split),
        ("subtract_from_lighter", subtract_from_lighter),
        ("hull_clip", hull_clip),
    ]
}

/// Outcome counters for an overlap resolution pass
#[derive(Debug, Default, Clone)]
pub struct OverlapStats {
    pub pairs_found: usize,
    pub pairs_repaired: usize,
    pub geometries_salvaged: usize,
    pub units_removed: usize,
}

struct UnitEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for UnitEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn geometry_envelope(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    use geo::BoundingRect;

    let rect = geometry.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

/// Geometry acceptance shared by repairs, salvage, and final validation
pub fn valid_multipolygon(geometry: MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if geometry.0.is_empty() {
        return None;
    }
    if geometry.unsigned_area() <= 0.0 {
        return None;
    }
    if !geometry.is_valid() {
        return None;
    }
    Some(geometry)
}

/// Subtract the overlap from the second geometry
fn subtract_from_second(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<Repair> {
    let intersection = a.intersection(b);
    if intersection.unsigned_area() <= 0.0 {
        return None;
    }

    valid_multipolygon(b.difference(a)).map(|geometry| Repair {
        target: RepairTarget::Second,
        geometry,
    })
}

/// Split along the pair's combined boundary and keep the second
/// geometry's outside portion, when it retains enough area.
///
/// The rings are re-noded through a self union before differencing, so
/// this can produce a clean result where the raw difference of the
/// original rings comes back invalid.
fn boundary_split(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<Repair> {
    let original_area = b.unsigned_area();
    if original_area <= 0.0 {
        return None;
    }

    let renoded_a = a.union(a);
    let renoded_b = b.union(b);
    let remainder = renoded_b.difference(&renoded_a);
    if remainder.unsigned_area() / original_area < BOUNDARY_SPLIT_MIN_RETENTION {
        return None;
    }

    valid_multipolygon(remainder).map(|geometry| Repair {
        target: RepairTarget::Second,
        geometry,
    })
}

/// Subtract the overlap from whichever geometry loses the smaller share
fn subtract_from_lighter(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<Repair> {
    let area_a = a.unsigned_area();
    let area_b = b.unsigned_area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return None;
    }

    let overlap = a.intersection(b).unsigned_area();
    let loss_a = overlap / area_a;
    let loss_b = overlap / area_b;

    if loss_a < loss_b {
        valid_multipolygon(a.difference(b)).map(|geometry| Repair {
            target: RepairTarget::First,
            geometry,
        })
    } else {
        valid_multipolygon(b.difference(a)).map(|geometry| Repair {
            target: RepairTarget::Second,
            geometry,
        })
    }
}

/// Clip the second geometry to the convex hull of the combined pair
fn hull_clip(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<Repair> {
    let combined = a.union(b);
    let hull = MultiPolygon::new(vec![combined.convex_hull()]);

    valid_multipolygon(b.intersection(&hull)).map(|geometry| Repair {
        target: RepairTarget::Second,
        geometry,
    })
}

/// Attempt to recover a usable geometry from a single damaged one.
///
/// Tried in order: re-noding through a self union, simplification with a
/// tiny epsilon, and finally the convex hull when the original covers at
/// least half of it.
pub fn salvage_geometry(geometry: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let renoded = geometry.union(geometry);
    if let Some(valid) = valid_multipolygon(renoded) {
        return Some(valid);
    }

    let simplified = geometry.simplify(&SIMPLIFY_EPSILON);
    if let Some(valid) = valid_multipolygon(simplified) {
        return Some(valid);
    }

    let original_area = geometry.unsigned_area();
    let hull = MultiPolygon::new(vec![geometry.convex_hull()]);
    let hull_area = hull.unsigned_area();
    if hull_area > 0.0 && original_area / hull_area >= HULL_SALVAGE_MIN_RETENTION {
        return valid_multipolygon(hull);
    }

    None
}

/// Find index pairs whose geometries overlap as slivers.
///
/// A pair is a sliver when the shared area is below `threshold_pct` of
/// both geometries. Larger overlaps are genuine data problems and are
/// left for a human to resolve.
pub fn find_sliver_pairs(units: &[AdminUnit], threshold_pct: f64) -> Vec<(usize, usize)> {
    let envelopes: Vec<UnitEnvelope> = units
        .iter()
        .enumerate()
        .filter_map(|(index, unit)| {
            geometry_envelope(&unit.geometry).map(|envelope| UnitEnvelope { index, envelope })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    let mut pairs = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        let Some(envelope) = geometry_envelope(&unit.geometry) else {
            continue;
        };

        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            let j = candidate.index;
            if j <= i {
                continue;
            }

            let other = &units[j];
            if !unit.geometry.relate(&other.geometry).is_overlaps() {
                continue;
            }

            let overlap = unit.geometry.intersection(&other.geometry).unsigned_area();
            let area_i = unit.geometry.unsigned_area();
            let area_j = other.geometry.unsigned_area();
            if area_i <= 0.0 || area_j <= 0.0 {
                continue;
            }

            let pct_i = overlap / area_i * 100.0;
            let pct_j = overlap / area_j * 100.0;
            if pct_i < threshold_pct && pct_j < threshold_pct {
                pairs.push((i, j));
            } else {
                warn!(
                    "Overlap between '{}' and '{}' too large to auto-repair ({:.2}% / {:.2}%)",
                    unit.smallest, other.smallest, pct_i, pct_j
                );
            }
        }
    }

    pairs
}

/// Resolve all sliver overlaps in place.
///
/// Each pair goes through the strategy cascade; when every strategy fails,
/// both members are put through single-geometry salvage, and anything
/// still unusable is removed. Running this on an already clean set is a
/// no-op.
pub fn resolve_overlaps(units: &mut Vec<AdminUnit>, threshold_pct: f64) -> OverlapStats {
    let mut stats = OverlapStats::default();
    let pairs = find_sliver_pairs(units, threshold_pct);
    stats.pairs_found = pairs.len();

    if pairs.is_empty() {
        return stats;
    }

    let mut to_remove: Vec<usize> = Vec::new();

    for (i, j) in pairs {
        let (geom_a, geom_b) = (units[i].geometry.clone(), units[j].geometry.clone());

        let mut repaired = false;
        for (name, strategy) in strategies() {
            if let Some(repair) = strategy(&geom_a, &geom_b) {
                debug!(
                    "Repaired overlap between '{}' and '{}' with {}",
                    units[i].smallest, units[j].smallest, name
                );
                match repair.target {
                    RepairTarget::First => units[i].geometry = repair.geometry,
                    RepairTarget::Second => units[j].geometry = repair.geometry,
                }
                stats.pairs_repaired += 1;
                repaired = true;
                break;
            }
        }

        if !repaired {
            for index in [i, j] {
                match salvage_geometry(&units[index].geometry) {
                    Some(salvaged) => {
                        units[index].geometry = salvaged;
                        stats.geometries_salvaged += 1;
                    }
                    None => {
                        warn!(
                            "Removing '{}': overlap unrepairable and salvage failed",
                            units[index].smallest
                        );
                        to_remove.push(index);
                    }
                }
            }
        }
    }

    if !to_remove.is_empty() {
        to_remove.sort_unstable();
        to_remove.dedup();
        stats.units_removed = to_remove.len();
        let mut index = 0;
        units.retain(|_| {
            let keep = !to_remove.contains(&index);
            index += 1;
            keep
        });
    }

    stats
}
