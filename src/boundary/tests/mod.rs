//! Tests for the boundary cleaning engine

pub mod cleaning;
pub mod repair;
pub mod roundtrip;

use geo_types::{MultiPolygon, polygon};

use crate::models::AdminUnit;

pub fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: min_x, y: min_y),
        (x: min_x + size, y: min_y),
        (x: min_x + size, y: min_y + size),
        (x: min_x, y: min_y + size),
        (x: min_x, y: min_y),
    ]])
}

pub fn unit(id: &str, geometry: MultiPolygon<f64>) -> AdminUnit {
    AdminUnit {
        smallest: id.to_string(),
        country: "Testland".to_string(),
        country_code: "TZ".to_string(),
        geometry,
    }
}
