//! Geometric measurements: area, perimeter, compactness

use geo::{Area, Euclidean, Length, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Metres per degree used by the flat-earth approximation for geographic CRSs.
pub const DEGREE_TO_METERS: f64 = 111_000.0;

/// Square metres per hectare
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// Unsigned area of a polygon in CRS units squared (holes subtracted).
pub fn area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Unsigned area of a multipolygon in CRS units squared.
pub fn multi_area(mp: &MultiPolygon<f64>) -> f64 {
    mp.unsigned_area()
}

/// Total Euclidean length of exterior and interior rings, in CRS units.
pub fn perimeter(polygon: &Polygon<f64>) -> f64 {
    let exterior = Euclidean.length(polygon.exterior());
    let interiors: f64 = polygon
        .interiors()
        .iter()
        .map(|ring| Euclidean.length(ring))
        .sum();
    exterior + interiors
}

/// Isoperimetric ratio `4πA / P²`: 1.0 for a circle, smaller for elongated shapes.
///
/// The denominator is guarded so a zero perimeter yields 0 rather than NaN.
pub fn compactness(area: f64, perimeter: f64) -> f64 {
    4.0 * PI * area / (perimeter * perimeter + 1e-9)
}

/// Whether a polygon is usable for measurement and overlay: closed rings
/// with at least three distinct vertices, finite coordinates and non-zero area.
pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    let ring_ok = |ring: &LineString<f64>| {
        ring.0.len() >= 4
            && ring.is_closed()
            && ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
    };
    ring_ok(polygon.exterior())
        && polygon.interiors().iter().all(ring_ok)
        && area(polygon) > 0.0
}

/// Shape metrics of a detected polygon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonMetrics {
    pub area_ha: f64,
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub compactness: f64,
}

impl PolygonMetrics {
    /// Measure a polygon in its own CRS.
    ///
    /// With `geographic` set, degrees are converted with [`DEGREE_TO_METERS`].
    /// Compactness is always computed in native units.
    pub fn measure(polygon: &Polygon<f64>, geographic: bool) -> Self {
        let native_area = area(polygon);
        let native_perimeter = perimeter(polygon);
        let scale = if geographic { DEGREE_TO_METERS } else { 1.0 };

        let area_m2 = native_area * scale * scale;
        Self {
            area_ha: area_m2 / M2_PER_HECTARE,
            area_m2,
            perimeter_m: native_perimeter * scale,
            compactness: compactness(native_area, native_perimeter),
        }
    }
}
