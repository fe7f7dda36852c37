//! Polygon overlay: dissolve, buffer, inside/outside split
//!
//! Boolean operations come from `geo`'s `BooleanOps` (i_overlay backend),
//! buffering from `geo`'s `Buffer`.

use geo::{BooleanOps, Buffer, MultiPolygon, Polygon};
use minewatch_core::{Error, Result};

use super::measurements::multi_area;

/// Merge polygons into a single multipolygon covering their union.
///
/// Unions pairwise in a balanced tree so large lease sets stay fast.
pub fn dissolve(polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
    let mut layer: Vec<MultiPolygon<f64>> = polygons
        .iter()
        .map(|p| MultiPolygon::new(vec![p.clone()]))
        .collect();

    if layer.is_empty() {
        return MultiPolygon::new(vec![]);
    }

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut iter = layer.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        layer = next;
    }

    layer.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Expand a region outward by `distance` CRS units.
///
/// Non-positive distances return the region unchanged.
pub fn buffer(region: &MultiPolygon<f64>, distance: f64) -> Result<MultiPolygon<f64>> {
    if !distance.is_finite() {
        return Err(Error::InvalidParameter {
            name: "buffer_distance",
            value: distance.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    if distance <= 0.0 || region.0.is_empty() {
        return Ok(region.clone());
    }
    Ok(region.buffer(distance))
}

/// Areas of a polygon inside and outside a region, in CRS units squared.
///
/// Returns `(inside, outside)`, each clamped at zero.
pub fn split_area(polygon: &Polygon<f64>, region: &MultiPolygon<f64>) -> Result<(f64, f64)> {
    let inside = multi_area(&polygon.intersection(region)).max(0.0);
    let outside = multi_area(&polygon.difference(region)).max(0.0);

    if !inside.is_finite() || !outside.is_finite() {
        return Err(Error::Geometry(
            "overlay produced a non-finite area".to_string(),
        ));
    }
    Ok((inside, outside))
}

/// Area of the intersection of two polygons, in CRS units squared.
pub fn intersection_area(a: &Polygon<f64>, b: &Polygon<f64>) -> Result<f64> {
    let area = multi_area(&a.intersection(b)).max(0.0);
    if area.is_finite() {
        Ok(area)
    } else {
        Err(Error::Geometry(
            "intersection produced a non-finite area".to_string(),
        ))
    }
}
