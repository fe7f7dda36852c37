//! Pure-Rust point and polygon reprojection between WGS84, Web Mercator and
//! UTM (Snyder 1987, USGS Prof. Paper 1395).
//!
//! Supported: EPSG 4326, 3857, 326xx (UTM North) and 327xx (UTM South).
//! Every transform goes through WGS84 longitude/latitude.

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use std::f64::consts::FRAC_PI_4;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Web Mercator latitude limit (degrees)
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A projection understood by the built-in reprojector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// WGS84 longitude/latitude (EPSG:4326)
    Geographic,
    /// Spherical Web Mercator (EPSG:3857)
    WebMercator,
    /// Universal Transverse Mercator zone on WGS84
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Map an EPSG code to a supported projection.
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 => Some(Self::Geographic),
            3857 | 900_913 => Some(Self::WebMercator),
            32601..=32660 => Some(Self::Utm {
                zone: epsg - 32600,
                north: true,
            }),
            32701..=32760 => Some(Self::Utm {
                zone: epsg - 32700,
                north: false,
            }),
            _ => None,
        }
    }

    /// Projected coordinates → WGS84 (lon, lat) in degrees.
    pub fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Geographic => (x, y),
            Self::WebMercator => mercator_to_wgs84(x, y),
            Self::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    /// WGS84 (lon, lat) in degrees → projected coordinates.
    pub fn from_wgs84(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Self::Geographic => (lon, lat),
            Self::WebMercator => wgs84_to_mercator(lon, lat),
            Self::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Transforms coordinates from one CRS to another.
#[derive(Debug, Clone, Copy)]
pub struct Reprojector {
    source: Projection,
    target: Projection,
}

impl Reprojector {
    /// Build a reprojector; fails with [`Error::UnsupportedCrs`] if either
    /// side is not supported.
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        Ok(Self {
            source: source.projection()?,
            target: target.projection()?,
        })
    }

    /// Whether source and target are the same projection
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Transform a single point
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.source.to_wgs84(x, y);
        self.target.from_wgs84(lon, lat)
    }

    fn transform_ring(&self, ring: &LineString<f64>) -> Result<LineString<f64>> {
        ring.coords()
            .map(|c| {
                let (x, y) = self.transform_point(c.x, c.y);
                if x.is_finite() && y.is_finite() {
                    Ok(Coord { x, y })
                } else {
                    Err(Error::Geometry(format!(
                        "coordinate ({}, {}) cannot be reprojected",
                        c.x, c.y
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(LineString::new)
    }

    /// Transform every vertex of a polygon, exterior and holes.
    pub fn transform_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        if self.is_identity() {
            return Ok(polygon.clone());
        }
        let exterior = self.transform_ring(polygon.exterior())?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.transform_ring(ring))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    /// Transform every polygon of a multipolygon
    pub fn transform_multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        mp.0.iter()
            .map(|p| self.transform_polygon(p))
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon::new)
    }
}

// ── Web Mercator (spherical, radius = A) ────────────────────────────────

fn wgs84_to_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    let x = A * lon_deg.to_radians();
    let y = A * (FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

// ── Transverse Mercator (Snyder pp. 61-64) ──────────────────────────────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    // Footpoint latitude (Snyder eq. 3-26, 7-19)
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let denom = 1.0 - E2 * sin1 * sin1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    // Snyder eq. 8-17, 8-18
    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians), Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}
