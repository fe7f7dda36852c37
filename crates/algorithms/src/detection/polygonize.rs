//! Mask polygonization
//!
//! Traces the boundary of every 4-connected region of the mask along pixel
//! edges. Each region yields one polygon whose exterior is the largest ring
//! and whose remaining rings are holes. Rings are walked with the region on
//! the right; at a saddle vertex (two diagonal region pixels) the walk turns
//! right, so diagonal neighbours are never joined.

use crate::maybe_rayon::*;
use crate::morphology::{label_components, Labeling};
use crate::vector::{is_valid_polygon, PolygonMetrics};
use geo::algorithm::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};
use minewatch_core::raster::{GeoTransform, Raster};
use minewatch_core::vector::AttributeTable;
use minewatch_core::{Algorithm, Error, Result, CRS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::mask::MiningMask;

// ---------------------------------------------------------------------------
// Parameters and output
// ---------------------------------------------------------------------------

/// Parameters for polygonization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonizeParams {
    /// Polygons smaller than this many hectares are discarded. Default: 0.001
    pub min_area_ha: f64,
}

impl Default for PolygonizeParams {
    fn default() -> Self {
        Self { min_area_ha: 0.001 }
    }
}

impl PolygonizeParams {
    pub fn validate(&self) -> Result<()> {
        if !self.min_area_ha.is_finite() || self.min_area_ha <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "min_area_ha",
                value: self.min_area_ha.to_string(),
                reason: "must be a positive number of hectares".to_string(),
            });
        }
        Ok(())
    }
}

/// One mining footprint traced from the mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPolygon {
    /// `mining_<n>`, numbered in scan order of each region's first pixel
    pub id: String,
    /// Footprint in the mask CRS
    pub geometry: Polygon<f64>,
    #[serde(flatten)]
    pub metrics: PolygonMetrics,
}

impl DetectedPolygon {
    pub fn area_ha(&self) -> f64 {
        self.metrics.area_ha
    }
}

/// Polygons in a shared CRS plus a passthrough attribute side-table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPolygonSet {
    pub crs: CRS,
    pub polygons: Vec<DetectedPolygon>,
    #[serde(default)]
    pub attributes: AttributeTable,
}

impl DetectedPolygonSet {
    /// Empty set in `crs`
    pub fn empty(crs: CRS) -> Self {
        Self {
            crs,
            polygons: Vec::new(),
            attributes: AttributeTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectedPolygon> {
        self.polygons.iter()
    }

    /// Area totals over the set
    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::from_polygons(&self.polygons)
    }
}

/// Area totals over a set of detected polygons
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total_polygons: usize,
    pub total_area_ha: f64,
    pub average_area_ha: f64,
    pub max_area_ha: f64,
    pub min_area_ha: f64,
}

impl DetectionSummary {
    pub fn from_polygons(polygons: &[DetectedPolygon]) -> Self {
        if polygons.is_empty() {
            return Self::default();
        }
        let areas = polygons.iter().map(DetectedPolygon::area_ha);
        let total: f64 = areas.clone().sum();
        Self {
            total_polygons: polygons.len(),
            total_area_ha: total,
            average_area_ha: total / polygons.len() as f64,
            max_area_ha: areas.clone().fold(f64::NEG_INFINITY, f64::max),
            min_area_ha: areas.fold(f64::INFINITY, f64::min),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Polygonizer stage
#[derive(Debug, Clone, Default)]
pub struct MaskPolygonizer;

impl Algorithm for MaskPolygonizer {
    type Input = MiningMask;
    type Output = DetectedPolygonSet;
    type Params = PolygonizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MaskPolygonizer"
    }

    fn description(&self) -> &'static str {
        "Trace mask regions into attributed polygons with holes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        polygonize_mask(input.raster(), &params)
    }
}

/// Trace the non-zero regions of `mask` into polygons.
///
/// The mask must carry a CRS. Each kept polygon also gets a `pixel_count`
/// attribute in the side-table.
pub fn polygonize_mask(mask: &Raster<u8>, params: &PolygonizeParams) -> Result<DetectedPolygonSet> {
    params.validate()?;
    let crs = mask
        .crs()
        .cloned()
        .ok_or_else(|| Error::InvalidRaster("mask has no CRS".to_string()))?;
    let geographic = crs.is_geographic();
    let transform = *mask.transform();

    let Labeling { labels, components } = label_components(mask.data());
    if components.is_empty() {
        debug!("empty mask, no polygons");
        return Ok(DetectedPolygonSet::empty(crs));
    }

    let boundaries = collect_boundaries(&labels, components.len());
    let traced: Vec<Result<Option<(Polygon<f64>, PolygonMetrics)>>> = boundaries
        .into_par_iter()
        .map(|edges| {
            let polygon = edges.into_polygon(&transform)?;
            if !is_valid_polygon(&polygon) {
                return Ok(None);
            }
            let metrics = PolygonMetrics::measure(&polygon, geographic);
            Ok((metrics.area_ha >= params.min_area_ha).then_some((polygon, metrics)))
        })
        .collect();

    let mut set = DetectedPolygonSet::empty(crs);
    for (component, traced) in components.iter().zip(traced) {
        let Some((geometry, metrics)) = traced? else {
            continue;
        };
        let id = format!("mining_{}", set.polygons.len() + 1);
        set.attributes.set(&id, "pixel_count", component.size as i64);
        set.polygons.push(DetectedPolygon {
            id,
            geometry,
            metrics,
        });
    }

    info!(
        regions = components.len(),
        polygons = set.len(),
        min_area_ha = params.min_area_ha,
        "polygonized mask"
    );
    Ok(set)
}

// ---------------------------------------------------------------------------
// Boundary tracing
// ---------------------------------------------------------------------------

// Directions in pixel-corner space (x = col, y = row, y down).
// Turning right is `+1 mod 4`.
const EAST: u8 = 0;
const SOUTH: u8 = 1;
const WEST: u8 = 2;
const NORTH: u8 = 3;

type Vertex = (usize, usize);

fn step((x, y): Vertex, dir: u8) -> Vertex {
    match dir {
        EAST => (x + 1, y),
        SOUTH => (x, y + 1),
        WEST => (x - 1, y),
        _ => (x, y - 1),
    }
}

/// Directed boundary edges of one region
#[derive(Default)]
struct RegionEdges {
    /// Outgoing edge directions at each vertex, as a bit set
    outgoing: HashMap<Vertex, u8>,
    /// Edges in scan order, for deterministic ring starts
    order: Vec<(Vertex, u8)>,
}

impl RegionEdges {
    fn push(&mut self, from: Vertex, dir: u8) {
        *self.outgoing.entry(from).or_insert(0) |= 1 << dir;
        self.order.push((from, dir));
    }

    fn has(&self, from: Vertex, dir: u8) -> bool {
        self.outgoing.get(&from).is_some_and(|bits| bits & (1 << dir) != 0)
    }

    /// Follow every edge into closed rings of corner vertices
    fn rings(&self) -> Result<Vec<Vec<Vertex>>> {
        let mut used: HashMap<Vertex, u8> = HashMap::with_capacity(self.outgoing.len());
        let mut rings = Vec::new();

        for &(start, start_dir) in &self.order {
            if used.get(&start).is_some_and(|bits| bits & (1 << start_dir) != 0) {
                continue;
            }

            let mut ring = Vec::new();
            let (mut v, mut dir) = (start, start_dir);
            loop {
                *used.entry(v).or_insert(0) |= 1 << dir;
                let next = step(v, dir);
                let next_dir = [(dir + 1) % 4, dir, (dir + 3) % 4]
                    .into_iter()
                    .find(|&d| self.has(next, d))
                    .ok_or_else(|| {
                        Error::Geometry(format!("open boundary at corner {next:?}"))
                    })?;
                if next_dir != dir {
                    ring.push(next);
                }
                v = next;
                dir = next_dir;
                if (v, dir) == (start, start_dir) {
                    break;
                }
            }

            if let Some(&first) = ring.first() {
                ring.push(first);
                rings.push(ring);
            }
        }
        Ok(rings)
    }

    fn into_polygon(self, transform: &GeoTransform) -> Result<Polygon<f64>> {
        let mut rings = self.rings()?;
        let exterior_idx = rings
            .iter()
            .enumerate()
            .max_by(|a, b| ring_area(a.1).total_cmp(&ring_area(b.1)))
            .map(|(i, _)| i)
            .ok_or_else(|| Error::Geometry("region without boundary".to_string()))?;
        let exterior = rings.swap_remove(exterior_idx);

        let to_line = |ring: Vec<Vertex>| -> LineString<f64> {
            ring.into_iter()
                .map(|(x, y)| {
                    let (gx, gy) = transform.corner_to_geo(x as f64, y as f64);
                    Coord { x: gx, y: gy }
                })
                .collect()
        };

        let polygon = Polygon::new(to_line(exterior), rings.into_iter().map(to_line).collect());
        Ok(polygon.orient(Direction::Default))
    }
}

/// Absolute shoelace area of a closed ring in pixel units
fn ring_area(ring: &[Vertex]) -> f64 {
    ring.windows(2)
        .map(|w| {
            let (x0, y0) = (w[0].0 as f64, w[0].1 as f64);
            let (x1, y1) = (w[1].0 as f64, w[1].1 as f64);
            x0 * y1 - x1 * y0
        })
        .sum::<f64>()
        .abs()
        / 2.0
}

/// One scan over the label grid, emitting each region's edges in scan order.
fn collect_boundaries(labels: &ndarray::Array2<u32>, regions: usize) -> Vec<RegionEdges> {
    let (rows, cols) = labels.dim();
    let mut edges: Vec<RegionEdges> = (0..regions).map(|_| RegionEdges::default()).collect();

    for r in 0..rows {
        for c in 0..cols {
            let label = labels[(r, c)];
            if label == 0 {
                continue;
            }
            let same = |rr: Option<usize>, cc: Option<usize>| match (rr, cc) {
                (Some(rr), Some(cc)) if rr < rows && cc < cols => labels[(rr, cc)] == label,
                _ => false,
            };
            let region = &mut edges[label as usize - 1];

            if !same(r.checked_sub(1), Some(c)) {
                region.push((c, r), EAST);
            }
            if !same(Some(r), Some(c + 1)) {
                region.push((c + 1, r), SOUTH);
            }
            if !same(Some(r + 1), Some(c)) {
                region.push((c + 1, r + 1), WEST);
            }
            if !same(Some(r), c.checked_sub(1)) {
                region.push((c, r + 1), NORTH);
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Area;
    use ndarray::{array, s, Array2};

    fn utm_mask(data: Array2<u8>) -> Raster<u8> {
        Raster::from_array(data)
            .with_transform(GeoTransform::new(500_000.0, 2_000_000.0, 10.0, -10.0))
            .with_crs(CRS::from_epsg(32645))
    }

    fn params(min_area_ha: f64) -> PolygonizeParams {
        PolygonizeParams { min_area_ha }
    }

    #[test]
    fn test_single_square() {
        let mut data = Array2::<u8>::zeros((10, 10));
        data.slice_mut(s![2..5, 3..7]).fill(1);
        let set = polygonize_mask(&utm_mask(data), &PolygonizeParams::default()).unwrap();

        assert_eq!(set.len(), 1);
        let p = &set.polygons[0];
        assert_eq!(p.id, "mining_1");
        // 4 x 3 pixels of 100 m²; collinear edges merged into 4 corners
        assert_eq!(p.geometry.exterior().0.len(), 5);
        assert_relative_eq!(p.metrics.area_m2, 1200.0, epsilon = 1e-6);
        assert_relative_eq!(p.metrics.area_ha, 0.12, epsilon = 1e-9);
        assert_relative_eq!(p.metrics.perimeter_m, 140.0, epsilon = 1e-6);

        let (x, y) = (500_030.0, 1_999_980.0);
        assert!(p.geometry.exterior().0.contains(&Coord { x, y }));
        assert_eq!(set.attributes.get("mining_1", "pixel_count"), Some(&12i64.into()));
    }

    #[test]
    fn test_ring_with_hole() {
        let data = array![
            [1u8, 1, 1, 1],
            [1, 0, 0, 1],
            [1, 0, 0, 1],
            [1, 1, 1, 1],
        ];
        let set = polygonize_mask(&utm_mask(data), &params(1e-6)).unwrap();
        assert_eq!(set.len(), 1);
        let poly = &set.polygons[0].geometry;
        assert_eq!(poly.interiors().len(), 1);
        assert_relative_eq!(poly.unsigned_area(), 1200.0, epsilon = 1e-6);
        // outer 160 m + hole 80 m
        assert_relative_eq!(set.polygons[0].metrics.perimeter_m, 240.0, epsilon = 1e-6);
    }

    #[test]
    fn test_diagonal_pixels_are_separate_polygons() {
        let data = array![
            [1u8, 0],
            [0, 1],
        ];
        let set = polygonize_mask(&utm_mask(data), &params(1e-6)).unwrap();
        assert_eq!(set.len(), 2);
        for p in set.iter() {
            assert_relative_eq!(p.metrics.area_m2, 100.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_saddle_inside_one_region() {
        // Both diagonal cells belong to one U-shaped region through the left column
        let data = array![
            [1u8, 1, 0],
            [1, 0, 1],
            [1, 1, 1],
        ];
        let set = polygonize_mask(&utm_mask(data), &params(1e-6)).unwrap();
        assert_eq!(set.len(), 1);
        assert_relative_eq!(set.polygons[0].metrics.area_m2, 700.0, epsilon = 1e-6);
    }

    #[test]
    fn test_min_area_filter_and_ids() {
        let mut data = Array2::<u8>::zeros((20, 20));
        data.slice_mut(s![0..2, 0..2]).fill(1); // 400 m² = 0.04 ha
        data.slice_mut(s![5..15, 5..15]).fill(1); // 1 ha
        data.slice_mut(s![18..20, 18..20]).fill(1);

        let set = polygonize_mask(&utm_mask(data), &params(0.5)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.polygons[0].id, "mining_1");
        assert_relative_eq!(set.polygons[0].area_ha(), 1.0, epsilon = 1e-9);
        assert!(set.iter().all(|p| p.area_ha() >= 0.5));
    }

    #[test]
    fn test_geographic_area_uses_degree_approximation() {
        let mut data = Array2::<u8>::zeros((4, 4));
        data.slice_mut(s![0..2, 0..2]).fill(1);
        let mask = Raster::from_array(data)
            .with_transform(GeoTransform::new(85.0, 23.0, 0.0001, -0.0001))
            .with_crs(CRS::wgs84());

        let set = polygonize_mask(&mask, &params(1e-6)).unwrap();
        // (0.0002 * 111000)^2 = 492.84 m²
        assert_relative_eq!(set.polygons[0].metrics.area_m2, 492.84, epsilon = 1e-4);
        assert_relative_eq!(set.polygons[0].metrics.perimeter_m, 88.8, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_mask() {
        let set = polygonize_mask(&utm_mask(Array2::zeros((5, 5))), &PolygonizeParams::default())
            .unwrap();
        assert!(set.is_empty());
        assert_eq!(set.summary(), DetectionSummary::default());
    }

    #[test]
    fn test_missing_crs_rejected() {
        let mask = Raster::from_array(Array2::<u8>::ones((2, 2)));
        assert!(polygonize_mask(&mask, &PolygonizeParams::default()).is_err());
        assert!(params(0.0).validate().is_err());
    }

    #[test]
    fn test_summary() {
        let mut data = Array2::<u8>::zeros((30, 30));
        data.slice_mut(s![0..10, 0..10]).fill(1); // 1 ha
        data.slice_mut(s![20..30, 0..30]).fill(1); // 3 ha
        let summary = polygonize_mask(&utm_mask(data), &PolygonizeParams::default())
            .unwrap()
            .summary();
        assert_eq!(summary.total_polygons, 2);
        assert_relative_eq!(summary.total_area_ha, 4.0, epsilon = 1e-9);
        assert_relative_eq!(summary.average_area_ha, 2.0, epsilon = 1e-9);
        assert_relative_eq!(summary.max_area_ha, 3.0, epsilon = 1e-9);
        assert_relative_eq!(summary.min_area_ha, 1.0, epsilon = 1e-9);
    }
}
