//! Legality classification of detected footprints against lease boundaries
//!
//! All areas are measured after projecting both layers to `area_crs`
//! (Web Mercator by default). The lease union is buffered by
//! `buffer_meters` to absorb survey error, then each polygon is split into
//! the part inside that buffered union and the part outside it:
//!
//! | condition                     | status    |
//! |-------------------------------|-----------|
//! | outside ≤ `tolerance_ha`      | legal     |
//! | overlap ≥ 80 %                | mixed     |
//! | otherwise                     | illegal   |
//!
//! A polygon that cannot be measured becomes an `error` record; the rest of
//! the batch is unaffected.

use crate::detection::{DetectedPolygon, DetectedPolygonSet};
use crate::maybe_rayon::*;
use crate::vector::{
    area, buffer, dissolve, intersection_area, is_valid_polygon, split_area, M2_PER_HECTARE,
};
use geo::{BoundingRect, Intersects, MultiPolygon, Polygon, Rect};
use minewatch_core::vector::AttributeTable;
use minewatch_core::{Algorithm, Error, Result, Reprojector, CRS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::lease::LeaseBoundarySet;
use super::summary::SummaryStatistics;

/// Overlap percentage from which a partly-outside polygon counts as mixed
pub const MIXED_OVERLAP_PERCENT: f64 = 80.0;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for the legality classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Outward buffer applied to the lease union, in area-CRS metres. Default: 10
    pub buffer_meters: f64,
    /// Largest outside area still considered legal, in hectares. Default: 0.01
    pub tolerance_ha: f64,
    /// CRS used for every area measurement. Default: EPSG:3857
    pub area_crs: CRS,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            buffer_meters: 10.0,
            tolerance_ha: 0.01,
            area_crs: CRS::web_mercator(),
        }
    }
}

impl ClassifierParams {
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_meters.is_finite() || self.buffer_meters < 0.0 {
            return Err(Error::InvalidParameter {
                name: "buffer_meters",
                value: self.buffer_meters.to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }
        if !self.tolerance_ha.is_finite() || self.tolerance_ha < 0.0 {
            return Err(Error::InvalidParameter {
                name: "tolerance_ha",
                value: self.tolerance_ha.to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }
        if self.area_crs.is_geographic() {
            return Err(Error::InvalidParameter {
                name: "area_crs",
                value: self.area_crs.to_string(),
                reason: "area CRS must be projected".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Legality of one detected polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    Legal,
    Mixed,
    Illegal,
    Error,
}

impl ClassificationStatus {
    /// Status from the outside area and overlap, first matching rule wins.
    pub fn from_overlap(outside_ha: f64, overlap_percentage: f64, tolerance_ha: f64) -> Self {
        if outside_ha <= tolerance_ha {
            Self::Legal
        } else if overlap_percentage >= MIXED_OVERLAP_PERCENT {
            Self::Mixed
        } else {
            Self::Illegal
        }
    }

    /// Whether part of the polygon lies outside every lease
    pub fn is_violation(self) -> bool {
        matches!(self, Self::Mixed | Self::Illegal)
    }
}

impl std::fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Legal => "legal",
            Self::Mixed => "mixed",
            Self::Illegal => "illegal",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// How serious a violation is, from the share of the polygon covered by leases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// - legal or error: none
    /// - no overlap at all: critical
    /// - overlap below 10 %: high
    /// - overlap below 50 %: medium
    /// - otherwise: low
    pub fn assess(status: ClassificationStatus, overlap_percentage: f64) -> Self {
        if !status.is_violation() {
            return Self::None;
        }
        match overlap_percentage / 100.0 {
            f if f <= 0.0 => Self::Critical,
            f if f < 0.1 => Self::High,
            f if f < 0.5 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// A lease touched by a detected polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlappingLease {
    pub lease_id: String,
    pub lease_name: String,
    pub overlap_area_ha: f64,
}

/// Classification of one detected polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub polygon_id: String,
    /// Geometry in the detection CRS
    pub geometry: Polygon<f64>,
    pub total_area_ha: f64,
    pub inside_area_ha: f64,
    pub outside_area_ha: f64,
    /// Share of the polygon inside the buffered lease union, 0-100
    pub overlap_percentage: f64,
    pub status: ClassificationStatus,
    pub confidence: f64,
    pub overlapping_leases: Vec<OverlappingLease>,
    /// Outside area for mixed and illegal records, otherwise 0
    pub illegal_area_ha: f64,
    pub severity: Severity,
    /// Failure message for `error` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationRecord {
    fn failed(polygon: &DetectedPolygon, error: &Error) -> Self {
        Self {
            polygon_id: polygon.id.clone(),
            geometry: polygon.geometry.clone(),
            total_area_ha: 0.0,
            inside_area_ha: 0.0,
            outside_area_ha: 0.0,
            overlap_percentage: 0.0,
            status: ClassificationStatus::Error,
            confidence: 0.0,
            overlapping_leases: Vec::new(),
            illegal_area_ha: 0.0,
            severity: Severity::None,
            error: Some(error.to_string()),
        }
    }
}

/// Records in input polygon order plus the passthrough attribute table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecordSet {
    pub crs: CRS,
    pub records: Vec<ClassificationRecord>,
    #[serde(default)]
    pub attributes: AttributeTable,
    /// Set when the run was stopped early; `records` then holds only the
    /// polygons finished before the stop
    #[serde(default)]
    pub cancelled: bool,
}

impl ClassificationRecordSet {
    pub fn empty(crs: CRS) -> Self {
        Self {
            crs,
            records: Vec::new(),
            attributes: AttributeTable::new(),
            cancelled: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRecord> {
        self.records.iter()
    }

    /// Record for `polygon_id`
    pub fn get(&self, polygon_id: &str) -> Option<&ClassificationRecord> {
        self.records.iter().find(|r| r.polygon_id == polygon_id)
    }

    pub fn summary(&self) -> SummaryStatistics {
        SummaryStatistics::from_records(&self.records)
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

fn overlap_factor(overlap_percentage: f64) -> f64 {
    if overlap_percentage >= 95.0 {
        0.95
    } else if overlap_percentage >= 80.0 {
        0.85
    } else if overlap_percentage >= 50.0 {
        0.70
    } else {
        0.60
    }
}

fn area_factor(total_area_ha: f64) -> f64 {
    if total_area_ha >= 10.0 {
        1.0
    } else if total_area_ha >= 1.0 {
        0.9
    } else {
        0.8
    }
}

fn lease_factor(overlapping_leases: usize) -> f64 {
    match overlapping_leases {
        0 => 0.8,
        1 => 1.0,
        _ => 0.9,
    }
}

/// Confidence in a classification, in [0, 1]
pub fn confidence(overlap_percentage: f64, total_area_ha: f64, overlapping_leases: usize) -> f64 {
    (overlap_factor(overlap_percentage) * area_factor(total_area_ha) * lease_factor(overlapping_leases))
        .clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Classifier stage
#[derive(Debug, Clone, Default)]
pub struct LegalityClassifier;

impl Algorithm for LegalityClassifier {
    type Input = (DetectedPolygonSet, LeaseBoundarySet);
    type Output = ClassificationRecordSet;
    type Params = ClassifierParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "LegalityClassifier"
    }

    fn description(&self) -> &'static str {
        "Classify detected polygons as legal, mixed or illegal against lease boundaries"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (polygons, leases) = input;
        classify(&polygons, &leases, &params)
    }
}

/// Lease geometry prepared in the area CRS
struct ProjectedLease<'a> {
    lease_id: &'a str,
    lease_name: &'a str,
    geometry: Polygon<f64>,
    bbox: Rect<f64>,
}

/// Everything shared read-only between polygon workers
struct Overlay<'a> {
    leases: Vec<ProjectedLease<'a>>,
    buffered_union: MultiPolygon<f64>,
    /// `None` when the polygon CRS is unsupported
    to_area_crs: Option<Reprojector>,
    polygon_crs: &'a CRS,
    tolerance_ha: f64,
}

impl<'a> Overlay<'a> {
    fn prepare(
        polygon_crs: &'a CRS,
        leases: &'a LeaseBoundarySet,
        params: &ClassifierParams,
    ) -> Result<Self> {
        // Lease CRS problems abort the batch; polygon CRS problems are
        // reported per record.
        let lease_projector = Reprojector::new(&leases.crs, &params.area_crs)?;
        let to_area_crs = match Reprojector::new(polygon_crs, &params.area_crs) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %e, "polygon CRS cannot be projected, every record will fail");
                None
            }
        };
        if !leases.crs.is_equivalent(polygon_crs) {
            debug!(from = %leases.crs, to = %polygon_crs, "reprojecting leases");
        }

        let mut projected = Vec::with_capacity(leases.len());
        for lease in leases.iter() {
            if !is_valid_polygon(&lease.geometry) {
                warn!(lease_id = %lease.lease_id, "skipping lease with invalid geometry");
                continue;
            }
            let geometry = lease_projector.transform_polygon(&lease.geometry)?;
            let Some(bbox) = geometry.bounding_rect() else {
                continue;
            };
            projected.push(ProjectedLease {
                lease_id: &lease.lease_id,
                lease_name: &lease.lease_name,
                geometry,
                bbox,
            });
        }

        let polygons: Vec<Polygon<f64>> = projected.iter().map(|l| l.geometry.clone()).collect();
        let union = dissolve(&polygons);
        let buffered_union = buffer(&union, params.buffer_meters)?;
        debug!(
            leases = projected.len(),
            buffer_meters = params.buffer_meters,
            "prepared buffered lease union"
        );

        Ok(Self {
            leases: projected,
            buffered_union,
            to_area_crs,
            polygon_crs,
            tolerance_ha: params.tolerance_ha,
        })
    }

    fn classify_polygon(&self, polygon: &DetectedPolygon) -> Result<ClassificationRecord> {
        if !is_valid_polygon(&polygon.geometry) {
            return Err(Error::Geometry("polygon geometry is invalid".to_string()));
        }
        let to_area_crs = self
            .to_area_crs
            .as_ref()
            .ok_or_else(|| Error::UnsupportedCrs(self.polygon_crs.identifier()))?;
        let projected = to_area_crs.transform_polygon(&polygon.geometry)?;

        let total_m2 = area(&projected);
        if !(total_m2 > 0.0 && total_m2.is_finite()) {
            return Err(Error::Geometry(format!("degenerate area {total_m2}")));
        }
        let (inside_m2, outside_m2) = split_area(&projected, &self.buffered_union)?;

        let total_area_ha = total_m2 / M2_PER_HECTARE;
        let inside_area_ha = inside_m2 / M2_PER_HECTARE;
        let outside_area_ha = outside_m2 / M2_PER_HECTARE;
        let overlap_percentage = (inside_m2 / total_m2 * 100.0).clamp(0.0, 100.0);

        let overlapping_leases = self.overlapping_leases(&projected)?;

        let status =
            ClassificationStatus::from_overlap(outside_area_ha, overlap_percentage, self.tolerance_ha);
        let illegal_area_ha = if status.is_violation() {
            outside_area_ha
        } else {
            0.0
        };

        Ok(ClassificationRecord {
            polygon_id: polygon.id.clone(),
            geometry: polygon.geometry.clone(),
            total_area_ha,
            inside_area_ha,
            outside_area_ha,
            overlap_percentage,
            status,
            confidence: confidence(overlap_percentage, total_area_ha, overlapping_leases.len()),
            overlapping_leases,
            illegal_area_ha,
            severity: Severity::assess(status, overlap_percentage),
            error: None,
        })
    }

    fn overlapping_leases(&self, projected: &Polygon<f64>) -> Result<Vec<OverlappingLease>> {
        let Some(bbox) = projected.bounding_rect() else {
            return Ok(Vec::new());
        };

        // Touching leases count, with zero overlap area
        let mut found = Vec::new();
        for lease in self.leases.iter().filter(|l| l.bbox.intersects(&bbox)) {
            if !projected.intersects(&lease.geometry) {
                continue;
            }
            let overlap_m2 = intersection_area(projected, &lease.geometry)?;
            found.push(OverlappingLease {
                lease_id: lease.lease_id.to_string(),
                lease_name: lease.lease_name.to_string(),
                overlap_area_ha: overlap_m2 / M2_PER_HECTARE,
            });
        }
        Ok(found)
    }

    fn record(&self, polygon: &DetectedPolygon) -> ClassificationRecord {
        self.classify_polygon(polygon).unwrap_or_else(|e| {
            warn!(polygon_id = %polygon.id, error = %e, "classification failed");
            ClassificationRecord::failed(polygon, &e)
        })
    }
}

/// Classify every polygon against the leases.
///
/// Records come back in input order. Empty polygon or lease sets give an
/// empty record set.
pub fn classify(
    polygons: &DetectedPolygonSet,
    leases: &LeaseBoundarySet,
    params: &ClassifierParams,
) -> Result<ClassificationRecordSet> {
    classify_cancellable(polygons, leases, params, &AtomicBool::new(false))
}

/// [`classify`] that stops starting new polygons once `cancel` is set.
///
/// The returned set holds the records finished before the stop, still in
/// input order, and has `cancelled` set.
pub fn classify_cancellable(
    polygons: &DetectedPolygonSet,
    leases: &LeaseBoundarySet,
    params: &ClassifierParams,
    cancel: &AtomicBool,
) -> Result<ClassificationRecordSet> {
    params.validate()?;

    let mut out = ClassificationRecordSet::empty(polygons.crs.clone());
    if polygons.is_empty() || leases.is_empty() {
        warn!(
            polygons = polygons.len(),
            leases = leases.len(),
            "empty input, nothing to classify"
        );
        return Ok(out);
    }

    let overlay = Overlay::prepare(&polygons.crs, leases, params)?;

    let results: Vec<Option<ClassificationRecord>> = polygons
        .polygons
        .par_iter()
        .map(|polygon| {
            if cancel.load(Ordering::Relaxed) {
                None
            } else {
                Some(overlay.record(polygon))
            }
        })
        .collect();

    out.cancelled = results.iter().any(Option::is_none);
    out.records = results.into_iter().flatten().collect();
    let kept: HashSet<&str> = out.records.iter().map(|r| r.polygon_id.as_str()).collect();
    let mut attributes = polygons.attributes.clone();
    attributes.retain(|id| kept.contains(id));
    out.attributes = attributes;

    let summary = out.summary();
    info!(
        records = out.len(),
        legal = summary.legal_count,
        mixed = summary.mixed_count,
        illegal = summary.illegal_count,
        errors = summary.error_count,
        cancelled = out.cancelled,
        "classified polygons"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legality::LeaseBoundary;
    use crate::vector::PolygonMetrics;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    fn detected(id: &str, geometry: Polygon<f64>) -> DetectedPolygon {
        DetectedPolygon {
            id: id.to_string(),
            metrics: PolygonMetrics::measure(&geometry, false),
            geometry,
        }
    }

    fn polygon_set(polys: Vec<DetectedPolygon>) -> DetectedPolygonSet {
        DetectedPolygonSet {
            crs: CRS::web_mercator(),
            polygons: polys,
            attributes: AttributeTable::new(),
        }
    }

    fn lease_set(leases: Vec<(&str, Polygon<f64>)>) -> LeaseBoundarySet {
        LeaseBoundarySet::new(
            CRS::web_mercator(),
            leases
                .into_iter()
                .map(|(id, g)| LeaseBoundary {
                    lease_name: format!("Lease {id}"),
                    ..LeaseBoundary::new(id, g)
                })
                .collect(),
        )
    }

    fn no_buffer() -> ClassifierParams {
        ClassifierParams {
            buffer_meters: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_rule() {
        assert_eq!(ClassificationStatus::from_overlap(0.01, 10.0, 0.01), ClassificationStatus::Legal);
        assert_eq!(ClassificationStatus::from_overlap(0.0, 0.0, 0.01), ClassificationStatus::Legal);
        assert_eq!(ClassificationStatus::from_overlap(1.5, 85.0, 0.01), ClassificationStatus::Mixed);
        assert_eq!(ClassificationStatus::from_overlap(1.5, 80.0, 0.01), ClassificationStatus::Mixed);
        assert_eq!(ClassificationStatus::from_overlap(1.5, 79.9, 0.01), ClassificationStatus::Illegal);
    }

    #[test]
    fn test_confidence_factors() {
        assert_relative_eq!(confidence(0.0, 5.0, 0), 0.432, epsilon = 1e-12);
        assert_relative_eq!(confidence(0.0, 50.0, 0), 0.48, epsilon = 1e-12);
        assert_relative_eq!(confidence(100.0, 20.0, 1), 0.95, epsilon = 1e-12);
        assert_relative_eq!(confidence(85.0, 0.5, 2), 0.85 * 0.8 * 0.9, epsilon = 1e-12);
        assert_relative_eq!(confidence(60.0, 1.0, 1), 0.70 * 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_severity() {
        use ClassificationStatus::*;
        assert_eq!(Severity::assess(Legal, 100.0), Severity::None);
        assert_eq!(Severity::assess(Error, 0.0), Severity::None);
        assert_eq!(Severity::assess(Illegal, 0.0), Severity::Critical);
        assert_eq!(Severity::assess(Illegal, 5.0), Severity::High);
        assert_eq!(Severity::assess(Illegal, 30.0), Severity::Medium);
        assert_eq!(Severity::assess(Mixed, 85.0), Severity::Low);
    }

    #[test]
    fn test_inside_lease_is_legal() {
        let polys = polygon_set(vec![detected("mining_1", rect(100.0, 100.0, 300.0, 300.0))]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 1000.0, 1000.0))]);

        let out = classify(&polys, &leases, &ClassifierParams::default()).unwrap();
        let r = &out.records[0];
        assert_eq!(r.status, ClassificationStatus::Legal);
        assert_relative_eq!(r.total_area_ha, 4.0, epsilon = 1e-6);
        assert_relative_eq!(r.overlap_percentage, 100.0, epsilon = 1e-6);
        assert_eq!(r.overlapping_leases.len(), 1);
        assert_eq!(r.overlapping_leases[0].lease_name, "Lease L1");
        assert_relative_eq!(r.confidence, 0.95 * 0.9, epsilon = 1e-9);
        assert_eq!(r.illegal_area_ha, 0.0);
        assert_eq!(r.severity, Severity::None);
    }

    #[test]
    fn test_disjoint_is_illegal() {
        let polys = polygon_set(vec![detected("mining_1", rect(5000.0, 0.0, 5200.0, 250.0))]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 1000.0, 1000.0))]);

        let r = &classify(&polys, &leases, &ClassifierParams::default()).unwrap().records[0];
        assert_eq!(r.status, ClassificationStatus::Illegal);
        assert_relative_eq!(r.total_area_ha, 5.0, epsilon = 1e-6);
        assert_relative_eq!(r.illegal_area_ha, 5.0, epsilon = 1e-6);
        assert_relative_eq!(r.confidence, 0.432, epsilon = 1e-9);
        assert_eq!(r.severity, Severity::Critical);
        assert!(r.overlapping_leases.is_empty());
    }

    #[test]
    fn test_buffer_absorbs_edge_overhang() {
        // 5 m overhang past the lease edge, inside the 10 m buffer
        let polys = polygon_set(vec![detected("mining_1", rect(900.0, 100.0, 1005.0, 200.0))]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 1000.0, 1000.0))]);

        let buffered = classify(&polys, &leases, &ClassifierParams::default()).unwrap();
        assert_eq!(buffered.records[0].status, ClassificationStatus::Legal);

        let strict = classify(&polys, &leases, &no_buffer()).unwrap();
        let r = &strict.records[0];
        assert_relative_eq!(r.outside_area_ha, 0.05, epsilon = 1e-6);
        assert_eq!(r.status, ClassificationStatus::Mixed);
        assert_relative_eq!(r.illegal_area_ha, r.outside_area_ha);
    }

    #[test]
    fn test_two_leases_overlap_reported_separately() {
        let polys = polygon_set(vec![detected("mining_1", rect(50.0, 0.0, 150.0, 50.0))]);
        let leases = lease_set(vec![
            ("A", rect(0.0, 0.0, 100.0, 100.0)),
            ("B", rect(100.0, 0.0, 200.0, 100.0)),
            ("far", rect(5000.0, 5000.0, 5100.0, 5100.0)),
        ]);
        let r = &classify(&polys, &leases, &no_buffer()).unwrap().records[0];
        assert_eq!(r.status, ClassificationStatus::Legal);
        assert_eq!(r.overlapping_leases.len(), 2);
        for lease in &r.overlapping_leases {
            assert_relative_eq!(lease.overlap_area_ha, 0.25, epsilon = 1e-9);
        }
        assert_relative_eq!(r.confidence, 0.95 * 0.8 * 0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_polygon_becomes_error_record() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 0.0)];
        let polys = polygon_set(vec![
            detected("mining_1", rect(0.0, 0.0, 10.0, 10.0)),
            DetectedPolygon {
                id: "mining_2".to_string(),
                geometry: flat,
                metrics: PolygonMetrics::measure(&rect(0.0, 0.0, 1.0, 1.0), false),
            },
        ]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);

        let out = classify(&polys, &leases, &ClassifierParams::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.records[0].status, ClassificationStatus::Legal);
        let failed = &out.records[1];
        assert_eq!(failed.status, ClassificationStatus::Error);
        assert_eq!(failed.confidence, 0.0);
        assert_eq!(failed.total_area_ha, 0.0);
        assert!(failed.error.is_some());
    }

    #[test]
    fn test_unsupported_lease_crs_is_fatal() {
        let polys = polygon_set(vec![detected("mining_1", rect(0.0, 0.0, 10.0, 10.0))]);
        let mut leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);
        leases.crs = CRS::from_epsg(2154);
        assert!(matches!(
            classify(&polys, &leases, &ClassifierParams::default()),
            Err(Error::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn test_unsupported_polygon_crs_is_contained() {
        let mut polys = polygon_set(vec![detected("mining_1", rect(0.0, 0.0, 10.0, 10.0))]);
        polys.crs = CRS::from_epsg(2154);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);
        let out = classify(&polys, &leases, &ClassifierParams::default()).unwrap();
        assert_eq!(out.records[0].status, ClassificationStatus::Error);
    }

    #[test]
    fn test_empty_inputs() {
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);
        let out = classify(&polygon_set(vec![]), &leases, &ClassifierParams::default()).unwrap();
        assert!(out.is_empty());

        let polys = polygon_set(vec![detected("mining_1", rect(0.0, 0.0, 10.0, 10.0))]);
        let out = classify(&polys, &lease_set(vec![]), &ClassifierParams::default()).unwrap();
        assert!(out.is_empty());
        assert!(!out.cancelled);
    }

    #[test]
    fn test_cancelled_before_start() {
        let polys = polygon_set(vec![
            detected("mining_1", rect(0.0, 0.0, 10.0, 10.0)),
            detected("mining_2", rect(20.0, 0.0, 30.0, 10.0)),
        ]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);
        let cancel = AtomicBool::new(true);

        let out =
            classify_cancellable(&polys, &leases, &ClassifierParams::default(), &cancel).unwrap();
        assert!(out.cancelled);
        assert!(out.is_empty());
    }

    #[test]
    fn test_attributes_pass_through() {
        let mut polys = polygon_set(vec![detected("mining_1", rect(0.0, 0.0, 10.0, 10.0))]);
        polys.attributes.set("mining_1", "source", "sentinel-2");
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);

        let out = classify(&polys, &leases, &ClassifierParams::default()).unwrap();
        assert_eq!(out.attributes.get("mining_1", "source"), Some(&"sentinel-2".into()));
    }

    #[test]
    fn test_attributes_dropped_for_cancelled_polygons() {
        let mut polys = polygon_set(vec![detected("mining_1", rect(0.0, 0.0, 10.0, 10.0))]);
        polys.attributes.set("mining_1", "source", "sentinel-2");
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 100.0, 100.0))]);

        let cancel = AtomicBool::new(true);
        let out =
            classify_cancellable(&polys, &leases, &ClassifierParams::default(), &cancel).unwrap();
        assert!(out.attributes.is_empty());
    }

    #[test]
    fn test_touching_lease_is_listed() {
        // Shares the lease's east edge only
        let polys = polygon_set(vec![detected("mining_1", rect(1000.0, 0.0, 1200.0, 250.0))]);
        let leases = lease_set(vec![("L1", rect(0.0, 0.0, 1000.0, 1000.0))]);

        let r = &classify(&polys, &leases, &no_buffer()).unwrap().records[0];
        assert_eq!(r.status, ClassificationStatus::Illegal);
        assert_eq!(r.overlapping_leases.len(), 1);
        assert_relative_eq!(r.overlapping_leases[0].overlap_area_ha, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r.confidence, 0.60 * 0.9 * 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_params_validation() {
        let bad = ClassifierParams {
            buffer_meters: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = ClassifierParams {
            area_crs: CRS::wgs84(),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
