//! End-to-end analysis: reflectance bands and leases in, legality report out
//!
//! ```text
//! ReflectanceRaster ─► indices ─► mask ─► polygons ─┐
//!                                                    ├─► records ─► summary
//! LeaseBoundarySet ─────────────────────────────────┘
//! ```

use crate::detection::{
    build_mining_mask, polygonize_mask, DetectedPolygonSet, DetectionParams, DetectionSummary,
    MaskStatistics, MiningMask, PolygonizeParams,
};
use crate::imagery::{compute_indices, IndexParams, IndexStatistics, ReflectanceRaster};
use crate::legality::{
    classify_cancellable, ClassificationRecordSet, ClassifierParams, LeaseBoundarySet,
    SummaryStatistics,
};
use minewatch_core::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use tracing::info;

/// Every tunable of the pipeline, loadable from a partial JSON document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub indices: IndexParams,
    pub detection: DetectionParams,
    pub polygonize: PolygonizeParams,
    pub classifier: ClassifierParams,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.indices.validate()?;
        self.detection.validate()?;
        self.polygonize.validate()?;
        self.classifier.validate()
    }
}

/// Output of the detection half of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub index_statistics: Vec<IndexStatistics>,
    pub mask_statistics: MaskStatistics,
    pub summary: DetectionSummary,
    pub polygons: DetectedPolygonSet,
    #[serde(skip)]
    pub mask: MiningMask,
}

/// Output of a full run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub detection: DetectionReport,
    pub records: ClassificationRecordSet,
    pub summary: SummaryStatistics,
}

/// Configured five-stage analysis
#[derive(Debug, Clone)]
pub struct MiningAnalysis {
    config: PipelineConfig,
}

impl MiningAnalysis {
    /// Fails if any parameter is out of range
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Indices, mask and polygons
    pub fn detect(&self, raster: &ReflectanceRaster) -> Result<DetectionReport> {
        let indices = compute_indices(raster, &self.config.indices)?;
        let index_statistics = indices.all_statistics();

        let mask = build_mining_mask(&indices, &self.config.detection)?;
        let polygons = polygonize_mask(mask.raster(), &self.config.polygonize)?;

        Ok(DetectionReport {
            index_statistics,
            mask_statistics: *mask.statistics(),
            summary: polygons.summary(),
            polygons,
            mask,
        })
    }

    /// Records and summary for already detected polygons
    pub fn classify(
        &self,
        polygons: &DetectedPolygonSet,
        leases: &LeaseBoundarySet,
    ) -> Result<(ClassificationRecordSet, SummaryStatistics)> {
        self.classify_cancellable(polygons, leases, &AtomicBool::new(false))
    }

    /// [`MiningAnalysis::classify`] that can be stopped between polygons
    pub fn classify_cancellable(
        &self,
        polygons: &DetectedPolygonSet,
        leases: &LeaseBoundarySet,
        cancel: &AtomicBool,
    ) -> Result<(ClassificationRecordSet, SummaryStatistics)> {
        let records = classify_cancellable(polygons, leases, &self.config.classifier, cancel)?;
        let summary = records.summary();
        Ok((records, summary))
    }

    /// All five stages
    pub fn run(&self, raster: &ReflectanceRaster, leases: &LeaseBoundarySet) -> Result<AnalysisReport> {
        self.run_cancellable(raster, leases, &AtomicBool::new(false))
    }

    /// [`MiningAnalysis::run`] whose classification stage honours `cancel`
    pub fn run_cancellable(
        &self,
        raster: &ReflectanceRaster,
        leases: &LeaseBoundarySet,
        cancel: &AtomicBool,
    ) -> Result<AnalysisReport> {
        let detection = self.detect(raster)?;
        let (records, summary) = self.classify_cancellable(&detection.polygons, leases, cancel)?;

        info!(
            polygons = detection.polygons.len(),
            detected_ha = detection.summary.total_area_ha,
            illegal_ha = summary.illegal_area_ha,
            compliance = summary.compliance_rate_percent,
            "analysis finished"
        );
        Ok(AnalysisReport {
            detection,
            records,
            summary,
        })
    }
}
