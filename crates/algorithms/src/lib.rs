//! # MineWatch Algorithms
//!
//! Mining footprint detection from multispectral imagery and legality
//! classification against lease boundaries.
//!
//! ## Stages
//!
//! - **imagery**: six-band reflectance input, spectral indices
//! - **morphology**: binary erosion, dilation, opening, closing, components
//! - **detection**: mining mask voting and cleanup, mask polygonization
//! - **vector**: polygon measurements and overlay
//! - **legality**: leases, per-polygon classification, summary statistics
//! - **pipeline**: all stages chained with one configuration

pub mod detection;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod legality;
pub mod morphology;
pub mod pipeline;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::detection::{
        build_mining_mask, polygonize_mask, DetectedPolygon, DetectedPolygonSet,
        DetectionParams, MaskPolygonizer, MiningMask, MiningMaskBuilder, PolygonizeParams,
    };
    pub use crate::imagery::{
        compute_indices, Band, IndexParams, IndexRasterSet, ReflectanceRaster, SpectralIndex,
        SpectralIndexCalculator,
    };
    pub use crate::legality::{
        classify, classify_cancellable, ClassificationRecord, ClassificationRecordSet,
        ClassificationStatus, ClassifierParams, LeaseBoundary, LeaseBoundarySet,
        LegalityClassifier, Severity, SummaryAggregator, SummaryStatistics,
    };
    pub use crate::pipeline::{AnalysisReport, DetectionReport, MiningAnalysis, PipelineConfig};
    pub use minewatch_core::prelude::*;
}
