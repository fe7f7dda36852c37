//! Mining footprint detection
//!
//! - **Mask**: spectral voting plus morphological cleanup
//! - **Polygonize**: pixel-edge tracing of mask regions into polygons

mod mask;
mod polygonize;

pub use mask::{
    build_mining_mask, clean_mask, raw_mining_mask, DetectionParams, MaskStatistics,
    MaskThresholds, MiningMask, MiningMaskBuilder, MorphologyParams, SignatureThresholds,
};
pub use polygonize::{
    polygonize_mask, DetectedPolygon, DetectedPolygonSet, DetectionSummary, MaskPolygonizer,
    PolygonizeParams,
};
