//! Imagery input and spectral indices
//!
//! - Six-band reflectance rasters with shape and nodata handling
//! - NDVI, BSI, NDBI, NDWI, MNDWI, SAVI, EVI and NBR in one pass

mod bands;
mod indices;

pub use bands::{Band, ReflectanceRaster};
pub use indices::{
    compute_indices, IndexParams, IndexRasterSet, IndexStatistics, SpectralIndex,
    SpectralIndexCalculator,
};
