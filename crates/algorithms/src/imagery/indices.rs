//! Spectral indices for mining-footprint detection
//!
//! All eight indices are computed in one row-parallel pass over a
//! [`ReflectanceRaster`]. Arithmetic is single precision; every division is
//! guarded by an epsilon so valid pixels always yield finite values.

use crate::maybe_rayon::*;
use minewatch_core::raster::GeoTransform;
use minewatch_core::{Algorithm, Error, Result, CRS};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::bands::{Band, ReflectanceRaster};

/// Spectral indices produced by the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Bare Soil Index
    BSI,
    /// Normalized Difference Built-up Index
    NDBI,
    /// Normalized Difference Water Index (McFeeters)
    NDWI,
    /// Modified NDWI (Xu, uses SWIR1)
    MNDWI,
    /// Soil Adjusted Vegetation Index
    SAVI,
    /// Enhanced Vegetation Index
    EVI,
    /// Normalized Burn Ratio
    NBR,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 8] = [
        SpectralIndex::NDVI,
        SpectralIndex::BSI,
        SpectralIndex::NDBI,
        SpectralIndex::NDWI,
        SpectralIndex::MNDWI,
        SpectralIndex::SAVI,
        SpectralIndex::EVI,
        SpectralIndex::NBR,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for index computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Denominator guard added to every ratio. Default: 1e-8
    pub epsilon: f32,
    /// SAVI soil brightness correction factor. Default: 0.5
    pub savi_l: f32,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            epsilon: 1e-8,
            savi_l: 0.5,
        }
    }
}

impl IndexParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                value: self.epsilon.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if !self.savi_l.is_finite() || self.savi_l < 0.0 {
            return Err(Error::InvalidParameter {
                name: "savi_l",
                value: self.savi_l.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The eight index rasters plus the pixel validity grid.
///
/// Invalid pixels (nodata in any band, or a non-finite index) hold 0 in
/// every index.
#[derive(Debug, Clone)]
pub struct IndexRasterSet {
    indices: [Array2<f32>; 8],
    valid: Array2<bool>,
    transform: GeoTransform,
    crs: CRS,
}

impl IndexRasterSet {
    /// Index data
    pub fn get(&self, index: SpectralIndex) -> &Array2<f32> {
        &self.indices[index.slot()]
    }

    /// Pixel validity grid
    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.valid.dim()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Number of valid pixels
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Min/max/mean of one index over valid pixels
    pub fn statistics(&self, index: SpectralIndex) -> IndexStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;

        Zip::from(self.get(index))
            .and(&self.valid)
            .for_each(|&v, &ok| {
                if ok {
                    let v = v as f64;
                    min = min.min(v);
                    max = max.max(v);
                    sum += v;
                    count += 1;
                }
            });

        if count == 0 {
            return IndexStatistics {
                index,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                valid_pixels: 0,
            };
        }
        IndexStatistics {
            index,
            min,
            max,
            mean: sum / count as f64,
            valid_pixels: count,
        }
    }

    /// Statistics for every index, in [`SpectralIndex::ALL`] order
    pub fn all_statistics(&self) -> Vec<IndexStatistics> {
        SpectralIndex::ALL
            .iter()
            .map(|&index| self.statistics(index))
            .collect()
    }
}

/// Summary of one index over the valid pixels of a scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub index: SpectralIndex,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid_pixels: usize,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Index calculator stage
#[derive(Debug, Clone, Default)]
pub struct SpectralIndexCalculator;

impl Algorithm for SpectralIndexCalculator {
    type Input = ReflectanceRaster;
    type Output = IndexRasterSet;
    type Params = IndexParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SpectralIndexCalculator"
    }

    fn description(&self) -> &'static str {
        "Compute NDVI, BSI, NDBI, NDWI, MNDWI, SAVI, EVI and NBR from six reflectance bands"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        compute_indices(&input, &params)
    }
}

/// Index values of one pixel in [`SpectralIndex::ALL`] order.
///
/// Returns `None` when any value is not finite.
fn pixel_indices(
    [blue, green, red, nir, swir1, swir2]: [f32; 6],
    params: &IndexParams,
) -> Option<[f32; 8]> {
    let eps = params.epsilon;
    let l = params.savi_l;

    let ndvi = (nir - red) / (nir + red + eps);
    let soil = swir1 + red;
    let veg = nir + blue;
    let bsi = (soil - veg) / (soil + veg + eps);
    let ndbi = (swir1 - nir) / (swir1 + nir + eps);
    let ndwi = (green - nir) / (green + nir + eps);
    let mndwi = (green - swir1) / (green + swir1 + eps);
    let savi = ((nir - red) / (nir + red + l)) * (1.0 + l);
    let evi = 2.5 * (nir - red) / (nir + 6.0 * red - 7.5 * blue + 1.0 + eps);
    let nbr = (nir - swir2) / (nir + swir2 + eps);

    let values = [ndvi, bsi, ndbi, ndwi, mndwi, savi, evi, nbr];
    values.iter().all(|v| v.is_finite()).then_some(values)
}

/// Compute all eight spectral indices.
///
/// Shape consistency is guaranteed by [`ReflectanceRaster`]; this only fails
/// on invalid parameters.
pub fn compute_indices(raster: &ReflectanceRaster, params: &IndexParams) -> Result<IndexRasterSet> {
    params.validate()?;

    let (rows, cols) = raster.shape();
    let input_valid = raster.validity();
    let bands: Vec<&Array2<f32>> = Band::ALL.iter().map(|&b| raster.band(b)).collect();

    let pixels: Vec<Option<[f32; 8]>> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![None; cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                if !input_valid[(row, col)] {
                    continue;
                }
                let sample = [
                    bands[0][(row, col)],
                    bands[1][(row, col)],
                    bands[2][(row, col)],
                    bands[3][(row, col)],
                    bands[4][(row, col)],
                    bands[5][(row, col)],
                ];
                *slot = pixel_indices(sample, params);
            }
            row_data
        })
        .collect();

    let mut indices: [Array2<f32>; 8] = std::array::from_fn(|_| Array2::zeros((rows, cols)));
    let mut valid = Array2::from_elem((rows, cols), false);

    for (i, pixel) in pixels.iter().enumerate() {
        let (row, col) = (i / cols.max(1), i % cols.max(1));
        if let Some(values) = pixel {
            valid[(row, col)] = true;
            for (array, &v) in indices.iter_mut().zip(values.iter()) {
                array[(row, col)] = v;
            }
        }
    }

    let set = IndexRasterSet {
        indices,
        valid,
        transform: *raster.transform(),
        crs: raster.crs().clone(),
    };
    debug!(
        rows,
        cols,
        valid_pixels = set.valid_count(),
        "computed spectral indices"
    );
    Ok(set)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_raster(values: [f32; 6], rows: usize, cols: usize, nodata: Option<f32>) -> ReflectanceRaster {
        let bands = values.map(|v| Array2::from_elem((rows, cols), v));
        ReflectanceRaster::new(
            bands,
            GeoTransform::new(0.0, rows as f64, 1.0, -1.0),
            CRS::from_epsg(32644),
            nodata,
        )
        .unwrap()
    }

    #[test]
    fn test_known_values() {
        // blue, green, red, nir, swir1, swir2
        let raster = make_raster([0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3, 3, None);
        let set = compute_indices(&raster, &IndexParams::default()).unwrap();

        let at = |idx| set.get(idx)[(1, 1)];
        assert_relative_eq!(at(SpectralIndex::NDVI), 0.1 / 0.7, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::BSI), 0.3 / 1.3, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::NDBI), 0.1 / 0.9, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::NDWI), -0.2 / 0.6, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::MNDWI), -0.3 / 0.7, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::SAVI), 0.1 / 1.2 * 1.5, epsilon = 1e-6);
        // 2.5 * 0.1 / (0.4 + 1.8 - 0.75 + 1)
        assert_relative_eq!(at(SpectralIndex::EVI), 0.25 / 2.45, epsilon = 1e-6);
        assert_relative_eq!(at(SpectralIndex::NBR), -0.2 / 1.0, epsilon = 1e-6);
        assert_eq!(set.valid_count(), 9);
    }

    #[test]
    fn test_zero_reflectance_is_finite() {
        let raster = make_raster([0.0; 6], 4, 4, None);
        let set = compute_indices(&raster, &IndexParams::default()).unwrap();
        for index in SpectralIndex::ALL {
            assert!(
                set.get(index).iter().all(|v| v.is_finite()),
                "{} should be finite for all-zero input",
                index
            );
        }
        assert_eq!(set.valid_count(), 16);
    }

    #[test]
    fn test_evi_near_singular_denominator_stays_finite() {
        // nir + 6*red - 7.5*blue + 1 = 0 with nir=0.5, red=0, blue=0.2
        let raster = make_raster([0.2, 0.1, 0.0, 0.5, 0.3, 0.3], 2, 2, None);
        let set = compute_indices(&raster, &IndexParams::default()).unwrap();
        assert!(set.get(SpectralIndex::EVI).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_nodata_pixels_zeroed() {
        let mut bands = [0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6].map(|v| Array2::from_elem((3, 3), v));
        bands[2][(0, 1)] = -9999.0;
        bands[5][(2, 2)] = f32::NAN;
        let raster = ReflectanceRaster::new(
            bands,
            GeoTransform::default(),
            CRS::wgs84(),
            Some(-9999.0),
        )
        .unwrap();
        let set = compute_indices(&raster, &IndexParams::default()).unwrap();

        assert!(!set.valid()[(0, 1)]);
        assert!(!set.valid()[(2, 2)]);
        for index in SpectralIndex::ALL {
            assert_eq!(set.get(index)[(0, 1)], 0.0);
            assert_eq!(set.get(index)[(2, 2)], 0.0);
        }
        assert_eq!(set.valid_count(), 7);
    }

    #[test]
    fn test_statistics_skip_invalid() {
        let mut bands = [0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6].map(|v| Array2::from_elem((2, 2), v));
        bands[3][(0, 0)] = f32::NAN;
        let raster =
            ReflectanceRaster::new(bands, GeoTransform::default(), CRS::wgs84(), None).unwrap();
        let set = compute_indices(&raster, &IndexParams::default()).unwrap();

        let stats = set.statistics(SpectralIndex::NDVI);
        assert_eq!(stats.valid_pixels, 3);
        assert_relative_eq!(stats.mean, (0.1f32 / 0.7) as f64, epsilon = 1e-6);
        assert_relative_eq!(stats.min, stats.max, epsilon = 1e-12);
        assert_eq!(set.all_statistics().len(), 8);
    }

    #[test]
    fn test_invalid_epsilon() {
        let raster = make_raster([0.1; 6], 2, 2, None);
        let params = IndexParams {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(compute_indices(&raster, &params).is_err());
    }

    #[test]
    fn test_algorithm_trait() {
        let raster = make_raster([0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 2, None);
        let set = SpectralIndexCalculator.execute_default(raster).unwrap();
        assert_eq!(set.shape(), (2, 2));
        assert_eq!(SpectralIndexCalculator.name(), "SpectralIndexCalculator");
    }
}
