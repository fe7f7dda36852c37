//! Mining mask construction
//!
//! Each valid pixel votes on seven spectral conditions. A pixel is a mining
//! candidate when at least `min_votes` conditions hold or when the strict
//! bare-soil signature matches. The raw mask is then cleaned with a fixed
//! morphology sequence whose order matters:
//!
//! 1. remove components smaller than `min_object_size`
//! 2. opening (`opening_size`)
//! 3. closing (`closing_size`)
//! 4. remove small components again
//! 5. dilation (`final_dilation_size`) then erosion (`final_erosion_size`)

use crate::imagery::{IndexRasterSet, SpectralIndex};
use crate::maybe_rayon::*;
use crate::morphology::{
    closing, dilate, erode, opening, remove_small_objects, Border, StructuringElement,
};
use crate::vector::DEGREE_TO_METERS;
use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Per-index thresholds for the voting rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskThresholds {
    /// Vote when NDVI is below this (sparse vegetation)
    pub ndvi: f32,
    /// Vote when BSI is above this (bare soil)
    pub bsi: f32,
    /// Vote when NDWI is below this (no open water)
    pub ndwi: f32,
    /// Vote when NDBI is above this (built-up / exposed surfaces)
    pub ndbi: f32,
    /// Vote when SAVI is below this
    pub savi: f32,
    /// Vote when EVI is below this
    pub evi: f32,
    /// Vote when NBR is below this
    pub nbr: f32,
}

impl Default for MaskThresholds {
    fn default() -> Self {
        Self {
            ndvi: 0.2,
            bsi: 0.3,
            ndwi: 0.2,
            ndbi: 0.1,
            savi: 0.1,
            evi: 0.1,
            nbr: 0.1,
        }
    }
}

/// Strict bare-soil signature that flags a pixel regardless of the vote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureThresholds {
    pub ndvi_max: f32,
    pub bsi_min: f32,
    pub ndbi_min: f32,
}

impl Default for SignatureThresholds {
    fn default() -> Self {
        Self {
            ndvi_max: 0.15,
            bsi_min: 0.4,
            ndbi_min: 0.2,
        }
    }
}

/// Sizes for the cleanup sequence, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyParams {
    pub min_object_size: usize,
    pub opening_size: usize,
    pub closing_size: usize,
    pub final_dilation_size: usize,
    pub final_erosion_size: usize,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            min_object_size: 50,
            opening_size: 3,
            closing_size: 5,
            final_dilation_size: 3,
            final_erosion_size: 2,
        }
    }
}

/// Parameters for the mask builder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub thresholds: MaskThresholds,
    pub signature: SignatureThresholds,
    /// Conditions that must hold for the vote to pass (1..=7). Default: 4
    pub min_votes: u8,
    pub morphology: MorphologyParams,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            thresholds: MaskThresholds::default(),
            signature: SignatureThresholds::default(),
            min_votes: 4,
            morphology: MorphologyParams::default(),
        }
    }
}

impl DetectionParams {
    /// Check thresholds are finite and sizes are usable
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        let s = &self.signature;
        let named = [
            ("thresholds.ndvi", t.ndvi),
            ("thresholds.bsi", t.bsi),
            ("thresholds.ndwi", t.ndwi),
            ("thresholds.ndbi", t.ndbi),
            ("thresholds.savi", t.savi),
            ("thresholds.evi", t.evi),
            ("thresholds.nbr", t.nbr),
            ("signature.ndvi_max", s.ndvi_max),
            ("signature.bsi_min", s.bsi_min),
            ("signature.ndbi_min", s.ndbi_min),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "threshold must be finite".to_string(),
                });
            }
        }
        if !(1..=7).contains(&self.min_votes) {
            return Err(Error::InvalidParameter {
                name: "min_votes",
                value: self.min_votes.to_string(),
                reason: "must be between 1 and 7".to_string(),
            });
        }

        let m = &self.morphology;
        for (name, size) in [
            ("morphology.opening_size", m.opening_size),
            ("morphology.closing_size", m.closing_size),
            ("morphology.final_dilation_size", m.final_dilation_size),
            ("morphology.final_erosion_size", m.final_erosion_size),
        ] {
            if size == 0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: "0".to_string(),
                    reason: "structuring element size must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Area statistics of a mining mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub mining_pixels: usize,
    pub total_pixels: usize,
    /// Ground area of one pixel in m²
    pub pixel_area_m2: f64,
    pub area_m2: f64,
    pub area_ha: f64,
    /// Share of the scene flagged as mining, 0-100
    pub percentage: f64,
}

impl MaskStatistics {
    fn from_mask(mask: &Raster<u8>) -> Self {
        let mut pixel_area_m2 = mask.transform().pixel_area();
        if mask.crs().is_some_and(|c| c.is_geographic()) {
            pixel_area_m2 *= DEGREE_TO_METERS * DEGREE_TO_METERS;
        }

        let mining_pixels = mask.data().iter().filter(|&&v| v != 0).count();
        let total_pixels = mask.len();
        let area_m2 = mining_pixels as f64 * pixel_area_m2;
        let percentage = if total_pixels > 0 {
            mining_pixels as f64 / total_pixels as f64 * 100.0
        } else {
            0.0
        };

        Self {
            mining_pixels,
            total_pixels,
            pixel_area_m2,
            area_m2,
            area_ha: area_m2 / 10_000.0,
            percentage,
        }
    }
}

/// Cleaned binary mining mask (1 = mining) with its statistics
#[derive(Debug, Clone)]
pub struct MiningMask {
    mask: Raster<u8>,
    stats: MaskStatistics,
}

impl MiningMask {
    /// Wrap an existing 0/1 raster, computing its statistics
    pub fn from_raster(mask: Raster<u8>) -> Self {
        let stats = MaskStatistics::from_mask(&mask);
        Self { mask, stats }
    }

    pub fn raster(&self) -> &Raster<u8> {
        &self.mask
    }

    pub fn statistics(&self) -> &MaskStatistics {
        &self.stats
    }

    pub fn into_raster(self) -> Raster<u8> {
        self.mask
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Mask builder stage
#[derive(Debug, Clone, Default)]
pub struct MiningMaskBuilder;

impl Algorithm for MiningMaskBuilder {
    type Input = IndexRasterSet;
    type Output = MiningMask;
    type Params = DetectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MiningMaskBuilder"
    }

    fn description(&self) -> &'static str {
        "Multi-criterion spectral voting followed by morphological cleanup"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        build_mining_mask(&input, &params)
    }
}

/// Per-pixel voting without any cleanup.
///
/// Invalid pixels are never flagged.
pub fn raw_mining_mask(indices: &IndexRasterSet, params: &DetectionParams) -> Result<Raster<u8>> {
    params.validate()?;

    let (rows, cols) = indices.shape();
    let t = params.thresholds;
    let s = params.signature;
    let min_votes = params.min_votes;

    let ndvi = indices.get(SpectralIndex::NDVI);
    let bsi = indices.get(SpectralIndex::BSI);
    let ndbi = indices.get(SpectralIndex::NDBI);
    let ndwi = indices.get(SpectralIndex::NDWI);
    let savi = indices.get(SpectralIndex::SAVI);
    let evi = indices.get(SpectralIndex::EVI);
    let nbr = indices.get(SpectralIndex::NBR);
    let valid = indices.valid();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let p = (row, col);
                if !valid[p] {
                    continue;
                }

                let votes = [
                    ndvi[p] < t.ndvi,
                    bsi[p] > t.bsi,
                    ndwi[p] < t.ndwi,
                    ndbi[p] > t.ndbi,
                    savi[p] < t.savi,
                    evi[p] < t.evi,
                    nbr[p] < t.nbr,
                ]
                .iter()
                .filter(|&&v| v)
                .count();

                let signature = ndvi[p] < s.ndvi_max && bsi[p] > s.bsi_min && ndbi[p] > s.ndbi_min;

                *out = u8::from(votes >= min_votes as usize || signature);
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(Raster::from_array(array)
        .with_transform(*indices.transform())
        .with_crs(indices.crs().clone()))
}

/// Run the cleanup sequence on a raw mask.
///
/// Opening and closing treat out-of-raster pixels as foreground for erosion;
/// the final erosion treats them as background.
pub fn clean_mask(raw: &Raster<u8>, params: &MorphologyParams) -> Result<Raster<u8>> {
    let square = StructuringElement::square;

    let mask = remove_small_objects(raw, params.min_object_size)?;
    let mask = opening(&mask, &square(params.opening_size), Border::Foreground)?;
    let mask = closing(&mask, &square(params.closing_size), Border::Foreground)?;
    let mask = remove_small_objects(&mask, params.min_object_size)?;
    let mask = dilate(&mask, &square(params.final_dilation_size))?;
    erode(&mask, &square(params.final_erosion_size), Border::Background)
}

/// Build the cleaned mining mask from index rasters
pub fn build_mining_mask(indices: &IndexRasterSet, params: &DetectionParams) -> Result<MiningMask> {
    let raw = raw_mining_mask(indices, params)?;
    let raw_pixels = raw.data().iter().filter(|&&v| v != 0).count();
    debug!(raw_pixels, "voted raw mining mask");

    let cleaned = clean_mask(&raw, &params.morphology)?;
    let mask = MiningMask::from_raster(cleaned);

    let stats = mask.statistics();
    info!(
        mining_pixels = stats.mining_pixels,
        area_ha = stats.area_ha,
        percentage = stats.percentage,
        "built mining mask"
    );
    Ok(mask)
}
