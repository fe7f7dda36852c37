//! Binary dilation
//!
//! A pixel becomes set if any set pixel reaches it through the structuring
//! element. Pixels outside the raster are always treated as unset.

use crate::maybe_rayon::*;
use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};

use super::element::StructuringElement;
use super::erode::build_output;

/// Parameters for binary dilation
#[derive(Debug, Clone, Default)]
pub struct DilateParams {
    /// Structuring element shape
    pub element: StructuringElement,
}

/// Dilation algorithm
#[derive(Debug, Clone, Default)]
pub struct Dilate;

impl Algorithm for Dilate {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = DilateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Dilate"
    }

    fn description(&self) -> &'static str {
        "Binary dilation over a structuring element"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        dilate(&input, &params.element)
    }
}

/// Perform binary dilation on a mask (non-zero = set).
///
/// Uses the reflected element, `out(p) = OR in(p - b)`, so that
/// opening and closing stay dual for asymmetric (even-sized) elements.
pub fn dilate(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;

    let (rows, cols) = mask.shape();
    let offsets = element.offsets();
    let data = mask.data();

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let any_set = offsets.iter().any(|&(dr, dc)| {
                    let r = row as isize - dr;
                    let c = col as isize - dc;
                    r >= 0
                        && c >= 0
                        && r < rows as isize
                        && c < cols as isize
                        && data[(r as usize, c as usize)] != 0
                });
                *out = u8::from(any_set);
            }
            row_data
        })
        .collect();

    build_output(mask, rows, cols, output)
}
