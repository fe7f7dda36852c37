//! Binary closing (dilation followed by erosion)
//!
//! Fills holes and gaps narrower than the structuring element and joins
//! nearby regions.

use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::{erode, Border};

/// Parameters for binary closing
#[derive(Debug, Clone, Default)]
pub struct ClosingParams {
    /// Structuring element shape
    pub element: StructuringElement,
    /// Out-of-raster policy for the erosion step
    pub border: Border,
}

/// Closing algorithm
#[derive(Debug, Clone, Default)]
pub struct Closing;

impl Algorithm for Closing {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ClosingParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Closing"
    }

    fn description(&self) -> &'static str {
        "Binary closing (dilation then erosion) to fill small gaps"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        closing(&input, &params.element, params.border)
    }
}

/// Perform binary closing: dilate then erode with the same element.
pub fn closing(mask: &Raster<u8>, element: &StructuringElement, border: Border) -> Result<Raster<u8>> {
    let dilated = dilate(mask, element)?;
    erode(&dilated, element, border)
}
