//! Binary opening (erosion followed by dilation)
//!
//! Removes specks and thin protrusions smaller than the structuring element
//! while keeping the outline of larger regions.

use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::{erode, Border};

/// Parameters for binary opening
#[derive(Debug, Clone, Default)]
pub struct OpeningParams {
    /// Structuring element shape
    pub element: StructuringElement,
    /// Out-of-raster policy for the erosion step
    pub border: Border,
}

/// Opening algorithm
#[derive(Debug, Clone, Default)]
pub struct Opening;

impl Algorithm for Opening {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = OpeningParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Opening"
    }

    fn description(&self) -> &'static str {
        "Binary opening (erosion then dilation) to remove small foreground features"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        opening(&input, &params.element, params.border)
    }
}

/// Perform binary opening: erode then dilate with the same element.
pub fn opening(mask: &Raster<u8>, element: &StructuringElement, border: Border) -> Result<Raster<u8>> {
    let eroded = erode(mask, element, border)?;
    dilate(&eroded, element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minewatch_core::GeoTransform;

    fn make_mask(rows: usize, cols: usize, set: &[(usize, usize)]) -> Raster<u8> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for &(row, col) in set {
            r.set(row, col, 1).unwrap();
        }
        r
    }

    #[test]
    fn test_opening_removes_speck() {
        let mut set: Vec<_> = (2..7).flat_map(|r| (2..7).map(move |c| (r, c))).collect();
        set.push((0, 9));
        let mask = make_mask(10, 10, &set);

        let result = opening(&mask, &StructuringElement::square(3), Border::Foreground).unwrap();
        assert_eq!(result.get(0, 9).unwrap(), 0, "isolated pixel should be removed");
        assert_eq!(
            result.data().iter().filter(|&&v| v == 1).count(),
            25,
            "5x5 block should survive opening unchanged"
        );
    }

    #[test]
    fn test_opening_removes_thin_line() {
        let set: Vec<_> = (0..10).map(|c| (4, c)).collect();
        let mask = make_mask(9, 10, &set);
        let result = opening(&mask, &StructuringElement::square(3), Border::Foreground).unwrap();
        assert!(result.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_opening_full_mask_with_foreground_border() {
        let set: Vec<_> = (0..4).flat_map(|r| (0..4).map(move |c| (r, c))).collect();
        let mask = make_mask(4, 4, &set);
        let result = Opening.execute_default(mask).unwrap();
        assert!(result.data().iter().all(|&v| v == 1));
    }
}
