//! Binary erosion
//!
//! A pixel stays set only if every pixel under the structuring element is
//! set. Shrinks foreground regions and removes features thinner than the
//! element.

use crate::maybe_rayon::*;
use minewatch_core::raster::Raster;
use minewatch_core::{Algorithm, Error, Result};
use ndarray::Array2;

use super::element::StructuringElement;

/// How pixels outside the raster are treated during erosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Border {
    /// Outside pixels count as set, so regions touching the edge are not eaten
    #[default]
    Foreground,
    /// Outside pixels count as unset
    Background,
}

/// Parameters for binary erosion
#[derive(Debug, Clone, Default)]
pub struct ErodeParams {
    /// Structuring element shape
    pub element: StructuringElement,
    /// Out-of-raster policy
    pub border: Border,
}

/// Erosion algorithm
#[derive(Debug, Clone, Default)]
pub struct Erode;

impl Algorithm for Erode {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ErodeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Erode"
    }

    fn description(&self) -> &'static str {
        "Binary erosion over a structuring element"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        erode(&input, &params.element, params.border)
    }
}

/// Perform binary erosion on a mask (non-zero = set).
///
/// Output cells are 1 or 0.
///
/// # Arguments
/// * `mask` - Input mask
/// * `element` - Structuring element
/// * `border` - Value assumed for pixels outside the raster
pub fn erode(mask: &Raster<u8>, element: &StructuringElement, border: Border) -> Result<Raster<u8>> {
    element.validate()?;

    let (rows, cols) = mask.shape();
    let offsets = element.offsets();
    let data = mask.data();
    let outside = border == Border::Foreground;

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let all_set = offsets.iter().all(|&(dr, dc)| {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        outside
                    } else {
                        data[(r as usize, c as usize)] != 0
                    }
                });
                *out = u8::from(all_set);
            }
            row_data
        })
        .collect();

    build_output(mask, rows, cols, output)
}

pub(super) fn build_output(
    template: &Raster<u8>,
    rows: usize,
    cols: usize,
    data: Vec<u8>,
) -> Result<Raster<u8>> {
    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    template.with_same_meta(array)
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

    fn block(r0: usize, r1: usize, c0: usize, c1: usize) -> Vec<(usize, usize)> {
        (r0..r1).flat_map(|r| (c0..c1).map(move |c| (r, c))).collect()
    }

    #[test]
    fn test_erode_shrinks_block() {
        let mask = make_mask(7, 7, &block(1, 6, 1, 6));
        let result = erode(&mask, &StructuringElement::square(3), Border::Foreground).unwrap();
        let count = result.data().iter().filter(|&&v| v == 1).count();
        assert_eq!(count, 9, "5x5 block eroded by 3x3 should leave 3x3");
        assert_eq!(result.get(3, 3).unwrap(), 1);
        assert_eq!(result.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_erode_removes_single_pixel() {
        let mask = make_mask(5, 5, &[(2, 2)]);
        let result = erode(&mask, &StructuringElement::square(3), Border::Foreground).unwrap();
        assert!(result.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_border_policy() {
        let mask = make_mask(4, 4, &block(0, 4, 0, 4));

        let keep = erode(&mask, &StructuringElement::square(3), Border::Foreground).unwrap();
        assert!(keep.data().iter().all(|&v| v == 1), "full mask survives with foreground border");

        let eaten = erode(&mask, &StructuringElement::square(3), Border::Background).unwrap();
        assert_eq!(eaten.get(0, 0).unwrap(), 0);
        assert_eq!(eaten.get(1, 1).unwrap(), 1);
        assert_eq!(eaten.data().iter().filter(|&&v| v == 1).count(), 4);
    }

    #[test]
    fn test_even_element_erodes_toward_origin() {
        // 2x2 anchored at (1,1): a pixel survives only if its up/left neighbors are set
        let mask = make_mask(4, 4, &block(1, 3, 1, 3));
        let result = erode(&mask, &StructuringElement::square(2), Border::Background).unwrap();
        assert_eq!(result.get(2, 2).unwrap(), 1);
        assert_eq!(result.get(1, 1).unwrap(), 0);
        assert_eq!(result.get(1, 2).unwrap(), 0);
        assert_eq!(result.get(2, 1).unwrap(), 0);
    }

    #[test]
    fn test_keeps_georeferencing() {
        let mask = make_mask(3, 3, &[]);
        let result = Erode.execute_default(mask.clone()).unwrap();
        assert_eq!(result.transform(), mask.transform());
    }
}
