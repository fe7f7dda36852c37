//! Structuring element definitions for binary morphology
//!
//! A structuring element defines the neighborhood used in erosion and
//! dilation. Rectangular elements anchor at `(rows / 2, cols / 2)`, so an
//! even-sized element reaches one cell further up/left than down/right.

use minewatch_core::{Error, Result};

/// Filled rectangular neighborhood
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    pub rows: usize,
    pub cols: usize,
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::square(3)
    }
}

impl StructuringElement {
    /// Filled `size x size` square
    pub fn square(size: usize) -> Self {
        StructuringElement {
            rows: size,
            cols: size,
        }
    }

    /// Validate the structuring element, returning an error for empty shapes
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidParameter {
                name: "element",
                value: format!("{}x{}", self.rows, self.cols),
                reason: "structuring element must be at least 1x1".to_string(),
            });
        }
        Ok(())
    }

    /// (dr, dc) offsets of every cell relative to the anchor
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let ar = (self.rows / 2) as isize;
        let ac = (self.cols / 2) as isize;
        (0..self.rows as isize)
            .flat_map(|r| (0..self.cols as isize).map(move |c| (r - ar, c - ac)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_offsets() {
        let offsets = StructuringElement::square(3).offsets();
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&(0, 0)));
        assert!(offsets.contains(&(-1, -1)));
        assert!(offsets.contains(&(1, 1)));
    }

    #[test]
    fn test_even_square_anchor() {
        // 2x2 anchored at index 1: covers the cell, its left, upper and upper-left neighbors
        let mut offsets = StructuringElement::square(2).offsets();
        offsets.sort();
        assert_eq!(offsets, vec![(-1, -1), (-1, 0), (0, -1), (0, 0)]);
    }

    #[test]
    fn test_five_square_reach() {
        let offsets = StructuringElement::square(5).offsets();
        assert_eq!(offsets.len(), 25);
        assert!(offsets.contains(&(-2, 2)));
        assert!(!offsets.contains(&(3, 0)));
    }

    #[test]
    fn test_validate() {
        assert!(StructuringElement::square(0).validate().is_err());
        assert!(StructuringElement { rows: 3, cols: 0 }.validate().is_err());
        assert!(StructuringElement::default().validate().is_ok());
    }
}
