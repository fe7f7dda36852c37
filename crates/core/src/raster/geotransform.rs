//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// In the six-coefficient affine notation `(a, b, c, d, e, f)` used by most
/// raster libraries, `a = pixel_width`, `b = row_rotation`, `c = origin_x`,
/// `d = col_rotation`, `e = pixel_height` and `f = origin_y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from affine coefficients `[a, b, c, d, e, f]`
    pub fn from_affine(coeffs: [f64; 6]) -> Self {
        Self {
            pixel_width: coeffs[0],
            row_rotation: coeffs[1],
            origin_x: coeffs[2],
            col_rotation: coeffs[3],
            pixel_height: coeffs[4],
            origin_y: coeffs[5],
        }
    }

    /// Ground area covered by one pixel, `|a * e|`, in squared CRS units
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Convert a fractional pixel-grid position to map coordinates.
    ///
    /// Integer positions are pixel corners: `(0.0, 0.0)` is the upper-left
    /// corner of the raster.
    pub fn corner_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Whether the transform can be inverted
    pub fn is_invertible(&self) -> bool {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        det.is_finite() && det.abs() >= 1e-15
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_corner_to_geo() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        assert_eq!(gt.corner_to_geo(0.0, 0.0), (100.0, 200.0));
        let (x, y) = gt.corner_to_geo(5.5, 10.5);
        assert_relative_eq!(x, 155.0, epsilon = 1e-10);
        assert_relative_eq!(y, 95.0, epsilon = 1e-10);
    }

    #[test]
    fn test_affine_order() {
        let gt = GeoTransform::from_affine([10.0, 0.0, 500_000.0, 0.0, -10.0, 2_000_000.0]);
        assert_eq!(gt, GeoTransform::new(500_000.0, 2_000_000.0, 10.0, -10.0));
        assert_relative_eq!(gt.pixel_area(), 100.0);
    }

    #[test]
    fn test_pixel_area_ignores_sign() {
        let gt = GeoTransform::new(85.0, 22.0, 0.0001, -0.0001);
        assert_relative_eq!(gt.pixel_area(), 1e-8, epsilon = 1e-20);
    }

    #[test]
    fn test_degenerate_transform() {
        assert!(!GeoTransform::new(0.0, 0.0, 0.0, -10.0).is_invertible());
        assert!(!GeoTransform::new(0.0, 0.0, f64::NAN, -10.0).is_invertible());
        assert!(GeoTransform::default().is_invertible());
    }
}
