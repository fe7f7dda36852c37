//! Georeferenced raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A single-band grid placed on the ground by a [`GeoTransform`] and a CRS.
///
/// Reflectance bands and index layers are `Raster<f32>`; mining masks are
/// `Raster<u8>` holding 0 or 1.
///
/// ```ignore
/// use minewatch_core::{GeoTransform, Raster, CRS};
///
/// let mask: Raster<u8> = Raster::new(100, 100)
///     .with_transform(GeoTransform::new(500_000.0, 2_000_000.0, 10.0, -10.0))
///     .with_crs(CRS::from_epsg(32644));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values indexed (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled grid with an identity-like transform and no CRS
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Wrap row-major samples as decoded from a file
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// New grid of another element type on the same georeferencing.
    ///
    /// Nodata is not carried over.
    pub fn with_same_meta<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        let (er, ec) = self.shape();
        let (ar, ac) = data.dim();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        })
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Cells

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        let (rows, cols) = self.shape();
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })
    }

    /// Overwrite the value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Georeferencing

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        let raster = Raster::from_vec(vec![1u8, 0, 0, 1, 1, 0], 2, 3).unwrap();
        assert_eq!(raster.shape(), (2, 3));
        assert_eq!(raster.get(1, 0).unwrap(), 1);
        assert!(Raster::from_vec(vec![0u8; 5], 2, 3).is_err());
    }

    #[test]
    fn test_cell_access_bounds() {
        let mut raster: Raster<u8> = Raster::new(10, 10);
        raster.set(5, 5, 1).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 1);
        assert!(raster.set(10, 0, 1).is_err());
        assert!(raster.get(0, 10).is_err());
    }

    #[test]
    fn test_same_meta_keeps_georeferencing() {
        let transform = GeoTransform::new(500_000.0, 2_000_000.0, 10.0, -10.0);
        let mut raster: Raster<f32> = Raster::new(4, 4)
            .with_transform(transform)
            .with_crs(CRS::from_epsg(32644));
        raster.set_nodata(Some(-9999.0));

        let mask = raster.with_same_meta(Array2::<u8>::zeros((4, 4))).unwrap();
        assert_eq!(mask.crs(), Some(&CRS::from_epsg(32644)));
        assert_eq!(*mask.transform(), transform);
        assert_eq!(mask.nodata(), None);
        assert!(raster.with_same_meta(Array2::<u8>::zeros((3, 4))).is_err());
    }
}
