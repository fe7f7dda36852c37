//! Six-band surface reflectance input

use minewatch_core::raster::{GeoTransform, Raster, RasterElement};
use minewatch_core::{Error, Result, CRS};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reflectance bands consumed by the index calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl Band {
    /// All bands in file order (B2, B3, B4, B8, B11, B12 for Sentinel-2)
    pub const ALL: [Band; 6] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
    ];

    /// Sentinel-2 MSI band name
    pub fn sentinel2_name(&self) -> &'static str {
        match self {
            Band::Blue => "B2",
            Band::Green => "B3",
            Band::Red => "B4",
            Band::Nir => "B8",
            Band::Swir1 => "B11",
            Band::Swir2 => "B12",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Swir1 => "swir1",
            Band::Swir2 => "swir2",
        };
        f.write_str(name)
    }
}

/// A co-registered six-band reflectance raster.
///
/// All bands share one shape, transform and CRS; this is checked on
/// construction so downstream stages never see mismatched bands.
#[derive(Debug, Clone)]
pub struct ReflectanceRaster {
    bands: [Array2<f32>; 6],
    transform: GeoTransform,
    crs: CRS,
    nodata: Option<f32>,
}

impl ReflectanceRaster {
    /// Build from arrays in [`Band::ALL`] order.
    pub fn new(
        bands: [Array2<f32>; 6],
        transform: GeoTransform,
        crs: CRS,
        nodata: Option<f32>,
    ) -> Result<Self> {
        let shape = bands[0].dim();
        for (band, data) in Band::ALL.iter().zip(bands.iter()) {
            if data.dim() != shape {
                return Err(Error::InvalidRaster(format!(
                    "band {} has shape {:?}, expected {:?}",
                    band,
                    data.dim(),
                    shape
                )));
            }
        }
        if !transform.is_invertible() {
            return Err(Error::InvalidRaster(
                "geotransform has zero pixel size".to_string(),
            ));
        }

        Ok(Self {
            bands,
            transform,
            crs,
            nodata,
        })
    }

    /// Build from single-band rasters in [`Band::ALL`] order.
    ///
    /// Georeferencing and nodata come from the first band. A missing CRS is
    /// an error unless `crs` supplies one.
    pub fn from_rasters(rasters: Vec<Raster<f32>>, crs: Option<CRS>) -> Result<Self> {
        if rasters.len() != Band::ALL.len() {
            return Err(Error::InvalidRaster(format!(
                "expected {} bands, got {}",
                Band::ALL.len(),
                rasters.len()
            )));
        }

        let transform = *rasters[0].transform();
        let nodata = rasters[0].nodata();
        let crs = crs
            .or_else(|| rasters[0].crs().cloned())
            .ok_or_else(|| Error::InvalidRaster("input raster has no CRS".to_string()))?;

        let mut arrays = rasters.into_iter().map(Raster::into_array);
        let mut next = || arrays.next().unwrap_or_else(|| Array2::zeros((0, 0)));
        let bands = [next(), next(), next(), next(), next(), next()];

        Self::new(bands, transform, crs, nodata)
    }

    /// Band data
    pub fn band(&self, band: Band) -> &Array2<f32> {
        &self.bands[band.index()]
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Pixels where every band holds a finite, non-nodata value
    pub fn validity(&self) -> Array2<bool> {
        let nodata = self.nodata;
        let ok = |v: f32| v.is_finite() && !v.is_nodata(nodata);

        let mut valid = Array2::from_elem(self.shape(), true);
        for band in &self.bands {
            Zip::from(&mut valid).and(band).for_each(|flag, &v| {
                *flag = *flag && ok(v);
            });
        }
        valid
    }

    /// An empty single-band raster carrying this raster's georeferencing
    pub fn template<T: RasterElement>(&self, data: Array2<T>) -> Result<Raster<T>> {
        let (rows, cols) = self.shape();
        if data.dim() != (rows, cols) {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar,
                ac,
            });
        }
        Ok(Raster::from_array(data)
            .with_transform(self.transform)
            .with_crs(self.crs.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands(rows: usize, cols: usize) -> [Array2<f32>; 6] {
        [
            Array2::from_elem((rows, cols), 0.05),
            Array2::from_elem((rows, cols), 0.08),
            Array2::from_elem((rows, cols), 0.10),
            Array2::from_elem((rows, cols), 0.30),
            Array2::from_elem((rows, cols), 0.20),
            Array2::from_elem((rows, cols), 0.15),
        ]
    }

    #[test]
    fn test_shape_mismatch_is_invalid_raster() {
        let mut b = bands(4, 4);
        b[4] = Array2::zeros((4, 5));
        let err = ReflectanceRaster::new(b, GeoTransform::default(), CRS::wgs84(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(ref m) if m.contains("swir1")));
    }

    #[test]
    fn test_band_count_checked() {
        let rasters = vec![Raster::<f32>::new(2, 2); 5];
        let err = ReflectanceRaster::from_rasters(rasters, Some(CRS::wgs84())).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));
    }

    #[test]
    fn test_missing_crs() {
        let rasters = vec![Raster::<f32>::new(2, 2); 6];
        assert!(ReflectanceRaster::from_rasters(rasters.clone(), None).is_err());
        let ok = ReflectanceRaster::from_rasters(rasters, Some(CRS::from_epsg(32644))).unwrap();
        assert_eq!(ok.crs(), &CRS::from_epsg(32644));
    }

    #[test]
    fn test_validity_mask() {
        let mut b = bands(3, 3);
        b[0][(0, 0)] = f32::NAN;
        b[3][(1, 1)] = -9999.0;
        let raster =
            ReflectanceRaster::new(b, GeoTransform::default(), CRS::wgs84(), Some(-9999.0))
                .unwrap();
        let valid = raster.validity();
        assert!(!valid[(0, 0)]);
        assert!(!valid[(1, 1)]);
        assert_eq!(valid.iter().filter(|&&v| v).count(), 7);
    }

    #[test]
    fn test_sentinel_names() {
        let names: Vec<_> = Band::ALL.iter().map(|b| b.sentinel2_name()).collect();
        assert_eq!(names, ["B2", "B3", "B4", "B8", "B11", "B12"]);
    }
}
