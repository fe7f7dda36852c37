//! Native GeoTIFF reading/writing built on the `tiff` crate.
//!
//! Supports strip/tile layouts handled by `tiff`, chunky or planar multi-sample
//! images, the ModelPixelScale/ModelTiepoint/ModelTransformation tags, the EPSG
//! code from the GeoKey directory and the GDAL nodata tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read one sample (band) of a GeoTIFF file into a Raster.
///
/// `band` is zero-based and defaults to the first sample.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let mut bands = read_geotiff_bands(path)?;
    select_band(&mut bands, band.unwrap_or(0))
}

/// Read every sample of a GeoTIFF file, one Raster per sample, in file order.
pub fn read_geotiff_bands<T, P>(path: P) -> Result<Vec<Raster<T>>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read one sample of a GeoTIFF held in memory.
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    let mut bands = decode_geotiff(Cursor::new(data))?;
    select_band(&mut bands, band.unwrap_or(0))
}

fn select_band<T: RasterElement>(bands: &mut Vec<Raster<T>>, band: usize) -> Result<Raster<T>> {
    if band >= bands.len() {
        return Err(Error::InvalidRaster(format!(
            "band {} requested from a file with {} band(s)",
            band,
            bands.len()
        )));
    }
    Ok(bands.swap_remove(band))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Vec<Raster<T>>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1).max(1) as usize;
    let planar = decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1) == 2;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let cells = rows * cols;
    if data.len() != cells * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let transform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let nodata: Option<T> = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
        .and_then(num_traits::cast);

    (0..samples)
        .map(|s| {
            let band: Vec<T> = if planar {
                data[s * cells..(s + 1) * cells].to_vec()
            } else {
                data.iter().skip(s).step_by(samples).copied().collect()
            };
            let mut raster = Raster::from_vec(band, rows, cols)?;
            raster.set_transform(transform);
            raster.set_crs(crs.clone());
            raster.set_nodata(nodata);
            Ok(raster)
        })
        .collect()
}

/// Read the GeoTransform from the model tags.
///
/// A file without them is rejected; pixel units would make every area wrong.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            // Row-major 4x4 matrix: x = m0*col + m1*row + m3, y = m4*col + m5*row + m7
            return Ok(GeoTransform::from_affine([m[0], m[1], m[3], m[4], m[5], m[7]]));
        }
    }

    let missing = |what: &str| Error::InvalidRaster(format!("no georeferencing: {what} tag missing"));
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| missing("ModelPixelScale"))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| missing("ModelTiepoint"))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::InvalidRaster(
        "no georeferencing: malformed pixel scale or tiepoint".into(),
    ))
}

/// EPSG code from the GeoKey directory, projected key first
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;
    let lookup = |wanted: u16| {
        keys.get(4..)?
            .chunks_exact(4)
            .find(|entry| entry[0] == wanted && entry[1] == 0)
            .map(|entry| entry[3] as u32)
    };

    lookup(PROJECTED_CS_TYPE_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
        .filter(|&code| code != 0 && code != 32767)
        .map(CRS::from_epsg)
}

/// Write a single-band Raster as a 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

/// Write a single-band Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    if let Some(nodata) = raster.nodata().and_then(|v| num_traits::cast::<T, f64>(v)) {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.to_string().as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, GT_RASTER_TYPE_KEY, 0, 1, 1];
    match raster.crs().and_then(|c| c.epsg()) {
        Some(code) if code <= u16::MAX as u32 => {
            let (model, key) = if code == 4326 {
                (2, GEOGRAPHIC_TYPE_KEY)
            } else {
                (1, PROJECTED_CS_TYPE_KEY)
            };
            geokeys[3] = 3;
            geokeys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, model, key, 0, 1, code as u16]);
        }
        _ => {
            geokeys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, 1]);
        }
    }
    // Keys must be sorted by id
    let mut entries: Vec<[u16; 4]> = geokeys[4..]
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    entries.sort_by_key(|e| e[0]);
    let geokeys: Vec<u16> = geokeys[..4]
        .iter()
        .copied()
        .chain(entries.into_iter().flatten())
        .collect();
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_raster() -> Raster<f32> {
        let data: Vec<f32> = (0..12).map(|v| v as f32 * 0.05).collect();
        Raster::from_vec(data, 3, 4)
            .unwrap()
            .with_transform(GeoTransform::new(500_000.0, 2_000_000.0, 10.0, -10.0))
            .with_crs(CRS::from_epsg(32644))
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let raster = sample_raster();
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes, None).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert_relative_eq!(back.get(2, 3).unwrap(), 0.55, epsilon = 1e-6);
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs(), Some(&CRS::from_epsg(32644)));
    }

    #[test]
    fn test_file_roundtrip_geographic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.tif");
        let raster = sample_raster()
            .with_transform(GeoTransform::new(85.0, 23.0, 0.0001, -0.0001))
            .with_crs(CRS::wgs84());
        write_geotiff(&raster, &path).unwrap();

        let bands: Vec<Raster<f32>> = read_geotiff_bands(&path).unwrap();
        assert_eq!(bands.len(), 1);
        assert!(bands[0].crs().is_some_and(|c| c.is_geographic()));
    }

    #[test]
    fn test_nodata_roundtrip() {
        let mut raster = sample_raster();
        raster.set_nodata(Some(-9999.0));
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes, None).unwrap();
        assert_eq!(back.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_tiff_without_georeferencing_rejected() {
        let mut bytes = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut bytes)).unwrap();
            encoder.write_image::<Gray32Float>(2, 2, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        }
        let err = read_geotiff_from_buffer::<f32>(&bytes, None).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));
    }

    #[test]
    fn test_missing_band() {
        let bytes = write_geotiff_to_buffer(&sample_raster()).unwrap();
        let err = read_geotiff_from_buffer::<f32>(&bytes, Some(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));
    }
}
