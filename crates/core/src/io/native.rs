//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing is read from the pixel-scale /
//! tie-point tags, the EPSG code from the GeoKey directory and the no-data
//! value from the GDAL_NODATA tag, which together cover Landsat Collection 2
//! band files and common DEM products.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, NODATA};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let raster = decode_geotiff(file)?;
    debug!(
        "read {} ({} x {}, crs {:?})",
        path.as_ref().display(),
        raster.cols(),
        raster.rows(),
        raster.crs().map(|c| c.identifier())
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
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

/// Decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // Multi-sample images would silently interleave bands
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

/// GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory (projected first, then geographic)
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();

    let lookup = |key: u16| {
        entries
            .iter()
            // location 0 means the value is stored inline
            .find(|e| e[0] == key && e[1] == 0)
            .map(|e| e[3] as u32)
            .filter(|code| *code != 0 && *code != 32767)
    };

    lookup(KEY_PROJECTED_CS_TYPE)
        .or_else(|| lookup(KEY_GEOGRAPHIC_TYPE))
        .map(CRS::from_epsg)
}

/// No-data value from the GDAL_NODATA ASCII tag
fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    num_traits::cast(value)
}

/// Write a Raster to a GeoTIFF file as 32-bit float.
///
/// No-data cells are written as [`NODATA`] and flagged with the GDAL_NODATA
/// tag. The file is written to a temporary sibling and renamed into place so
/// a failed write never leaves a truncated raster behind.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let tmp = path.with_extension("tif.partial");
    let written = File::create(&tmp).map_err(Error::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        encode_geotiff(raster, &mut writer)?;
        writer.flush()?;
        Ok(())
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path).map_err(Error::from)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    debug!("wrote {}", path.display());
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_valid(v) {
                num_traits::cast(v).unwrap_or(NODATA as f32)
            } else {
                NODATA as f32
            }
        })
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    // Version 1.1.0; model type 1 = projected, 2 = geographic; raster type 1 = PixelIsArea
    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, KEY_MODEL_TYPE, 0, 1, 1, KEY_RASTER_TYPE, 0, 1, 1];
    if let Some(code) = raster.crs().and_then(|c| u16::try_from(c.epsg()).ok()) {
        let geographic = code == 4326;
        if geographic {
            geokeys[7] = 2;
        }
        let key = if geographic { KEY_GEOGRAPHIC_TYPE } else { KEY_PROJECTED_CS_TYPE };
        geokeys.extend_from_slice(&[key, 0, 1, code]);
        geokeys[3] = 3;
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    let nodata_text = format!("{}", NODATA);
    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata_text.as_str())?;

    image.write_data(&data)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![1.0, 2.5, NODATA, 4.0, f64::NAN, 6.0], 2, 3).unwrap();
        r.set_transform(GeoTransform::new(300_000.0, 3_100_000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32628)));
        r.set_nodata(Some(NODATA));
        r
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let raster = sample();
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert!(back.transform().approx_eq(raster.transform()));
        assert_eq!(back.crs().map(|c| c.epsg()), Some(32628));
        assert_eq!(back.nodata(), Some(NODATA));
        assert_eq!(back.cell(0, 1), Some(2.5));
        assert_eq!(back.cell(0, 2), None);
        // NaN is written as the sentinel
        assert_eq!(back.get(1, 1).unwrap(), NODATA);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lst.tif");
        write_geotiff(&sample(), &path).unwrap();
        assert!(!dir.path().join("lst.tif.partial").exists());

        let back: Raster<f32> = read_geotiff(&path).unwrap();
        assert_eq!(back.cell(1, 2), Some(6.0));
        assert_eq!(back.nodata(), Some(NODATA as f32));
        assert!(back.transform().approx_eq(sample().transform()));
        assert_eq!(back.crs().copied(), Some(CRS::from_epsg(32628)));
    }

    #[test]
    fn test_wgs84_geokeys() {
        let mut raster = sample();
        raster.set_transform(GeoTransform::new(-16.5, 28.6, 0.001, -0.001));
        raster.set_crs(Some(CRS::wgs84()));
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(back.crs().copied(), Some(CRS::wgs84()));
        let (x, y) = back.pixel_to_geo(0, 0);
        assert!((x + 16.4995).abs() < 1e-9 && (y - 28.5995).abs() < 1e-9);
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("lst.tif");
        assert!(write_geotiff(&sample(), &path).is_err());
        assert!(!path.exists());
        assert!(!path.with_extension("tif.partial").exists());
    }
}
