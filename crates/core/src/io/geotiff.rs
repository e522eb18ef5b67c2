//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing is read from the ModelPixelScale and
//! ModelTiepoint tags, the EPSG code from the GeoKey directory and the
//! no-data value from the GDAL_NODATA tag. Rotated grids are not supported.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray32Float;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Grid and CRS of a GeoTIFF, read without decoding pixels
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffHeader {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl GeoTiffHeader {
    /// Bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }
}

/// Read the dimensions and georeferencing tags of a GeoTIFF file
pub fn read_geotiff_header<P: AsRef<Path>>(path: P) -> Result<GeoTiffHeader> {
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    Ok(GeoTiffHeader {
        rows: height as usize,
        cols: width as usize,
        transform: read_geotransform(&mut decoder).unwrap_or_default(),
        crs: read_epsg(&mut decoder).map(CRS::from_epsg),
    })
}

/// Read the first band of a GeoTIFF file as `f64`
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<Raster<f64>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<R>(reader: R) -> Result<Raster<f64>>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // Multi-sample images interleave samples; keep the first
    let samples = data.len() / (rows * cols).max(1);
    let data: Vec<f64> = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));

    let nodata = decoder
        .get_tag_ascii_string(tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());
    raster.set_nodata(Some(nodata.unwrap_or(f64::NAN)));

    Ok(raster)
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory, projected CS preferred
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    let entries: Vec<&[u16]> = keys.get(4..)?.chunks_exact(4).collect();

    // Only keys stored inline (location 0) carry their value directly
    let lookup = |key: u16| {
        entries
            .iter()
            .find(|e| e[0] == key && e[1] == 0)
            .map(|e| u32::from(e[3]))
            .filter(|&code| code != 0 && code != 32767)
    };
    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}

/// Write a raster to a single-band 32-bit float GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file))
}

/// Write a raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    // No-data cells become NaN in the float output
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;
    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image.encoder().write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;

    // GeoKey directory: model type, raster-is-area, and the EPSG code when known
    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 2, // version 1.1.0, 2 keys (patched below)
        1024, 0, 1, 1, // GTModelTypeGeoKey = projected
        1025, 0, 1, 1, // GTRasterTypeGeoKey = pixel is area
    ];
    let crs = raster.crs();
    if let Some(code) = crs.and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok()) {
        if crs.is_some_and(CRS::is_geographic) {
            geokeys[7] = 2; // geographic model
            geokeys.extend_from_slice(&[GEOGRAPHIC_TYPE_KEY, 0, 1, code]);
        } else {
            geokeys.extend_from_slice(&[PROJECTED_CS_TYPE_KEY, 0, 1, code]);
        }
        geokeys[3] = 3;
    }
    image.encoder().write_tag(tag(GEO_KEY_DIRECTORY), &geokeys[..])?;

    image.write_data(&data)?;
    Ok(())
}
