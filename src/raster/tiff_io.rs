//! GeoTIFF backend built on the `tiff` crate.
//!
//! Input may be any single-band strip or tile organised TIFF with integer or
//! floating point samples. Output is always a 64-bit float, one row per strip,
//! so rows can be appended as they are produced.

use crate::error::{RasterError, Result};
use crate::raster::{
    check_row_len, Compression, GeoReference, OutputOptions, RasterMetadata, RasterReader,
    RasterWriter,
};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{ChunkType, Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKindStandard};
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Rows of the chunk band currently decoded
#[derive(Debug, Default)]
struct Band {
    index: Option<usize>,
    first_row: usize,
    cells: Vec<f64>,
}

pub struct TiffRasterReader<R: Read + Seek> {
    decoder: Decoder<R>,
    metadata: RasterMetadata,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    band: Band,
}

impl TiffRasterReader<BufReader<File>> {
    pub fn open(path: &Path, nodata_override: Option<f64>) -> Result<Self> {
        info!("Opening input raster: {}", path.display());
        let file = File::open(path)?;
        Self::new(BufReader::new(file), nodata_override)
    }
}

impl<R: Read + Seek> TiffRasterReader<R> {
    pub fn new(reader: R, nodata_override: Option<f64>) -> Result<Self> {
        let mut decoder = Decoder::new(reader)?;

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions(width, height));
        }

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(RasterError::UnsupportedFormat(format!(
                    "{:?} (only single-band rasters are supported)",
                    other
                )))
            }
        }

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (chunk_width as usize, chunk_height as usize);
        if chunk_width == 0 || chunk_height == 0 {
            return Err(RasterError::UnsupportedFormat(format!(
                "invalid chunk size {}x{}",
                chunk_width, chunk_height
            )));
        }

        let chunks_across = match decoder.get_chunk_type() {
            ChunkType::Strip => 1,
            ChunkType::Tile => width.div_ceil(chunk_width),
        };

        let geo = read_geo_reference(&mut decoder)?;
        let nodata = match nodata_override {
            Some(value) => Some(value),
            None => read_gdal_nodata(&mut decoder)?,
        };

        debug!("Raster dimensions: {}x{}", width, height);
        debug!(
            "Chunk size: {}x{} ({} across)",
            chunk_width, chunk_height, chunks_across
        );

        Ok(Self {
            decoder,
            metadata: RasterMetadata {
                width,
                height,
                geo,
                nodata,
            },
            chunk_width,
            chunk_height,
            chunks_across,
            band: Band::default(),
        })
    }

    /// Decode every chunk that intersects band `band_index` into `self.band`
    fn load_band(&mut self, band_index: usize) -> Result<()> {
        let width = self.metadata.width;
        let first_row = band_index * self.chunk_height;
        let rows = self.chunk_height.min(self.metadata.height - first_row);

        self.band.index = None;
        self.band.first_row = first_row;
        self.band.cells.clear();
        self.band.cells.resize(rows * width, f64::NAN);

        for tx in 0..self.chunks_across {
            let chunk_index = (band_index * self.chunks_across + tx) as u32;
            let (data_width, data_height) = self.decoder.chunk_data_dimensions(chunk_index);
            let (data_width, data_height) = (data_width as usize, data_height as usize);

            let samples = samples_to_f64(self.decoder.read_chunk(chunk_index)?)?;

            // Edge chunks may come back cropped or padded to the full chunk width
            let stride = if samples.len() == data_width * data_height {
                data_width
            } else {
                self.chunk_width
            };

            let x0 = tx * self.chunk_width;
            let n = data_width.min(width - x0);
            for r in 0..data_height.min(rows) {
                let src = samples.get(r * stride..r * stride + n).ok_or_else(|| {
                    RasterError::UnsupportedFormat(format!(
                        "chunk {} is shorter than its declared size",
                        chunk_index
                    ))
                })?;
                let dst = r * width + x0;
                self.band.cells[dst..dst + n].copy_from_slice(src);
            }
        }

        self.band.index = Some(band_index);
        Ok(())
    }
}

impl<R: Read + Seek> RasterReader for TiffRasterReader<R> {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        if row >= self.metadata.height {
            return Err(RasterError::RowOutOfRange {
                row,
                rows: self.metadata.height,
            });
        }
        let width = self.metadata.width;
        check_row_len(width, buf.len())?;

        let band_index = row / self.chunk_height;
        if self.band.index != Some(band_index) {
            self.load_band(band_index)?;
        }

        let offset = (row - self.band.first_row) * width;
        let nodata = self.metadata.nodata;
        for (dst, &src) in buf.iter_mut().zip(&self.band.cells[offset..offset + width]) {
            *dst = match nodata {
                Some(nd) if src == nd => f64::NAN,
                _ => src,
            };
        }
        Ok(())
    }
}

fn samples_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let values = match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(RasterError::UnsupportedFormat(
                "unsupported sample type".to_string(),
            ))
        }
    };
    Ok(values)
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> Result<Option<Vec<f64>>> {
    Ok(decoder
        .find_tag(tag(code))?
        .map(|v| v.into_f64_vec())
        .transpose()?)
}

fn find_string<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> Result<Option<String>> {
    Ok(decoder
        .find_tag(tag(code))?
        .map(|v| v.into_string())
        .transpose()?
        .map(|s| s.trim_end_matches('\0').trim().to_string()))
}

/// Rebuild an affine transform from ModelTransformation or PixelScale + TiePoint
fn read_geo_reference<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoReference>> {
    let transformation = find_f64_vec(decoder, MODEL_TRANSFORMATION)?;
    let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE)?;
    let tiepoint = find_f64_vec(decoder, MODEL_TIEPOINT)?;

    let geo_transform = match (transformation, scale, tiepoint) {
        (Some(m), _, _) if m.len() >= 8 => [m[3], m[0], m[1], m[7], m[4], m[5]],
        (_, Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => [
            t[3] - t[0] * s[0],
            s[0],
            0.0,
            t[4] + t[1] * s[1],
            0.0,
            -s[1],
        ],
        _ => {
            debug!("No georeferencing tags found");
            return Ok(None);
        }
    };

    let geo_keys = decoder
        .find_tag(tag(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u16_vec())
        .transpose()?;

    Ok(Some(GeoReference {
        geo_transform,
        projection: None,
        geo_keys,
        geo_doubles: find_f64_vec(decoder, GEO_DOUBLE_PARAMS)?,
        geo_ascii: find_string(decoder, GEO_ASCII_PARAMS)?,
    }))
}

fn read_gdal_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(text) = find_string(decoder, GDAL_NODATA)? else {
        return Ok(None);
    };

    match text.parse::<f64>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            warn!("Ignoring unparsable GDAL_NODATA value '{}'", text);
            Ok(None)
        }
    }
}

fn tiff_compression(compression: Compression) -> tiff::encoder::Compression {
    match compression {
        Compression::None => tiff::encoder::Compression::Uncompressed,
        Compression::Lzw => tiff::encoder::Compression::Lzw,
        Compression::Deflate => tiff::encoder::Compression::Deflate(DeflateLevel::Balanced),
    }
}

pub struct TiffRasterWriter<'a, W: Write + Seek> {
    image: ImageEncoder<'a, W, Gray64Float, TiffKindStandard>,
    metadata: RasterMetadata,
    rows_written: usize,
}

impl<W: Write + Seek> RasterWriter for TiffRasterWriter<'_, W> {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn write_row(&mut self, row: &[f64]) -> Result<()> {
        if self.rows_written == self.metadata.height {
            return Err(RasterError::OutputComplete(self.metadata.height));
        }
        check_row_len(self.metadata.width, row.len())?;

        self.image.write_strip(row)?;
        self.rows_written += 1;
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.rows_written
    }
}

/// Encode a raster into `sink`, letting `f` supply the rows.
pub fn encode<W, T, F>(sink: W, metadata: &RasterMetadata, options: &OutputOptions, f: F) -> Result<T>
where
    W: Write + Seek,
    F: FnOnce(&mut dyn RasterWriter) -> Result<T>,
{
    let (width, height) = (metadata.width, metadata.height);
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions(width, height));
    }

    let mut encoder =
        TiffEncoder::new(sink)?.with_compression(tiff_compression(options.compression));
    let too_large = || RasterError::InvalidDimensions(width, height);
    let mut image = encoder.new_image::<Gray64Float>(
        u32::try_from(width).map_err(|_| too_large())?,
        u32::try_from(height).map_err(|_| too_large())?,
    )?;
    image.rows_per_strip(1)?;

    if let Some(geo) = &metadata.geo {
        let gt = geo.geo_transform;
        let dir = image.encoder();

        if geo.is_north_up() {
            dir.write_tag(tag(MODEL_PIXEL_SCALE), &[gt[1], -gt[5], 0.0][..])?;
            dir.write_tag(tag(MODEL_TIEPOINT), &[0.0, 0.0, 0.0, gt[0], gt[3], 0.0][..])?;
        } else {
            let matrix = [
                gt[1], gt[2], 0.0, gt[0], //
                gt[4], gt[5], 0.0, gt[3], //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(tag(MODEL_TRANSFORMATION), &matrix[..])?;
        }

        if let Some(keys) = &geo.geo_keys {
            dir.write_tag(tag(GEO_KEY_DIRECTORY), &keys[..])?;
        }
        if let Some(doubles) = &geo.geo_doubles {
            dir.write_tag(tag(GEO_DOUBLE_PARAMS), &doubles[..])?;
        }
        if let Some(ascii) = &geo.geo_ascii {
            dir.write_tag(tag(GEO_ASCII_PARAMS), ascii.as_str())?;
        }
    }
    image.encoder().write_tag(tag(GDAL_NODATA), "nan")?;

    let mut writer = TiffRasterWriter {
        image,
        metadata: metadata.clone(),
        rows_written: 0,
    };

    let value = f(&mut writer)?;

    if writer.rows_written != height {
        return Err(RasterError::OutputIncomplete {
            written: writer.rows_written,
            expected: height,
        });
    }
    writer.image.finish()?;

    Ok(value)
}

/// Create a GeoTIFF at `path` and fill it through `f`
pub fn write_raster<T, F>(
    path: &Path,
    metadata: &RasterMetadata,
    options: &OutputOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn RasterWriter) -> Result<T>,
{
    info!("Creating output raster: {}", path.display());
    debug!(
        "Output: {}x{} float64, compression {}",
        metadata.width,
        metadata.height,
        options.compression.gdal_name()
    );

    let mut file = BufWriter::new(File::create(path)?);
    let value = encode(&mut file, metadata, options, f)?;

    file.flush()?;
    file.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    Ok(value)
}
