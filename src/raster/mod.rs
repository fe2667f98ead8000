//! Raster access: row-oriented reader/writer traits and their backends.
//!
//! The built-in backend reads and writes GeoTIFF through the `tiff` crate.
//! With the `gdal` feature enabled, files go through GDAL instead.

#[cfg(feature = "gdal")]
pub mod gdal_io;
pub mod memory;
pub mod tiff_io;

use crate::error::{RasterError, Result};
use std::path::Path;
use std::str::FromStr;

/// Georeferencing carried from input to output.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// GDAL-style affine transform: `[x0, dx, rot_x, y0, rot_y, dy]`
    pub geo_transform: [f64; 6],
    /// Projection as WKT, when the backend exposes one
    pub projection: Option<String>,
    /// Raw GeoTIFF key directory and parameter tags
    pub geo_keys: Option<Vec<u16>>,
    pub geo_doubles: Option<Vec<f64>>,
    pub geo_ascii: Option<String>,
}

impl GeoReference {
    pub fn from_geo_transform(geo_transform: [f64; 6]) -> Self {
        Self {
            geo_transform,
            projection: None,
            geo_keys: None,
            geo_doubles: None,
            geo_ascii: None,
        }
    }

    pub fn pixel_width(&self) -> f64 {
        self.geo_transform[1].abs()
    }

    pub fn pixel_height(&self) -> f64 {
        self.geo_transform[5].abs()
    }

    pub fn is_north_up(&self) -> bool {
        self.geo_transform[2] == 0.0 && self.geo_transform[4] == 0.0
    }

    /// Georeferencing of a window whose top-left cell is `(col_off, row_off)`
    pub fn shifted(&self, col_off: usize, row_off: usize) -> Self {
        let gt = self.geo_transform;
        let (c, r) = (col_off as f64, row_off as f64);

        let mut shifted = self.clone();
        shifted.geo_transform[0] = gt[0] + c * gt[1] + r * gt[2];
        shifted.geo_transform[3] = gt[3] + c * gt[4] + r * gt[5];
        shifted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geo: Option<GeoReference>,
    /// Sentinel cell value treated as no-data. Cells equal to it read as `NaN`.
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            geo: None,
            nodata: None,
        }
    }
}

/// A raster that yields rows of `f64` cells by index.
pub trait RasterReader {
    fn metadata(&self) -> &RasterMetadata;

    /// Read row `row` into `buf`, which must hold exactly `width` cells.
    /// No-data cells come back as `NaN`.
    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()>;
}

/// A raster being written one row at a time, top to bottom.
pub trait RasterWriter {
    fn metadata(&self) -> &RasterMetadata;

    /// Append the next row. `row` must hold exactly `width` cells.
    fn write_row(&mut self, row: &[f64]) -> Result<()>;

    fn rows_written(&self) -> usize;
}

impl<R: RasterReader + ?Sized> RasterReader for Box<R> {
    fn metadata(&self) -> &RasterMetadata {
        (**self).metadata()
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        (**self).read_row(row, buf)
    }
}

/// Validate the length of a row handed to a reader or writer
pub(crate) fn check_row_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RasterError::ShapeMismatch { expected, actual });
    }
    Ok(())
}

/// Output compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    Lzw,
    #[default]
    Deflate,
}

impl Compression {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Lzw => "LZW",
            Compression::Deflate => "DEFLATE",
        }
    }
}

impl FromStr for Compression {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Compression::None),
            "LZW" => Ok(Compression::Lzw),
            "DEFLATE" => Ok(Compression::Deflate),
            _ => Err(RasterError::InvalidCompression(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub compression: Compression,
}

/// Open an existing raster for reading with the compiled-in backend
#[cfg(not(feature = "gdal"))]
pub fn open_input(path: &Path, nodata_override: Option<f64>) -> Result<Box<dyn RasterReader>> {
    Ok(Box::new(tiff_io::TiffRasterReader::open(path, nodata_override)?))
}

#[cfg(feature = "gdal")]
pub fn open_input(path: &Path, nodata_override: Option<f64>) -> Result<Box<dyn RasterReader>> {
    Ok(Box::new(gdal_io::GdalRasterReader::open(path, nodata_override)?))
}

/// Create a new single-band `f64` raster at `path`, hand its writer to `f`
/// and close the raster once `f` returns.
///
/// The raster is only finalized when `f` succeeds and every row was written.
#[cfg(not(feature = "gdal"))]
pub fn write_output<T, F>(
    path: &Path,
    metadata: &RasterMetadata,
    options: &OutputOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn RasterWriter) -> Result<T>,
{
    tiff_io::write_raster(path, metadata, options, f)
}

#[cfg(feature = "gdal")]
pub fn write_output<T, F>(
    path: &Path,
    metadata: &RasterMetadata,
    options: &OutputOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn RasterWriter) -> Result<T>,
{
    gdal_io::write_raster(path, metadata, options, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_valid() {
        assert_eq!("DEFLATE".parse::<Compression>().unwrap(), Compression::Deflate);
        assert_eq!("lzw".parse::<Compression>().unwrap(), Compression::Lzw);
        assert_eq!("None".parse::<Compression>().unwrap(), Compression::None);
    }

    #[test]
    fn test_compression_invalid() {
        assert!("jpeg".parse::<Compression>().is_err());
        assert!("ZSTD".parse::<Compression>().is_err());
        assert!("".parse::<Compression>().is_err());
    }

    #[test]
    fn test_shifted_geo_transform() {
        let geo = GeoReference::from_geo_transform([500000.0, 30.0, 0.0, 4200000.0, 0.0, -30.0]);
        let shifted = geo.shifted(10, 4);
        assert_eq!(shifted.geo_transform[0], 500300.0);
        assert_eq!(shifted.geo_transform[3], 4199880.0);
        assert_eq!(shifted.pixel_width(), 30.0);
        assert_eq!(shifted.pixel_height(), 30.0);
    }

    #[test]
    fn test_shift_by_zero_is_identity() {
        let geo = GeoReference::from_geo_transform([1.5, 0.25, 0.0, 9.0, 0.0, -0.25]);
        assert_eq!(geo.shifted(0, 0), geo);
        assert!(geo.is_north_up());
    }
}
