//! In-memory rasters backed by `ndarray`.

use crate::error::{RasterError, Result};
use crate::raster::{check_row_len, RasterMetadata, RasterReader, RasterWriter};
use ndarray::{Array2, ArrayView1};

/// Readable raster holding all cells in a row-major `Array2`.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    data: Array2<f64>,
    metadata: RasterMetadata,
}

impl MemoryRaster {
    pub fn new(data: Array2<f64>) -> Self {
        let (height, width) = data.dim();
        Self {
            data,
            metadata: RasterMetadata::new(width, height),
        }
    }

    /// Build from a flat row-major cell vector
    pub fn from_shape_vec(height: usize, width: usize, cells: Vec<f64>) -> Result<Self> {
        Ok(Self::new(Array2::from_shape_vec((height, width), cells)?))
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.metadata.nodata = nodata;
        self
    }
}

impl RasterReader for MemoryRaster {
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
        check_row_len(self.metadata.width, buf.len())?;

        let nodata = self.metadata.nodata;
        for (dst, &src) in buf.iter_mut().zip(self.data.row(row).iter()) {
            *dst = match nodata {
                Some(nd) if src == nd => f64::NAN,
                _ => src,
            };
        }
        Ok(())
    }
}

/// Writable raster that collects rows into an `Array2`.
#[derive(Debug, Clone)]
pub struct MemoryWriter {
    data: Array2<f64>,
    metadata: RasterMetadata,
    next_row: usize,
}

impl MemoryWriter {
    pub fn new(metadata: RasterMetadata) -> Self {
        Self {
            data: Array2::from_elem((metadata.height, metadata.width), f64::NAN),
            metadata,
            next_row: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_row == self.metadata.height
    }

    /// Take the written cells. Fails unless every row was written.
    pub fn into_array(self) -> Result<Array2<f64>> {
        if !self.is_complete() {
            return Err(RasterError::OutputIncomplete {
                written: self.next_row,
                expected: self.metadata.height,
            });
        }
        Ok(self.data)
    }
}

impl RasterWriter for MemoryWriter {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn write_row(&mut self, row: &[f64]) -> Result<()> {
        if self.is_complete() {
            return Err(RasterError::OutputComplete(self.metadata.height));
        }
        check_row_len(self.metadata.width, row.len())?;

        self.data
            .row_mut(self.next_row)
            .assign(&ArrayView1::from(row));
        self.next_row += 1;
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.next_row
    }
}
