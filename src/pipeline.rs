use crate::error::{RasterError, Result};
use crate::raster::{RasterReader, RasterWriter};
use crate::transform::{CellTransform, Double};
use crate::window::Window;
use log::{debug, info};

/// Counts reported by a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub rows: usize,
    pub cols: usize,
    pub cells: usize,
    pub null_cells: usize,
}

/// Streams `rows` rows of `cols` cells from a reader to a writer, applying a
/// cell transform on the way.
///
/// Rows are read, transformed and written strictly in increasing order, one
/// at a time, through a single pair of buffers allocated up front. The first
/// read or write error aborts the run; a row is never written unless it was
/// read and transformed in full.
#[derive(Debug, Clone)]
pub struct RowPipeline<T = Double> {
    rows: usize,
    cols: usize,
    transform: T,
}

impl RowPipeline<Double> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_transform(rows, cols, Double)
    }

    pub fn from_window(window: &Window) -> Self {
        Self::new(window.rows, window.cols)
    }
}

impl<T: CellTransform> RowPipeline<T> {
    pub fn with_transform(rows: usize, cols: usize, transform: T) -> Self {
        Self {
            rows,
            cols,
            transform,
        }
    }

    fn check_shape(&self, what: &str, width: usize, height: usize) -> Result<()> {
        if width != self.cols {
            debug!("{} has {} columns, pipeline expects {}", what, width, self.cols);
            return Err(RasterError::ShapeMismatch {
                expected: self.cols,
                actual: width,
            });
        }
        if height < self.rows {
            return Err(RasterError::RowOutOfRange {
                row: self.rows - 1,
                rows: height,
            });
        }
        Ok(())
    }

    pub fn run<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<PipelineStats>
    where
        R: RasterReader + ?Sized,
        W: RasterWriter + ?Sized,
    {
        let input = reader.metadata();
        self.check_shape("Input", input.width, input.height)?;
        let output = writer.metadata();
        self.check_shape("Output", output.width, output.height)?;

        info!("Processing {} rows x {} columns", self.rows, self.cols);

        let mut in_buf = vec![0.0f64; self.cols];
        let mut out_buf = vec![0.0f64; self.cols];
        let mut null_cells = 0;

        let step = (self.rows / 10).max(1);

        for row in 0..self.rows {
            reader.read_row(row, &mut in_buf)?;
            self.transform.apply_row(&in_buf, &mut out_buf);
            null_cells += out_buf.iter().filter(|v| v.is_nan()).count();
            writer.write_row(&out_buf)?;

            if (row + 1) % step == 0 {
                debug!("{:3}% ({} / {} rows)", (row + 1) * 100 / self.rows, row + 1, self.rows);
            }
        }

        let stats = PipelineStats {
            rows: self.rows,
            cols: self.cols,
            cells: self.rows * self.cols,
            null_cells,
        };
        debug!("Pipeline finished: {:?}", stats);
        Ok(stats)
    }
}
