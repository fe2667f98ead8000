use crate::error::{RasterError, Result};
use crate::raster::{RasterMetadata, RasterReader};
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Region of the input raster a run iterates over, in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_off,
            col_off,
            rows,
            cols,
        }
    }

    /// Window covering a whole raster
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, height, width)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// True when every cell of the window lies inside a `width` x `height` raster
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.row_off.checked_add(self.rows).is_some_and(|end| end <= height)
            && self.col_off.checked_add(self.cols).is_some_and(|end| end <= width)
    }

    /// True when the window is exactly the extent of a `width` x `height` raster
    pub fn covers_exactly(&self, width: usize, height: usize) -> bool {
        *self == Self::full(width, height)
    }
}

impl FromStr for Window {
    type Err = RasterError;

    /// Accepts `ROWS,COLS` or `ROW,COL,ROWS,COLS`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RasterError::InvalidWindow(s.to_string());

        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        let window = match parts.as_slice() {
            [rows, cols] => Self::new(0, 0, *rows, *cols),
            [row_off, col_off, rows, cols] => Self::new(*row_off, *col_off, *rows, *cols),
            _ => return Err(invalid()),
        };

        // Last row and column must stay addressable
        if window.row_off.checked_add(window.rows).is_none()
            || window.col_off.checked_add(window.cols).is_none()
        {
            return Err(invalid());
        }
        Ok(window)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.row_off, self.col_off, self.rows, self.cols
        )
    }
}

/// Presents a window of another raster as a raster of its own.
///
/// Row `r` maps to source row `row_off + r`. Window cells that fall outside
/// the source extent read as no-data (`NaN`).
pub struct WindowedReader<R> {
    inner: R,
    window: Window,
    metadata: RasterMetadata,
    passthrough: bool,
    scratch: Vec<f64>,
}

impl<R: RasterReader> WindowedReader<R> {
    pub fn new(inner: R, window: Window) -> Self {
        let source = inner.metadata();

        let metadata = RasterMetadata {
            width: window.cols,
            height: window.rows,
            geo: source
                .geo
                .as_ref()
                .map(|g| g.shifted(window.col_off, window.row_off)),
            nodata: source.nodata,
        };

        let passthrough = window.covers_exactly(source.width, source.height);
        let scratch = if passthrough {
            Vec::new()
        } else {
            vec![f64::NAN; source.width]
        };

        debug!(
            "Window {} over {}x{} source",
            window, source.width, source.height
        );

        Self {
            inner,
            window,
            metadata,
            passthrough,
            scratch,
        }
    }
}

impl<R: RasterReader> RasterReader for WindowedReader<R> {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        if row >= self.window.rows {
            return Err(RasterError::RowOutOfRange {
                row,
                rows: self.window.rows,
            });
        }
        if buf.len() != self.window.cols {
            return Err(RasterError::ShapeMismatch {
                expected: self.window.cols,
                actual: buf.len(),
            });
        }

        if self.passthrough {
            return self.inner.read_row(row, buf);
        }

        buf.fill(f64::NAN);

        let src_height = self.inner.metadata().height;
        let src_row = match self.window.row_off.checked_add(row) {
            Some(r) if r < src_height => r,
            _ => return Ok(()),
        };
        if self.window.col_off >= self.scratch.len() {
            return Ok(());
        }

        self.inner.read_row(src_row, &mut self.scratch)?;

        let n = (self.scratch.len() - self.window.col_off).min(self.window.cols);
        buf[..n].copy_from_slice(&self.scratch[self.window.col_off..self.window.col_off + n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::memory::MemoryRaster;
    use ndarray::arr2;

    fn source() -> MemoryRaster {
        MemoryRaster::new(arr2(&[
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
        ]))
    }

    #[test]
    fn test_parse_short_form() {
        let window: Window = "2,3".parse().unwrap();
        assert_eq!(window, Window::new(0, 0, 2, 3));
    }

    #[test]
    fn test_parse_long_form() {
        let window: Window = " 1, 2 ,3,4".parse().unwrap();
        assert_eq!(window, Window::new(1, 2, 3, 4));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<Window>().is_err());
        assert!("1,2,3".parse::<Window>().is_err());
        assert!("-1,2".parse::<Window>().is_err());
        assert!("a,b".parse::<Window>().is_err());
    }

    #[test]
    fn test_parse_rejects_offsets_past_usize() {
        let max = usize::MAX;
        let err = format!("{},0,1,2", max).parse::<Window>().unwrap_err();
        assert!(matches!(err, RasterError::InvalidWindow(_)));
        assert!(format!("0,{},2,1", max).parse::<Window>().is_err());

        let edge: Window = format!("{},0,0,2", max).parse().unwrap();
        assert_eq!(edge, Window::new(max, 0, 0, 2));
    }

    #[test]
    fn test_fits_within() {
        assert!(Window::full(3, 2).fits_within(3, 2));
        assert!(Window::new(1, 1, 2, 2).fits_within(3, 3));
        assert!(!Window::new(2, 1, 2, 3).fits_within(3, 3));
        assert!(!Window::new(usize::MAX, 0, 1, 1).fits_within(3, 3));
    }

    #[test]
    fn test_is_empty() {
        assert!(Window::new(0, 0, 0, 5).is_empty());
        assert!(Window::new(3, 3, 5, 0).is_empty());
        assert!(!Window::full(1, 1).is_empty());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let window = Window::new(5, 6, 7, 8);
        assert_eq!(window.to_string().parse::<Window>().unwrap(), window);
    }

    #[test]
    fn test_full_window_passes_rows_through() {
        let mut reader = WindowedReader::new(source(), Window::full(3, 3));
        let mut buf = vec![0.0; 3];
        reader.read_row(2, &mut buf).unwrap();
        assert_eq!(buf, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_sub_window() {
        let mut reader = WindowedReader::new(source(), Window::new(1, 1, 2, 2));
        assert_eq!(reader.metadata().width, 2);
        assert_eq!(reader.metadata().height, 2);

        let mut buf = vec![0.0; 2];
        reader.read_row(0, &mut buf).unwrap();
        assert_eq!(buf, vec![5.0, 6.0]);
        reader.read_row(1, &mut buf).unwrap();
        assert_eq!(buf, vec![8.0, 9.0]);
    }

    #[test]
    fn test_cells_outside_source_are_nan() {
        let mut reader = WindowedReader::new(source(), Window::new(2, 1, 2, 3));
        let mut buf = vec![0.0; 3];

        reader.read_row(0, &mut buf).unwrap();
        assert_eq!(&buf[..2], &[8.0, 9.0]);
        assert!(buf[2].is_nan());

        reader.read_row(1, &mut buf).unwrap();
        assert!(buf.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_huge_offset_reads_as_nan() {
        let mut reader = WindowedReader::new(source(), Window::new(usize::MAX, 0, 1, 3));
        let mut buf = vec![0.0; 3];
        reader.read_row(0, &mut buf).unwrap();
        assert!(buf.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_row_out_of_window() {
        let mut reader = WindowedReader::new(source(), Window::new(0, 0, 1, 3));
        let mut buf = vec![0.0; 3];
        let err = reader.read_row(1, &mut buf).unwrap_err();
        assert!(matches!(err, RasterError::RowOutOfRange { row: 1, rows: 1 }));
    }
}
