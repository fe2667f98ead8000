use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Missing required raster identifier: <{0}>")]
    MissingIdentifier(&'static str),

    #[error("Raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid window '{0}' (expected ROWS,COLS or ROW,COL,ROWS,COLS)")]
    InvalidWindow(String),

    #[error("Row length mismatch: expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Row {row} out of range (raster has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("Output is complete: all {0} rows already written")]
    OutputComplete(usize),

    #[error("Output is incomplete: {written} of {expected} rows written")]
    OutputIncomplete { written: usize, expected: usize },

    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Output raster <{0}> exists (use --overwrite to replace it)")]
    OutputExists(String),

    #[error("Invalid history record: {0}")]
    InvalidHistory(String),
}

pub type Result<T> = std::result::Result<T, RasterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        fn open(path: &str) -> Result<std::fs::File> {
            Ok(std::fs::File::open(path)?)
        }
        let err = open("/nonexistent/raster.tif").unwrap_err();
        assert!(matches!(err, RasterError::Io(_)));
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_gdal_error_converts() {
        fn open(path: &str) -> Result<gdal::Dataset> {
            Ok(gdal::Dataset::open(path)?)
        }
        let err = open("/nonexistent/raster.tif").unwrap_err();
        assert!(matches!(err, RasterError::Gdal(_)));
        assert!(err.to_string().starts_with("GDAL error: "));
    }
}
