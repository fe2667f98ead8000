use crate::config::Config;
use crate::error::{RasterError, Result};
use crate::history::History;
use crate::pipeline::{PipelineStats, RowPipeline};
use crate::raster::memory::MemoryWriter;
use crate::raster::{self, RasterMetadata, RasterReader};
use crate::window::{Window, WindowedReader};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub history: PathBuf,
    pub window: Window,
    pub stats: PipelineStats,
    /// False when the window held no cells and no raster file was produced
    pub raster_written: bool,
}

/// Where the output is written before it is moved into place
pub fn staging_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Open input, double it into the output through the configured window and
/// attach history to the result.
pub fn run(config: &Config) -> Result<RunSummary> {
    if config.output.exists() {
        if !config.overwrite {
            return Err(RasterError::OutputExists(config.output.display().to_string()));
        }
        warn!("Overwriting existing raster <{}>", config.output.display());
    }

    let input = raster::open_input(&config.input, config.nodata)?;
    let source = input.metadata();

    info!("Raster size: {}x{}", source.width, source.height);
    if let Some(geo) = &source.geo {
        info!(
            "Pixel size: {:.6} x {:.6}",
            geo.pixel_width(),
            geo.pixel_height()
        );
    }
    if let Some(nd) = source.nodata {
        info!("Using nodata value: {}", nd);
    } else {
        info!("No nodata value specified");
    }

    let window = config
        .window
        .unwrap_or_else(|| Window::full(source.width, source.height));
    if window.is_empty() {
        warn!("Window {} contains no cells, no raster file is written", window);
    } else if !window.fits_within(source.width, source.height) {
        warn!(
            "Window {} extends beyond the {}x{} input, cells outside are written as nodata",
            window, source.width, source.height
        );
    }

    let mut reader = WindowedReader::new(input, window);
    let metadata = RasterMetadata {
        width: window.cols,
        height: window.rows,
        geo: reader.metadata().geo.clone(),
        nodata: Some(f64::NAN),
    };

    let pipeline = RowPipeline::from_window(&window);

    let raster_written = !window.is_empty();
    let stats = if raster_written {
        let staging = staging_path(&config.output);
        let result = raster::write_output(&staging, &metadata, &config.output_options(), |writer| {
            pipeline.run(&mut reader, writer)
        });
        commit(result, &staging, &config.output)?
    } else {
        // GeoTIFF has no zero-size image; the run still completes without a file
        let stats = pipeline.run(&mut reader, &mut MemoryWriter::new(metadata))?;
        if config.output.exists() {
            fs::remove_file(&config.output)?;
            debug!("Removed replaced raster {}", config.output.display());
        }
        stats
    };
    drop(reader);

    info!("Wrote {} cells ({} null)", stats.cells, stats.null_cells);

    let history = History::for_output(&config.output, &config.input, &config.command)
        .write(&config.output)?;

    if raster_written {
        info!("Output raster <{}> written", config.output.display());
    } else {
        info!("Empty output <{}> recorded in history only", config.output.display());
    }

    Ok(RunSummary {
        output: config.output.clone(),
        history,
        window,
        stats,
        raster_written,
    })
}

/// Move a finished staging file into place, or remove it after a failure
pub fn commit<T>(result: Result<T>, staging: &Path, output: &Path) -> Result<T> {
    let value = match result {
        Ok(value) => value,
        Err(e) => {
            discard(staging);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(staging, output) {
        discard(staging);
        return Err(e.into());
    }
    debug!("Moved {} to {}", staging.display(), output.display());
    Ok(value)
}

fn discard(staging: &Path) {
    if !staging.exists() {
        return;
    }
    match fs::remove_file(staging) {
        Ok(()) => debug!("Removed incomplete output {}", staging.display()),
        Err(e) => warn!(
            "Failed to remove incomplete output {}: {}",
            staging.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("maps/out.tif")),
            PathBuf::from("maps/out.tif.partial")
        );
    }

    #[test]
    fn test_commit_moves_staging_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("out.tif.partial");
        let output = dir.path().join("out.tif");
        fs::write(&staging, b"raster").unwrap();

        let value = commit(Ok(7), &staging, &output).unwrap();

        assert_eq!(value, 7);
        assert!(!staging.exists());
        assert_eq!(fs::read(&output).unwrap(), b"raster");
    }

    #[test]
    fn test_commit_discards_staging_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("out.tif.partial");
        let output = dir.path().join("out.tif");
        fs::write(&staging, b"half a raster").unwrap();

        let result: Result<()> = commit(
            Err(RasterError::OutputIncomplete {
                written: 1,
                expected: 2,
            }),
            &staging,
            &output,
        );

        assert!(matches!(result, Err(RasterError::OutputIncomplete { .. })));
        assert!(!staging.exists());
        assert!(!output.exists());
    }

    #[test]
    fn test_existing_output_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tif");
        fs::write(&output, b"keep me").unwrap();

        let config = Config::new(dir.path().join("missing.tif"), &output).unwrap();
        let err = run(&config).unwrap_err();

        assert!(matches!(err, RasterError::OutputExists(_)));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");
    }

    #[test]
    fn test_missing_input_fails_before_output_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tif");

        let config = Config::new(dir.path().join("missing.tif"), &output).unwrap();
        assert!(run(&config).is_err());
        assert!(!output.exists());
        assert!(!staging_path(&output).exists());
    }
}
