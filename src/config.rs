use crate::cli::Args;
use crate::error::{RasterError, Result};
use crate::raster::{Compression, OutputOptions};
use crate::window::Window;
use std::path::PathBuf;

/// Everything a run needs, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Explicit processing window; the whole input when `None`
    pub window: Option<Window>,
    pub nodata: Option<f64>,
    pub compression: Compression,
    pub overwrite: bool,
    /// Command line recorded in the output history
    pub command: String,
}

impl Config {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<Self> {
        let input = input.into();
        let output = output.into();

        if input.as_os_str().is_empty() {
            return Err(RasterError::MissingIdentifier("input"));
        }
        if output.as_os_str().is_empty() {
            return Err(RasterError::MissingIdentifier("output"));
        }

        let command = format!(
            "raster-double --input {} --output {}",
            input.display(),
            output.display()
        );

        Ok(Self {
            input,
            output,
            window: None,
            nodata: None,
            compression: Compression::default(),
            overwrite: false,
            command,
        })
    }

    pub fn from_args(args: &Args, command: String) -> Result<Self> {
        let mut config = Self::new(&args.input, &args.output)?;

        config.window = args.window.as_deref().map(str::parse::<Window>).transpose()?;
        config.nodata = args.nodata;
        config.compression = args.compression.parse()?;
        config.overwrite = args.overwrite;
        config.command = command;

        Ok(config)
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            compression: self.compression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["raster-double", "-i", "in.tif", "-o", "out.tif"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        assert!(matches!(
            Config::new("", "out.tif"),
            Err(RasterError::MissingIdentifier("input"))
        ));
        assert!(matches!(
            Config::new("in.tif", ""),
            Err(RasterError::MissingIdentifier("output"))
        ));
    }

    #[test]
    fn test_from_args_defaults() {
        let config = Config::from_args(&args(&[]), "cmd".to_string()).unwrap();
        assert_eq!(config.input, PathBuf::from("in.tif"));
        assert_eq!(config.output, PathBuf::from("out.tif"));
        assert_eq!(config.window, None);
        assert_eq!(config.compression, Compression::Deflate);
        assert!(!config.overwrite);
        assert_eq!(config.command, "cmd");
    }

    #[test]
    fn test_from_args_window() {
        let config = Config::from_args(&args(&["-w", "10,20"]), String::new()).unwrap();
        assert_eq!(config.window, Some(Window::new(0, 0, 10, 20)));
    }

    #[test]
    fn test_from_args_bad_window() {
        assert!(matches!(
            Config::from_args(&args(&["-w", "10"]), String::new()),
            Err(RasterError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_from_args_bad_compression() {
        assert!(matches!(
            Config::from_args(&args(&["-c", "JPEG"]), String::new()),
            Err(RasterError::InvalidCompression(_))
        ));
    }
}
