use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "raster-double")]
#[command(about = "Example raster add-on: multiply every cell of a raster by two")]
#[command(version)]
pub struct Args {
    /// Name of input raster map (GeoTIFF path)
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Name for output raster map (written as float64 GeoTIFF)
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// Region to process in cells: ROWS,COLS or ROW,COL,ROWS,COLS (default: whole input)
    #[arg(short, long, value_name = "WINDOW")]
    pub window: Option<String>,

    /// Override input nodata value (default: read from input)
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub nodata: Option<f64>,

    /// Output compression: DEFLATE, LZW or NONE
    #[arg(short, long, value_name = "TYPE", default_value = "DEFLATE")]
    pub compression: String,

    /// Allow output files to overwrite existing files
    #[arg(long)]
    pub overwrite: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
