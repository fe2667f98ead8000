// Library exports for testing and reuse

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod raster;
pub mod transform;
pub mod window;

// Re-export commonly used types
pub use app::{run, RunSummary};
pub use config::Config;
pub use error::{RasterError, Result};
pub use history::History;
pub use pipeline::{PipelineStats, RowPipeline};
pub use raster::{RasterMetadata, RasterReader, RasterWriter};
pub use transform::{CellTransform, Double};
pub use window::{Window, WindowedReader};
