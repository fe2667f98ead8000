use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

use raster_double::cli::Args;
use raster_double::config::Config;
use raster_double::error::Result;

fn run(args: &Args) -> Result<()> {
    let command = std::env::args().collect::<Vec<_>>().join(" ");
    let config = Config::from_args(args, command)?;

    if let Some(window) = &config.window {
        info!("Using window: {}", window);
    } else {
        info!("Using the full input extent");
    }

    let summary = raster_double::run(&config)?;
    info!(
        "Processed {} rows x {} columns, history in {}",
        summary.stats.rows,
        summary.stats.cols,
        summary.history.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level())).init();

    info!("=== Raster Doubling ===");

    match run(&args) {
        Ok(()) => {
            info!("=== Done! ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
