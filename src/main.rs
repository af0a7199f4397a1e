//! Multiband Raster Compression CLI Tool
//!
//! A command-line utility for lossless and near-lossless compression of
//! multispectral and hyperspectral imagery.

use clap::Parser;
use hyperspec_compress::cli::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
