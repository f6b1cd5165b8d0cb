//! riskscan - structural risk classifier for Python functions
//!
//! Extracts AST metrics from Python sources, trains a random forest on a
//! labeled feature table and serves predictions from the CLI or over HTTP.

use anyhow::Result;
use clap::Parser;
use riskscan::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG wins over --log-level; logs go to stderr so stdout stays
    // machine-readable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("riskscan={}", cli.log_level)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
