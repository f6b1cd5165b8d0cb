//! CLI command definitions and handlers

mod analyze;
mod init;
mod predict;
mod serve;
mod stubs;
mod train;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// riskscan - structural risk classifier for Python functions
#[derive(Parser, Debug)]
#[command(name = "riskscan")]
#[command(
    version,
    about = "Flag risky Python functions from their structure: extract AST metrics, train a random forest, serve predictions",
    after_help = "\
Examples:
  riskscan analyze --src data/raw_code        Extract features to data/function_features.csv
  riskscan train                              Train on the labeled feature table
  riskscan predict app/views.py               Classify the functions in one file
  riskscan serve --addr 0.0.0.0:5000          Serve POST /analyze
  riskscan stubs                              Generate unittest stubs from the table"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: one per core)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example riskscan.toml to the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Extract function features from a directory of Python sources
    Analyze {
        /// Source directory (default: data/raw_code)
        #[arg(long)]
        src: Option<PathBuf>,

        /// Feature table to write (default: data/function_features.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Train the classifier on a labeled feature table
    Train {
        /// Labeled feature table (default: data/function_features.csv)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Where to write the model (default: models/rf_model.bin)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Number of trees in the forest
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for the held-out split and forest sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify the top-level functions of one Python file
    Predict {
        /// Python source file
        file: PathBuf,

        /// Model artifact (default: models/rf_model.bin)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Model artifact (default: models/rf_model.bin)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Listen address (default: 127.0.0.1:5000)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Generate unittest stubs from a feature table
    Stubs {
        /// Feature table (default: data/function_features.csv)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Test module to write (default: generated_tests/test_generated.py)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Module the generated tests import from
        #[arg(long)]
        module: Option<String>,
    },
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = config::load_config(&cwd);

    configure_workers(cli.workers.or(config.batch.workers))?;

    match cli.command {
        Commands::Init { force } => init::run(&cwd, force),
        Commands::Analyze { src, output } => {
            let src = src.unwrap_or_else(|| config.paths.src.clone());
            let output = output.unwrap_or_else(|| config.paths.data.clone());
            analyze::run(&src, &output, &config)
        }
        Commands::Train {
            data,
            model,
            trees,
            seed,
        } => {
            let data = data.unwrap_or_else(|| config.paths.data.clone());
            let model = model.unwrap_or_else(|| config.paths.model.clone());
            let mut train_config = config.train.clone();
            if let Some(trees) = trees {
                train_config.forest.n_trees = trees;
            }
            if let Some(seed) = seed {
                train_config.seed = seed;
            }
            train::run(&data, &model, &train_config)
        }
        Commands::Predict {
            file,
            model,
            format,
        } => {
            let model = model.unwrap_or_else(|| config.paths.model.clone());
            predict::run(&file, &model, &format)
        }
        Commands::Serve { model, addr } => {
            let model = model.unwrap_or_else(|| config.paths.model.clone());
            let addr = addr.unwrap_or_else(|| config.serve.addr.clone());
            serve::run(&model, &addr)
        }
        Commands::Stubs {
            data,
            output,
            module,
        } => {
            let data = data.unwrap_or_else(|| config.paths.data.clone());
            let output = output.unwrap_or_else(|| config.stubs.output.clone());
            let module = module.unwrap_or_else(|| config.stubs.target_module.clone());
            stubs::run(&data, &output, &module)
        }
    }
}

fn configure_workers(workers: Option<usize>) -> Result<()> {
    if let Some(n) = workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure worker pool")?;
        tracing::debug!("using {} workers", n);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "riskscan",
            "analyze",
            "--src",
            "code",
            "--workers",
            "2",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.workers, Some(2));
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Analyze { src, output } => {
                assert_eq!(src, Some(PathBuf::from("code")));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_predict_format_validated() {
        assert!(Cli::try_parse_from(["riskscan", "predict", "a.py", "--format", "xml"]).is_err());
    }
}
