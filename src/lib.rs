//! Structural risk classification for Python functions
//!
//! - [`parsers`]: tree-sitter parsing and per-function metrics
//! - [`pipeline`]: batch extraction over a source directory
//! - [`dataset`]: the CSV feature table
//! - [`classifier`]: random forest training, evaluation and persistence
//! - [`inference`]: the loaded [`inference::RiskPredictor`]
//! - [`serve`]: the HTTP endpoint
//! - [`stubs`]: unittest stub generation

pub mod classifier;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod serve;
pub mod stubs;

pub use error::{Error, Result};
