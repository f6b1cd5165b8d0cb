//! Configuration for riskscan
//!
//! Loads `riskscan.toml` from the working directory. Every section is
//! optional and falls back to defaults; environment variables override the
//! file, and CLI flags override both.
//!
//! # Configuration Format
//!
//! ```toml
//! # riskscan.toml
//!
//! [paths]
//! src = "data/raw_code"
//! data = "data/function_features.csv"
//! model = "models/rf_model.bin"
//!
//! [train]
//! test_size = 0.2
//! seed = 42
//!
//! [train.forest]
//! n_trees = 100
//! max_depth = 10
//!
//! [serve]
//! addr = "127.0.0.1:5000"
//!
//! [batch]
//! max_file_size = 2097152
//! workers = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::classifier::TrainConfig;
use crate::pipeline::DEFAULT_MAX_FILE_SIZE;
use crate::stubs::DEFAULT_TARGET_MODULE;

/// Config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "riskscan.toml";

/// Overrides the model path
pub const ENV_MODEL: &str = "RISKSCAN_MODEL";
/// Overrides the serve address
pub const ENV_ADDR: &str = "RISKSCAN_ADDR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskscanConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub train: TrainConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub stubs: StubsConfig,
}

/// Artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of Python sources for `analyze`
    pub src: PathBuf,
    /// Feature table written by `analyze`, read by `train` and `stubs`
    pub data: PathBuf,
    /// Model artifact written by `train`
    pub model: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::from("data/raw_code"),
            data: PathBuf::from("data/function_features.csv"),
            model: PathBuf::from("models/rf_model.bin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub addr: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    /// Parallel workers (default: one per core)
    pub workers: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StubsConfig {
    pub output: PathBuf,
    /// Module the generated tests import from
    pub target_module: String,
}

impl Default for StubsConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("generated_tests/test_generated.py"),
            target_module: DEFAULT_TARGET_MODULE.to_string(),
        }
    }
}

impl RiskscanConfig {
    /// Apply environment overrides, looking variables up through `var`
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = var(ENV_MODEL).filter(|v| !v.is_empty()) {
            self.paths.model = PathBuf::from(model);
        }
        if let Some(addr) = var(ENV_ADDR).filter(|v| !v.is_empty()) {
            self.serve.addr = addr;
        }
    }
}

/// Load configuration from `dir/riskscan.toml` plus the process environment.
///
/// A missing file gives defaults; an unreadable or invalid one is logged and
/// also gives defaults.
pub fn load_config(dir: &Path) -> RiskscanConfig {
    let path = dir.join(CONFIG_FILE);
    let mut config = if path.exists() {
        match load_toml_config(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                RiskscanConfig::default()
            }
        }
    } else {
        debug!("No config found, using defaults");
        RiskscanConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config
}

fn load_toml_config(path: &Path) -> anyhow::Result<RiskscanConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: RiskscanConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Example config written by `riskscan init`
pub const EXAMPLE_CONFIG: &str = r#"# riskscan configuration
# Every key is optional; the values below are the defaults.

[paths]
# Python sources scanned by `riskscan analyze`
src = "data/raw_code"
# Feature table (add a `label` column of 0/1 before training)
data = "data/function_features.csv"
# Trained model (override with RISKSCAN_MODEL)
model = "models/rf_model.bin"

[train]
# Fraction of labeled rows held out for evaluation
test_size = 0.2
seed = 42

[train.forest]
n_trees = 100
max_depth = 10
min_leaf_size = 1
# Feature columns per tree (default: sqrt of the feature count)
# max_features = 2

[serve]
# Listen address (override with RISKSCAN_ADDR)
addr = "127.0.0.1:5000"

[batch]
# Skip source files larger than this many bytes
max_file_size = 2097152
# workers = 8

[stubs]
output = "generated_tests/test_generated.py"
target_module = "target_module"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let mut config = RiskscanConfig::default();
        config.apply_env(|_| None);
        assert_eq!(config.paths.data, PathBuf::from("data/function_features.csv"));
        assert_eq!(config.paths.model, PathBuf::from("models/rf_model.bin"));
        assert_eq!(config.train.test_size, 0.2);
        assert_eq!(config.train.forest.n_trees, 100);
        assert!(!dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_example_config_parses_to_defaults() {
        let parsed: RiskscanConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, RiskscanConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[train.forest]\nn_trees = 7\n\n[serve]\naddr = \"0.0.0.0:9000\"\n",
        )
        .unwrap();

        let config = load_toml_config(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.train.forest.n_trees, 7);
        assert_eq!(config.train.forest.max_depth, 10);
        assert_eq!(config.train.seed, 42);
        assert_eq!(config.serve.addr, "0.0.0.0:9000");
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[train\nbroken").unwrap();
        let mut config = load_config(dir.path());
        // Neutralize any RISKSCAN_* in the test environment
        config.paths.model = PathsConfig::default().model;
        config.serve.addr = ServeConfig::default().addr;
        assert_eq!(config, RiskscanConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = RiskscanConfig::default();
        config.apply_env(|key| match key {
            ENV_MODEL => Some("/srv/model.bin".to_string()),
            ENV_ADDR => Some("0.0.0.0:8080".to_string()),
            _ => None,
        });
        assert_eq!(config.paths.model, PathBuf::from("/srv/model.bin"));
        assert_eq!(config.serve.addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_empty_env_value_ignored() {
        let mut config = RiskscanConfig::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config, RiskscanConfig::default());
    }
}
