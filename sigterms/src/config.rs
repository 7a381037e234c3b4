//! Aggregation configuration
//!
//! Loaded from TOML, for example:
//!
//! ```toml
//! required_size = 25
//! min_doc_count = 2
//! format = "ip"
//!
//! [heuristic.chi_square]
//! include_negatives = false
//! background_is_superset = true
//!
//! [reduce]
//! fan_in = 16
//! intermediate_size = 100
//! ```

use crate::error::{Error, Result};
use crate::format::DocValueFormat;
use crate::heuristic::SignificanceHeuristic;
use crate::model::AggregationSettings;
use crate::reduce::ReduceOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignificantTermsConfig {
    /// Buckets kept after the final reduce (0 = all)
    #[serde(default = "default_required_size")]
    pub required_size: usize,

    /// Minimum subset frequency for a bucket to be rendered
    #[serde(default = "default_min_doc_count")]
    pub min_doc_count: u64,

    /// Display format for keys
    #[serde(default)]
    pub format: DocValueFormat,

    #[serde(default)]
    pub heuristic: SignificanceHeuristic,

    #[serde(default)]
    pub reduce: ReduceOptions,
}

fn default_required_size() -> usize {
    10
}

fn default_min_doc_count() -> u64 {
    3
}

impl Default for SignificantTermsConfig {
    fn default() -> Self {
        Self {
            required_size: default_required_size(),
            min_doc_count: default_min_doc_count(),
            format: DocValueFormat::default(),
            heuristic: SignificanceHeuristic::default(),
            reduce: ReduceOptions::default(),
        }
    }
}

impl SignificantTermsConfig {
    /// Settings stamped on partial results built from this config
    pub fn settings(&self) -> AggregationSettings {
        AggregationSettings {
            required_size: self.required_size,
            min_doc_count: self.min_doc_count,
            heuristic: self.heuristic,
            format: self.format,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.reduce.fan_in < 2 {
            return Err(Error::Config(format!(
                "reduce.fan_in must be at least 2, got {}",
                self.reduce.fan_in
            )));
        }
        Ok(())
    }

    /// Load and validate config from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config, or use defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}
