pub mod encode;
pub mod inspect;
pub mod reduce;

pub use encode::run_encode;
pub use inspect::run_inspect;
pub use reduce::run_reduce;

use anyhow::{Context, Result};
use sigterms::SignificantTermsConfig;
use std::path::Path;

/// Config from `path`, or defaults when no path is given or the file is missing
pub fn load_config(path: Option<&Path>) -> Result<SignificantTermsConfig> {
    match path {
        Some(path) => SignificantTermsConfig::load_or_default(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => Ok(SignificantTermsConfig::default()),
    }
}
