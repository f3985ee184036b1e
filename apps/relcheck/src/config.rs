//! # Configuration File
//!
//! Optional TOML file with a `[checker]` table:
//!
//! ```toml
//! [checker]
//! allow_complex_loops = false
//! skip_multipolygons = true
//! skip_turn_restrictions = false
//! show_element_count = true
//! ```
//!
//! An explicit `--config` path must exist. Without one, `relcheck.toml` in
//! the working directory is read when present; otherwise defaults apply.

use relcheck_core::{CheckerConfig, ValidatorError};
use serde::Deserialize;
use std::path::Path;

/// Configuration file looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "relcheck.toml";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    checker: CheckerConfig,
}

/// Parse configuration text.
pub fn parse_config(text: &str) -> Result<CheckerConfig, ValidatorError> {
    let file: ConfigFile =
        toml::from_str(text).map_err(|e| ValidatorError::DeserializationError(e.to_string()))?;
    Ok(file.checker)
}

/// Load the checker configuration.
pub fn load_config(path: Option<&Path>) -> Result<CheckerConfig, ValidatorError> {
    let path = match path {
        Some(p) => p,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(CheckerConfig::default());
            }
            default
        }
    };

    let metadata = std::fs::metadata(path).map_err(|e| {
        ValidatorError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ValidatorError::DeserializationError(format!(
            "Config file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CONFIG_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ValidatorError::IoError(format!("Read config: {}", e)))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    parse_config(&text)
}
