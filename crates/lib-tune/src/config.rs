//! Link configuration loading and validation.

use crate::error::{TuneError, TuneResult};
use lib_types::{ConfigError, LinkConfig};
use std::path::Path;
use tracing::debug;

/// Load a [`LinkConfig`] from a JSON (by extension) or TOML file.
///
/// A relative channel file path is resolved against the directory of the
/// configuration file. The loaded configuration is validated before return.
pub fn load_config(path: &Path) -> TuneResult<LinkConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;

    let mut config: LinkConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content).map_err(|source| TuneError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        // Assume TOML
        toml::from_str(&content).map_err(|source| TuneError::Toml {
            path: path.to_path_buf(),
            source,
        })?
    };

    if let Some(file) = config.channel.file.as_mut() {
        if file.is_relative() {
            if let Some(dir) = path.parent() {
                *file = dir.join(&*file);
            }
        }
    }

    validate_config(&config)?;
    debug!(path = %path.display(), "loaded link configuration");

    Ok(config)
}

/// Validate ranges and check that a configured channel file exists.
pub fn validate_config(config: &LinkConfig) -> TuneResult<()> {
    config.validate()?;

    if let Some(file) = &config.channel.file {
        if !file.is_file() {
            return Err(ConfigError::invalid(format!(
                "channel file not found: {}",
                file.display()
            ))
            .into());
        }
    }

    Ok(())
}
