//! TOML file plumbing shared by every configuration type.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

pub(crate) fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let value = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(value)
}

pub(crate) fn save<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    let content = toml::to_string_pretty(value)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
    tracing::debug!(path = %path.display(), "saved config");
    Ok(())
}
