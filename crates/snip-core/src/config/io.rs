//! YAML configuration loading and saving
//!
//! Works with any serializable configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

/// Load configuration from a YAML file
///
/// A missing file gives the default config. An unreadable or invalid file
/// logs a warning and also gives the default config.
///
/// ```ignore
/// let config: SnipConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No config at {:?}, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("Cannot read config {:?} ({}), using defaults", path, e);
            return T::default();
        }
    };

    serde_yaml::from_str(&contents).unwrap_or_else(|e| {
        log::warn!("Invalid config {:?} ({}), using defaults", path, e);
        T::default()
    })
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Creating config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Serializing config")?;
    std::fs::write(path, yaml).with_context(|| format!("Writing config {:?}", path))?;
    log::debug!("Saved config to {:?}", path);

    Ok(())
}
