pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::PathBuf;

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "CLUSTERFLOW_CONFIG_PATH";

const LOCAL_CANDIDATES: [&str; 2] = ["clusterflow.local.yaml", "clusterflow.yaml"];

/// Locate the settings file
///
/// Search order:
/// 1. `CLUSTERFLOW_CONFIG_PATH` (must exist when set)
/// 2. Current directory: `clusterflow.local.yaml`, `clusterflow.yaml`
/// 3. `~/.config/clusterflow/config.yaml`
///
/// Returns `None` when nothing is found; callers fall back to defaults.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &LOCAL_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("clusterflow").join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Load settings from the first config file found, or defaults
pub fn load_settings() -> Result<Settings> {
    match find_config_file()? {
        Some(path) => Settings::from_path(path),
        None => {
            tracing::debug!("No config file found, using default settings");
            Ok(Settings::default())
        }
    }
}
