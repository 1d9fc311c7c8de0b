//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = load_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(database) = config.get("database").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(database));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_dir().join("ordex.db"))
}

/// Get configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/ordex/config.toml first, then /etc/ordex/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("ordex").join("config.toml"));
        let system_config = PathBuf::from("/etc/ordex/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let config_path = dirs::config_dir()
            .map(|d| d.join("ordex").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        if config_path.exists() {
            Ok(config_path)
        } else {
            Err(Error::Config(format!(
                "Config file not found: {:?}",
                config_path
            )))
        }
    }
}

/// Get OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("ordex"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ordex"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ordex"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ordex"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ordex"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ordex"))
    } else {
        PathBuf::from("./ordex_data")
    }
}
