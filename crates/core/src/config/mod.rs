//! Configuration for reapi
//!
//! [`CoreConfig`] is a TOML file next to the plugin binary. A missing file is
//! written with defaults on first load and can be reloaded at runtime.

mod loader;

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::hookchain::{DEFAULT_TEMP_STRINGS, DEFAULT_TEMP_STRING_SIZE};

pub use loader::{base_dir_from_binary, config_dir, core_config_path, init_base_dir, reapi_base_dir};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine config directory from plugin location
    #[error("Config directory not available - could not resolve plugin base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

fn read_toml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load `path`, writing the default value first if the file is missing
fn load_or_create<T: Default + Serialize + DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    if path.exists() {
        let config = read_toml(path)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    } else {
        let default = T::default();
        write_toml(path, &default)?;
        tracing::info!("Created default config at {:?}", path);
        Ok(default)
    }
}

/// Temp string arena sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempStringConfig {
    /// Number of scratch buffers
    pub count: usize,

    /// Bytes per buffer, NUL terminator included
    pub size: usize,
}

impl Default for TempStringConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_TEMP_STRINGS,
            size: DEFAULT_TEMP_STRING_SIZE,
        }
    }
}

/// Core configuration.
///
/// Loaded from `addons/reapi/config/core.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// `tracing` filter directive used when `debug` is off
    pub log_filter: String,

    pub temp_strings: TempStringConfig,

    /// Player slot count assumed until the server reports one
    pub max_clients: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_filter: "info".to_string(),
            temp_strings: TempStringConfig::default(),
            max_clients: reapi_engine::globals::DEFAULT_MAX_CLIENTS,
        }
    }
}

impl CoreConfig {
    /// Load core config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&core_config_path()?)
    }

    /// Load from an explicit path, creating default if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        load_or_create(path)
    }

    /// Save core config to file.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&core_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        write_toml(path, self)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload core config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = core_config_path()?;
        *self = read_toml(&path)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }

    /// Filter directive for the log subscriber
    pub fn log_directive(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            self.log_filter.as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        pub value: i32,
        pub name: String,
    }

    #[test]
    fn test_config_serialize_deserialize() {
        let config = TestConfig {
            value: 42,
            name: "test".to_string(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: TestConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.temp_strings.count, 16);
        assert_eq!(config.temp_strings.size, 1024);
        assert_eq!(config.max_clients, 32);
        assert_eq!(config.log_directive(), "info");
    }

    #[test]
    fn test_core_config_partial_file() {
        let config: CoreConfig = toml::from_str("debug = true\n[temp_strings]\ncount = 4\n").unwrap();
        assert!(config.debug);
        assert_eq!(config.temp_strings.count, 4);
        assert_eq!(config.temp_strings.size, 1024);
        assert_eq!(config.log_directive(), "debug");
    }

    #[test]
    fn test_core_config_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("reapi-config-test-{}", std::process::id()));
        let path = dir.join("core.toml");
        let _ = std::fs::remove_dir_all(&dir);

        // Missing file is created with defaults
        let created = CoreConfig::load_from(&path).unwrap();
        assert_eq!(created, CoreConfig::default());
        assert!(path.exists());

        let mut changed = created.clone();
        changed.max_clients = 20;
        changed.log_filter = "reapi_core=trace".to_string();
        changed.save_to(&path).unwrap();

        assert_eq!(CoreConfig::load_from(&path).unwrap(), changed);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
