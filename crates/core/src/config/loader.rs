//! Config path resolution
//!
//! Paths are resolved from the reapi base directory. The plugin binary lives at
//! `<mod>/addons/reapi/dlls/reapi.so`; the loader hands that location to
//! [`init_base_dir`] on load.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{ConfigError, ConfigResult};

static BASE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Derive the reapi base directory from the plugin binary path
///
/// `addons/reapi/dlls/reapi.so` -> `addons/reapi/`
pub fn base_dir_from_binary(binary: &Path) -> Option<PathBuf> {
    binary
        .parent() // dlls/
        .and_then(|p| p.parent()) // reapi/
        .map(PathBuf::from)
}

/// Record the base directory; later calls are ignored
pub fn init_base_dir(base: PathBuf) {
    if let Err(base) = BASE_DIR.set(base) {
        tracing::debug!("Config base directory already set, ignoring {:?}", base);
    }
}

/// Returns the reapi base directory
///
/// Falls back to the binary location when [`init_base_dir`] was never called.
pub fn reapi_base_dir() -> ConfigResult<PathBuf> {
    if let Some(base) = BASE_DIR.get() {
        return Ok(base.clone());
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    base_dir_from_binary(&exe).ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base config directory.
///
/// Path: `addons/reapi/config/`
pub fn config_dir() -> ConfigResult<PathBuf> {
    Ok(reapi_base_dir()?.join("config"))
}

/// Returns the core config path.
///
/// Path: `addons/reapi/config/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(config_dir()?.join("core.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_from_binary() {
        let binary = PathBuf::from("/srv/hlds/cstrike/addons/reapi/dlls/reapi.so");
        assert_eq!(
            base_dir_from_binary(&binary),
            Some(PathBuf::from("/srv/hlds/cstrike/addons/reapi"))
        );
    }
}
