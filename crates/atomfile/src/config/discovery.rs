//! Configuration discovery and resolution

use super::types::{AtomicFileConfig, Strategy};
use crate::platform::SharingMode;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name looked up in the search directory
pub const CONFIG_FILE_NAME: &str = "atomfile.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Explicit overrides, highest priority
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub strategy: Option<Strategy>,
    pub sharing: Option<SharingMode>,
    pub sync_writes: Option<bool>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    /// Config file to load instead of searching
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Explicit overrides
/// 2. Environment variables (`ATOMFILE_*`)
/// 3. Config file (`overrides.config_path`, else `atomfile.toml` in `search_dir`)
/// 4. Defaults
///
/// An explicitly named config file must load; a discovered one that fails to
/// parse is skipped with a warning.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    search_dir: Option<&Path>,
) -> Result<AtomicFileConfig, ConfigError> {
    let mut config = AtomicFileConfig::default();

    if let Some(path) = overrides.config_path.as_deref() {
        config = load_config_file(path)?;
    } else if let Some(dir) = search_dir {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            match load_config_file(&path) {
                Ok(file_config) => config = file_config,
                Err(e) => warn!("Failed to load config at {path:?}: {e}"),
            }
        }
    }

    apply_env_overrides(&mut config);
    apply_overrides(&mut config, overrides);

    Ok(config)
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<AtomicFileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_value<T: std::str::FromStr>(key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {key}={raw:?}: {e}");
            None
        }
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut AtomicFileConfig) {
    if let Some(strategy) = env_value::<Strategy>("ATOMFILE_STRATEGY") {
        config.strategy = strategy;
    }

    if let Some(sharing) = env_value::<SharingMode>("ATOMFILE_SHARING") {
        config.sharing = sharing;
    }

    if let Some(attempts) = env_value::<u32>("ATOMFILE_RETRY_ATTEMPTS") {
        config.retry.attempts = attempts;
    }

    if let Some(delay_ms) = env_value::<u64>("ATOMFILE_RETRY_DELAY_MS") {
        config.retry.delay_ms = delay_ms;
    }
}

fn apply_overrides(config: &mut AtomicFileConfig, overrides: &ConfigOverrides) {
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy;
    }

    if let Some(sharing) = overrides.sharing {
        config.sharing = sharing;
    }

    if let Some(sync_writes) = overrides.sync_writes {
        config.sync_writes = sync_writes;
    }

    if let Some(attempts) = overrides.retry_attempts {
        config.retry.attempts = attempts;
    }

    if let Some(delay_ms) = overrides.retry_delay_ms {
        config.retry.delay_ms = delay_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: [&str; 4] = [
        "ATOMFILE_STRATEGY",
        "ATOMFILE_SHARING",
        "ATOMFILE_RETRY_ATTEMPTS",
        "ATOMFILE_RETRY_DELAY_MS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_sources() {
        clear_env();
        let config = resolve_config(&ConfigOverrides::default(), None).unwrap();
        assert_eq!(config, AtomicFileConfig::default());
    }

    #[test]
    #[serial]
    fn test_discovers_file_in_search_dir() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "strategy = \"lock\"\nsharing = \"permissive\"\n",
        )
        .unwrap();

        let config = resolve_config(&ConfigOverrides::default(), Some(temp_dir.path())).unwrap();
        assert_eq!(config.strategy, Strategy::Lock);
        assert_eq!(config.sharing, SharingMode::Permissive);
    }

    #[test]
    #[serial]
    fn test_broken_discovered_file_is_skipped() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "strategy = [").unwrap();

        let config = resolve_config(&ConfigOverrides::default(), Some(temp_dir.path())).unwrap();
        assert_eq!(config, AtomicFileConfig::default());
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_must_load() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(temp_dir.path().join("missing.toml")),
            ..Default::default()
        };

        let err = resolve_config(&overrides, None).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "strategy = \"rename\"\n[retry]\nattempts = 2\n",
        )
        .unwrap();
        unsafe {
            env::set_var("ATOMFILE_STRATEGY", "lock");
            env::set_var("ATOMFILE_RETRY_ATTEMPTS", "9");
        }

        let config = resolve_config(&ConfigOverrides::default(), Some(temp_dir.path())).unwrap();
        assert_eq!(config.strategy, Strategy::Lock);
        assert_eq!(config.retry.attempts, 9);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_ignored() {
        clear_env();
        unsafe {
            env::set_var("ATOMFILE_SHARING", "exclusive");
            env::set_var("ATOMFILE_RETRY_DELAY_MS", "soon");
        }

        let config = resolve_config(&ConfigOverrides::default(), None).unwrap();
        assert_eq!(config.sharing, SharingMode::Strict);
        assert_eq!(config.retry.delay_ms, 1);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_explicit_overrides_win() {
        clear_env();
        unsafe {
            env::set_var("ATOMFILE_STRATEGY", "lock");
        }
        let overrides = ConfigOverrides {
            strategy: Some(Strategy::Rename),
            sync_writes: Some(false),
            retry_delay_ms: Some(5),
            ..Default::default()
        };

        let config = resolve_config(&overrides, None).unwrap();
        assert_eq!(config.strategy, Strategy::Rename);
        assert!(!config.sync_writes);
        assert_eq!(config.retry.delay_ms, 5);
        clear_env();
    }
}
