//! User configuration file (`config.ini`).
//!
//! # Example
//!
//! ```ini
//! [registry]
//! packages_root = /home/me/.local/share/swole/packages
//! cache_dir = /home/me/.cache/swole
//! project_index = /home/me/.local/share/swole/packages/projects.json
//! liberal_matching = true
//!
//! [downloads]
//! local_limit = 50000000
//! network_limit = 25000000
//! timeout_secs = 30
//! archive_entry_limit = 100000000
//!
//! [logging]
//! level = info
//! directory = /home/me/.local/state/swole/logs
//! ```
//!
//! Missing keys, sections or the whole file fall back to defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::registry::RegistryConfig;

const REGISTRY_SECTION: &str = "registry";
const DOWNLOADS_SECTION: &str = "downloads";
const LOGGING_SECTION: &str = "logging";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Settings read from `config.ini`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

/// `<config dir>/swole/config.ini`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("swole")
        .join("config.ini")
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| ini.section(Some(section)).and_then(|s| s.get(key));

        if let Some(root) = get(REGISTRY_SECTION, "packages_root") {
            let defaults = RegistryConfig::new(PathBuf::from(root));
            config.registry.packages_root = defaults.packages_root;
            config.registry.cache_dir = defaults.cache_dir;
            config.registry.project_index_path = defaults.project_index_path;
        }
        if let Some(dir) = get(REGISTRY_SECTION, "cache_dir") {
            config.registry.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(REGISTRY_SECTION, "project_index") {
            config.registry.project_index_path = PathBuf::from(path);
        }
        if let Some(value) = get(REGISTRY_SECTION, "liberal_matching") {
            config.registry.liberal_matching = parse_value(REGISTRY_SECTION, "liberal_matching", value)?;
        }

        if let Some(value) = get(DOWNLOADS_SECTION, "local_limit") {
            config.registry.local_download_limit = parse_value(DOWNLOADS_SECTION, "local_limit", value)?;
        }
        if let Some(value) = get(DOWNLOADS_SECTION, "network_limit") {
            config.registry.network_download_limit = parse_value(DOWNLOADS_SECTION, "network_limit", value)?;
        }
        if let Some(value) = get(DOWNLOADS_SECTION, "timeout_secs") {
            let secs: u64 = parse_value(DOWNLOADS_SECTION, "timeout_secs", value)?;
            config.registry.download_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get(DOWNLOADS_SECTION, "archive_entry_limit") {
            config.registry.archive_entry_limit = parse_value(DOWNLOADS_SECTION, "archive_entry_limit", value)?;
        }

        if let Some(level) = get(LOGGING_SECTION, "level") {
            config.logging.level = level.to_string();
        }
        if let Some(dir) = get(LOGGING_SECTION, "directory") {
            config.logging.directory = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = get(LOGGING_SECTION, "file_prefix") {
            config.logging.file_prefix = prefix.to_string();
        }

        Ok(config)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        let registry = &self.registry;
        ini.with_section(Some(REGISTRY_SECTION))
            .set("packages_root", registry.packages_root.display().to_string())
            .set("cache_dir", registry.cache_dir.display().to_string())
            .set("project_index", registry.project_index_path.display().to_string())
            .set("liberal_matching", registry.liberal_matching.to_string());
        ini.with_section(Some(DOWNLOADS_SECTION))
            .set("local_limit", registry.local_download_limit.to_string())
            .set("network_limit", registry.network_download_limit.to_string())
            .set("timeout_secs", registry.download_timeout.as_secs().to_string())
            .set("archive_entry_limit", registry.archive_entry_limit.to_string());

        let mut logging = ini.with_section(Some(LOGGING_SECTION));
        logging.set("level", self.logging.level.clone());
        logging.set("file_prefix", self.logging.file_prefix.clone());
        if let Some(dir) = &self.logging.directory {
            logging.set("directory", dir.display().to_string());
        }

        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(write_error)
    }

    pub fn to_registry_config(&self) -> RegistryConfig {
        self.registry.clone()
    }
}

fn parse_value<T: FromStr>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
    })
}
