//! Configuration for the registry.

use std::path::PathBuf;
use std::time::Duration;

use super::archive::DEFAULT_ENTRY_LIMIT;

/// Default ceiling for `file://` downloads.
pub const DEFAULT_LOCAL_DOWNLOAD_LIMIT: u64 = 50_000_000;

/// Default ceiling for network downloads.
pub const DEFAULT_NETWORK_DOWNLOAD_LIMIT: u64 = 25_000_000;


/// Configuration for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Root holding the `local/` and `external/` package directories.
    pub packages_root: PathBuf,

    /// Directory where external packages keep derived files.
    pub cache_dir: PathBuf,

    /// Location of the project index file.
    pub project_index_path: PathBuf,

    /// Largest accepted `file://` download, in bytes.
    pub local_download_limit: u64,

    /// Largest accepted network download, in bytes.
    pub network_download_limit: u64,

    /// HTTP request timeout.
    pub download_timeout: Duration,

    /// Largest accepted archive entry, nested archives included, in bytes.
    pub archive_entry_limit: u64,

    /// Whether lookups retry with a normalized name.
    pub liberal_matching: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("swole")
            .join("packages");
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("swole");
        Self {
            project_index_path: root.join("projects.json"),
            packages_root: root,
            cache_dir,
            local_download_limit: DEFAULT_LOCAL_DOWNLOAD_LIMIT,
            network_download_limit: DEFAULT_NETWORK_DOWNLOAD_LIMIT,
            download_timeout: Duration::from_secs(30),
            archive_entry_limit: DEFAULT_ENTRY_LIMIT,
            liberal_matching: true,
        }
    }
}

impl RegistryConfig {
    /// Create a configuration rooted at `packages_root`.
    ///
    /// The cache and the project index are placed under the same root.
    pub fn new(packages_root: PathBuf) -> Self {
        Self {
            cache_dir: packages_root.join("cache"),
            project_index_path: packages_root.join("projects.json"),
            packages_root,
            ..Default::default()
        }
    }

    /// Directory holding local (editable) packages.
    pub fn local_root(&self) -> PathBuf {
        self.packages_root.join("local")
    }

    /// Directory holding external package archives.
    pub fn external_root(&self) -> PathBuf {
        self.packages_root.join("external")
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, path: PathBuf) -> Self {
        self.cache_dir = path;
        self
    }

    /// Set the project index location.
    pub fn with_project_index(mut self, path: PathBuf) -> Self {
        self.project_index_path = path;
        self
    }

    /// Set both download ceilings.
    pub fn with_download_limits(mut self, local: u64, network: u64) -> Self {
        self.local_download_limit = local;
        self.network_download_limit = network;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the per-entry ceiling for archive reads.
    pub fn with_archive_entry_limit(mut self, limit: u64) -> Self {
        self.archive_entry_limit = limit;
        self
    }

    /// Enable or disable liberal name matching.
    pub fn with_liberal_matching(mut self, enabled: bool) -> Self {
        self.liberal_matching = enabled;
        self
    }
}
