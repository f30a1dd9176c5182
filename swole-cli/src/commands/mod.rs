//! CLI subcommands.

pub mod packages;
pub mod projects;

use swole::config::ConfigFile;
use swole::package::PackageVersion;
use swole::Registry;

use crate::error::CliError;

/// Open the registry described by `config` and index every package.
pub fn open_registry(config: &ConfigFile) -> Registry {
    let mut registry = Registry::new(config.to_registry_config());
    let local = registry.scan_local();
    let external = registry.scan_external();
    if !registry.reload_projects() {
        tracing::warn!("Continuing without project assignments");
    }
    tracing::debug!(local, external, "Indexed packages");
    registry
}

/// Parse an optional version argument.
pub fn parse_version(version: Option<&str>) -> Result<Option<PackageVersion>, CliError> {
    version
        .map(|v| PackageVersion::parse(v).map_err(|e| CliError::InvalidVersion(e.to_string())))
        .transpose()
}
