//! CLI error type.

use std::fmt;

/// Errors reported to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// The configuration file could not be loaded.
    Config(String),
    /// Logging could not be set up.
    Logging(String),
    /// A version argument did not parse.
    InvalidVersion(String),
    /// No indexed package matched.
    PackageNotFound(String),
    /// Exporting an archive failed.
    Export(String),
    /// Saving the project index failed.
    Projects(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::InvalidVersion(msg) => write!(f, "Invalid version: {}", msg),
            CliError::PackageNotFound(what) => write!(f, "Package not found: {}", what),
            CliError::Export(msg) => write!(f, "Export failed: {}", msg),
            CliError::Projects(msg) => write!(f, "Project index error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}
