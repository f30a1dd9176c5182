//! Error types for the registry.

use std::io;
use std::path::PathBuf;

use super::ArchiveError;
use crate::package::PackageIdentifier;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while loading, indexing or saving packages.
#[derive(Debug)]
pub enum RegistryError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// No manifest at the package root.
    ManifestNotFound(String),

    /// The manifest could not be decoded.
    InvalidManifest { location: String, reason: String },

    /// The package name fails the name grammar.
    InvalidName(String),

    /// The package version fails the version grammar.
    InvalidVersion { name: String, version: String },

    /// A package with the same identity is already indexed.
    DuplicatePackage(PackageIdentifier),

    /// No indexed package matches.
    PackageNotFound(String),

    /// Archive encoding or decoding failed.
    Archive(ArchiveError),

    /// A content item could not be encoded.
    EncodeFailed { name: String, reason: String },

    /// Could not start an async runtime for a blocking call.
    RuntimeCreation(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::ManifestNotFound(location) => {
                write!(f, "no manifest found in {}", location)
            }
            Self::InvalidManifest { location, reason } => {
                write!(f, "invalid manifest in {}: {}", location, reason)
            }
            Self::InvalidName(name) => write!(f, "invalid package name '{}'", name),
            Self::InvalidVersion { name, version } => {
                write!(f, "invalid version '{}' for package '{}'", version, name)
            }
            Self::DuplicatePackage(id) => write!(f, "package {} is already loaded", id),
            Self::PackageNotFound(what) => write!(f, "package not found: {}", what),
            Self::Archive(e) => write!(f, "archive error: {}", e),
            Self::EncodeFailed { name, reason } => {
                write!(f, "failed to encode '{}': {}", name, reason)
            }
            Self::RuntimeCreation(msg) => write!(f, "failed to create async runtime: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::Archive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for RegistryError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}
