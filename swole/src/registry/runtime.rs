//! The seam to the host's script runtime.

use std::sync::Arc;

use crate::package::{ContentPackage, PackageIdentifier};

/// Receives the script content of every package the registry indexes.
///
/// The runtime is handed the package's source sub-package when the package
/// is added, and asked to unload it before the package is disposed.
pub trait ScriptRuntime: Send + Sync {
    fn load_source(&self, package: &PackageIdentifier, source: Arc<ContentPackage>);

    fn unload_source(&self, package: &PackageIdentifier);
}

/// A runtime that ignores every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScriptRuntime;

impl ScriptRuntime for NullScriptRuntime {
    fn load_source(&self, _package: &PackageIdentifier, _source: Arc<ContentPackage>) {}

    fn unload_source(&self, _package: &PackageIdentifier) {}
}
