//! Package identity, manifests and the package data model.
//!
//! # Overview
//!
//! - **PackageIdentifier**: name plus ordered version
//! - **PackageInfo** / **PackageManifest**: the persisted descriptor
//! - **ContentPackage**: an immutable snapshot of a manifest and its content
//! - **SwolePackage**: the copy-on-write editor producing new snapshots
//!
//! # Type Hierarchy
//!
//! ```text
//! SwolePackage (editor)             ContentPackage (snapshot)
//! ├── current ──────────────────→   ├── manifest: PackageManifest
//! └── orphans: Vec<ContentRef>      │   ├── info: PackageInfo
//!                                   │   └── dependencies: Vec<PackageIdentifier>
//!                                   ├── content: im::Vector<ContentRef>
//!                                   └── source (cached script-only snapshot)
//! ```
//!
//! # File Layout
//!
//! A package on disk is a directory (or a `.swole` archive) with
//! `manifest.json` at its root and one file per content item, named
//! `{item}.{extension}`. The naming functions re-exported here build every
//! one of those names.

mod content_package;
mod identifier;
mod info;
mod manifest;
mod naming;
mod swole;

pub use content_package::{ContentPackage, DisposalSummary};
pub use identifier::{PackageIdentifier, PackageVersion, VersionParseError};
pub use info::{PackageInfo, MAX_NAME_LENGTH, MIN_NAME_LENGTH};
pub use manifest::PackageManifest;
pub use swole::SwolePackage;

// Naming utilities
pub use naming::{
    archive_filename, content_filename, embedded_cache_path, is_archive_filename, liberal_id,
    local_directory_name, sanitize_file_stem, ARCHIVE_EXTENSION, EMBEDDED_CACHE_DIR, EMBEDDED_MARKER,
    MANIFEST_FILENAME,
};
