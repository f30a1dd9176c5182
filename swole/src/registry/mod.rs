//! Package registry: loading, indexing, querying and saving packages.
//!
//! # Layout
//!
//! ```text
//! <packages-root>/
//! ├── local/
//! │   └── mypack-v1.0/
//! │       ├── manifest.json
//! │       ├── main.swlua
//! │       └── level.swcreation
//! ├── external/
//! │   └── shared-2.0.swole
//! ├── cache/
//! └── projects.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use swole::registry::{PackageFilter, Registry, RegistryConfig};
//!
//! let mut registry = Registry::new(RegistryConfig::default());
//! registry.scan_local();
//! registry.scan_external();
//!
//! if let Some(found) = registry.find_package("mypack", None, PackageFilter::Any) {
//!     println!("{} ({:?})", found.package.display_name(), found.mode);
//! }
//! ```

mod archive;
mod config;
mod download;
mod error;
mod loader;
mod manager;
mod packages;
mod projects;
mod query;
mod runtime;
mod save;

pub use archive::{
    read_entries, read_entries_async, read_entries_limited, write_entries, ArchiveEntry, ArchiveError,
    DEFAULT_ENTRY_LIMIT,
};
pub use config::{RegistryConfig, DEFAULT_LOCAL_DOWNLOAD_LIMIT, DEFAULT_NETWORK_DOWNLOAD_LIMIT};
pub use download::{
    BoundedDownload, DownloadError, DownloadOutcome, DownloadPolicy, Downloader, FileTransport,
    HttpTransport, ProgressFn, RoutingTransport, TransferProgress, Transport,
};
pub use error::{RegistryError, RegistryResult};
pub use loader::{ArchiveOrigin, LoadContext, Loader};
pub use manager::Registry;
pub use packages::{Embedding, ExternalPackage, LocalPackage, Package, PackageKind};
pub use projects::{ProjectIndex, ProjectIndexFile, ProjectRecord, ProjectSaveOutcome};
pub use query::{MatchMode, PackageFilter, PackageMatch, PackageRef};
pub use runtime::{NullScriptRuntime, ScriptRuntime};
pub use save::{save_package, SaveReport, StagedSave};
