//! The package registry.
//!
//! A [`Registry`] indexes local packages (editable directories) and external
//! packages (read-only archives) and owns the collaborators they need: the
//! kind registry, the bounded downloader, the script runtime and the project
//! index. There is no global instance; callers hold the value and pass it by
//! reference.
//!
//! Every operation that does I/O has an `_async` form. The plain form
//! creates a current-thread runtime and blocks on the async one, so it must
//! not be called from inside a Tokio runtime.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::archive::{write_entries, ArchiveEntry};
use super::config::RegistryConfig;
use super::download::{DownloadPolicy, Downloader, RoutingTransport, Transport};
use super::error::{RegistryError, RegistryResult};
use super::loader::{ArchiveOrigin, Loader};
use super::packages::{ExternalPackage, LocalPackage, Package};
use super::projects::{read_index, write_index, write_outcome, ProjectIndex, ProjectSaveOutcome};
use super::query::{self, MatchMode, PackageFilter, PackageMatch, PackageRef};
use super::runtime::{NullScriptRuntime, ScriptRuntime};
use super::save::{content_path, encode_content, save_package, SaveReport};
use crate::content::KindRegistry;
use crate::package::{
    archive_filename, is_archive_filename, local_directory_name, ContentPackage, PackageIdentifier,
    PackageInfo, PackageManifest, PackageVersion, MANIFEST_FILENAME,
};

/// Indexes local and external content packages.
pub struct Registry {
    config: RegistryConfig,
    kinds: Arc<KindRegistry>,
    downloader: Downloader,
    runtime: Arc<dyn ScriptRuntime>,
    local: Vec<LocalPackage>,
    external: Vec<ExternalPackage>,
    projects: ProjectIndex,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("local", &self.local.len())
            .field("external", &self.external.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry with the standard kinds.
    pub fn new(config: RegistryConfig) -> Self {
        let policy = DownloadPolicy::new(config.local_download_limit, config.network_download_limit);
        let transport = Arc::new(RoutingTransport::new(config.download_timeout));
        Self {
            kinds: Arc::new(KindRegistry::standard()),
            downloader: Downloader::new(transport, policy),
            runtime: Arc::new(NullScriptRuntime),
            local: Vec::new(),
            external: Vec::new(),
            projects: ProjectIndex::new(config.project_index_path.clone()),
            config,
        }
    }

    /// Set the script runtime that receives package sources.
    pub fn with_runtime(mut self, runtime: Arc<dyn ScriptRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Replace the download transport. The size policy is kept.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.downloader = Downloader::new(transport, self.downloader.policy());
        self
    }

    pub fn with_kinds(mut self, kinds: KindRegistry) -> Self {
        self.kinds = Arc::new(kinds);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn kinds(&self) -> &Arc<KindRegistry> {
        &self.kinds
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    fn loader(&self) -> Loader<'_> {
        Loader::new(&self.kinds, Some(&self.downloader)).with_entry_limit(self.config.archive_entry_limit)
    }

    // ---- local packages ----

    /// Load every package directory under the local root.
    ///
    /// Returns how many packages were added.
    pub async fn scan_local_async(&mut self) -> usize {
        let root = self.config.local_root();
        let dirs = match list_dir(&root).await {
            Ok(entries) => entries.into_iter().filter(|p| p.is_dir()).collect::<Vec<_>>(),
            Err(e) => {
                debug!(path = %root.display(), error = %e, "No local packages");
                return 0;
            }
        };

        let mut added = 0;
        for dir in dirs {
            if self.load_local_package_async(&dir).await.is_some() {
                added += 1;
            }
        }
        info!(path = %root.display(), added, "Scanned local packages");
        added
    }

    pub fn scan_local(&mut self) -> usize {
        blocking(self.scan_local_async(), 0)
    }

    /// Load and index the package in `dir`.
    pub async fn load_local_package_async(&mut self, dir: &Path) -> Option<PackageIdentifier> {
        let package = match self.loader().load_directory(dir).await {
            Ok(package) => package,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Failed to load local package");
                return None;
            }
        };

        if let Err(e) = self.validate_local(package.manifest()) {
            error!(path = %dir.display(), error = %e, "Rejected local package");
            package.dispose_all();
            return None;
        }
        self.add_local_package(dir.to_path_buf(), package).ok()
    }

    pub fn load_local_package(&mut self, dir: &Path) -> Option<PackageIdentifier> {
        blocking(self.load_local_package_async(dir), None)
    }

    fn validate_local(&self, manifest: &PackageManifest) -> RegistryResult<PackageIdentifier> {
        let id = validate(&manifest.info)?;
        if self.local.iter().any(|p| p.identifier().as_ref() == Some(&id)) {
            return Err(RegistryError::DuplicatePackage(id));
        }
        Ok(id)
    }

    /// Index `package` as a local package stored in `working_dir`.
    ///
    /// Fails if the name or version is invalid or the identity is taken.
    pub fn add_local_package(
        &mut self,
        working_dir: PathBuf,
        package: ContentPackage,
    ) -> RegistryResult<PackageIdentifier> {
        let id = self.validate_local(package.manifest()).inspect_err(|e| {
            error!(path = %working_dir.display(), error = %e, "Rejected local package");
        })?;

        let local = LocalPackage::new(working_dir, package);
        if let Some(current) = local.current() {
            self.runtime.load_source(&id, current.source_package());
        }
        debug!(package = %id, path = %local.working_dir.display(), "Added local package");
        self.local.push(local);
        Ok(id)
    }

    /// Index a new, empty local package under the local root.
    ///
    /// Nothing is written until the package is saved.
    pub fn create_local_package(&mut self, info: PackageInfo) -> RegistryResult<PackageIdentifier> {
        let id = validate(&info)?;
        let dir = self.config.local_root().join(local_directory_name(&id));
        self.add_local_package(dir, ContentPackage::empty(PackageManifest::new(info)))
    }

    pub fn local_package(&self, id: &PackageIdentifier) -> Option<&LocalPackage> {
        self.local.iter().find(|p| p.identifier().as_ref() == Some(id))
    }

    /// Mutable access to a local package for editing.
    pub fn edit_local_package(&mut self, id: &PackageIdentifier) -> Option<&mut LocalPackage> {
        self.local.iter_mut().find(|p| p.identifier().as_ref() == Some(id))
    }

    /// Save a local package to its working directory.
    ///
    /// Orphans of the package are disposed after the attempt, whatever its
    /// outcome. Returns `None` if no such package is indexed.
    pub async fn save_local_package_async(&mut self, id: &PackageIdentifier) -> Option<SaveReport> {
        let index = match self.local_index(id) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Cannot save local package");
                return None;
            }
        };
        let local = &self.local[index];
        let target = local.working_dir.clone();
        let package = local.current().cloned();

        let report = match package {
            Some(package) => save_package(target, package, Arc::clone(&self.kinds)).await,
            None => SaveReport::Catastrophic {
                reason: "package has no content".to_string(),
            },
        };

        let summary = self.local[index].dispose_orphaned_content();
        match &report {
            SaveReport::Saved { .. } => info!(package = %id, %report, %summary, "Saved local package"),
            _ => warn!(package = %id, %report, %summary, "Local package not fully saved"),
        }
        Some(report)
    }

    pub fn save_local_package(&mut self, id: &PackageIdentifier) -> Option<SaveReport> {
        blocking(self.save_local_package_async(id), None)
    }

    fn local_index(&self, id: &PackageIdentifier) -> RegistryResult<usize> {
        self.local
            .iter()
            .position(|p| p.identifier().as_ref() == Some(id))
            .ok_or_else(|| RegistryError::PackageNotFound(format!("local {}", id)))
    }

    // ---- external packages ----

    /// Load every `.swole` archive under the external root.
    ///
    /// Returns how many packages were indexed, embedded ones included.
    pub async fn scan_external_async(&mut self) -> usize {
        let root = self.config.external_root();
        let archives = match list_dir(&root).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|p| {
                    p.is_file()
                        && p.file_name()
                            .is_some_and(|n| is_archive_filename(&n.to_string_lossy()))
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                debug!(path = %root.display(), error = %e, "No external packages");
                return 0;
            }
        };

        let mut added = 0;
        for archive in archives {
            added += self.load_external_package_async(&archive).await.len();
        }
        info!(path = %root.display(), added, "Scanned external packages");
        added
    }

    pub fn scan_external(&mut self) -> usize {
        blocking(self.scan_external_async(), 0)
    }

    /// Load the archive at `path` and index it with its embedded packages.
    pub async fn load_external_package_async(&mut self, path: &Path) -> Vec<PackageIdentifier> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read package archive");
                return Vec::new();
            }
        };
        let origin = ArchiveOrigin::from_file(path.to_path_buf(), self.config.cache_dir.clone());
        self.load_archive(bytes, origin).await
    }

    pub fn load_external_package(&mut self, path: &Path) -> Vec<PackageIdentifier> {
        blocking(self.load_external_package_async(path), Vec::new())
    }

    /// Load an archive held in memory.
    pub async fn load_external_bytes_async(&mut self, bytes: Vec<u8>) -> Vec<PackageIdentifier> {
        let origin = ArchiveOrigin::from_buffer(self.config.cache_dir.clone());
        self.load_archive(bytes, origin).await
    }

    pub fn load_external_bytes(&mut self, bytes: Vec<u8>) -> Vec<PackageIdentifier> {
        blocking(self.load_external_bytes_async(bytes), Vec::new())
    }

    async fn load_archive(&mut self, bytes: Vec<u8>, origin: ArchiveOrigin) -> Vec<PackageIdentifier> {
        let location = origin
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<buffer>".to_string());
        let packages = match self.loader().load_archive(bytes, origin).await {
            Ok(packages) => packages,
            Err(e) => {
                error!(archive = %location, error = %e, "Failed to load package archive");
                return Vec::new();
            }
        };

        packages
            .into_iter()
            .filter_map(|package| self.add_external_package(package))
            .collect()
    }

    fn add_external_package(&mut self, package: ExternalPackage) -> Option<PackageIdentifier> {
        let validated = validate(&package.package().manifest().info).and_then(|id| {
            if self.external.iter().any(|p| p.identifier().as_ref() == Some(&id)) {
                Err(RegistryError::DuplicatePackage(id))
            } else {
                Ok(id)
            }
        });

        match validated {
            Ok(id) => {
                self.runtime.load_source(&id, package.package().source_package());
                debug!(package = %package.display_name(), "Added external package");
                self.external.push(package);
                Some(id)
            }
            Err(e) => {
                error!(package = %package.display_name(), error = %e, "Rejected external package");
                package.package().dispose_all();
                None
            }
        }
    }

    /// Pack an indexed package into `<name>-<version>.swole` in `destination`.
    pub async fn export_archive_async(
        &self,
        id: &PackageIdentifier,
        filter: PackageFilter,
        destination: &Path,
    ) -> Option<PathBuf> {
        let package = self
            .find_package(&id.name, Some(&id.version), filter)
            .filter(|m| m.mode == MatchMode::Exact)
            .and_then(|m| m.package.content());
        let Some(package) = package else {
            warn!(error = %RegistryError::PackageNotFound(id.to_string()), "Cannot export package");
            return None;
        };

        let entries = match self.archive_entries(&package) {
            Ok(entries) => entries,
            Err(e) => {
                error!(package = %id, error = %e, "Failed to encode package for export");
                return None;
            }
        };

        let path = destination.join(archive_filename(id));
        let written = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> RegistryResult<()> {
                let bytes = write_entries(&entries)?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|source| RegistryError::CreateDirFailed {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                std::fs::write(&path, bytes).map_err(|source| RegistryError::WriteFailed { path, source })
            })
            .await
        };

        match written {
            Ok(Ok(())) => {
                info!(package = %id, path = %path.display(), "Exported package archive");
                Some(path)
            }
            Ok(Err(e)) => {
                error!(package = %id, error = %e, "Failed to write package archive");
                None
            }
            Err(e) => {
                error!(package = %id, error = %e, "Archive worker failed");
                None
            }
        }
    }

    pub fn export_archive(
        &self,
        id: &PackageIdentifier,
        filter: PackageFilter,
        destination: &Path,
    ) -> Option<PathBuf> {
        blocking(self.export_archive_async(id, filter, destination), None)
    }

    fn archive_entries(&self, package: &ContentPackage) -> RegistryResult<Vec<ArchiveEntry>> {
        let manifest = package
            .manifest()
            .to_bytes()
            .map_err(|e| RegistryError::EncodeFailed {
                name: MANIFEST_FILENAME.to_string(),
                reason: e.to_string(),
            })?;
        let mut entries = vec![ArchiveEntry::new(MANIFEST_FILENAME, manifest)];

        for item in package.iter() {
            let encoded = content_path(&self.kinds, item.as_ref()).and_then(|path| {
                encode_content(&self.kinds, item.as_ref())
                    .map(|bytes| (path, bytes))
                    .map_err(|e| RegistryError::EncodeFailed {
                        name: item.name().to_string(),
                        reason: e.to_string(),
                    })
            });
            match encoded {
                Ok((path, bytes)) => {
                    let name = path.to_string_lossy().replace('\\', "/");
                    if entries.iter().any(|e| e.name == name) {
                        warn!(item = item.name(), entry = %name, "Skipping duplicate archive entry");
                        continue;
                    }
                    entries.push(ArchiveEntry::new(name, bytes));
                }
                Err(e) => warn!(item = item.name(), error = %e, "Skipping content item on export"),
            }
        }
        Ok(entries)
    }

    // ---- lifecycle ----

    /// Remove a package from the index and dispose it.
    pub fn unload_package(&mut self, id: &PackageIdentifier, filter: PackageFilter) -> bool {
        let mut unloaded = false;
        if filter != PackageFilter::External {
            if let Ok(index) = self.local_index(id) {
                let mut package = self.local.remove(index);
                package.dispose(self.runtime.as_ref());
                unloaded = true;
            }
        }
        if filter != PackageFilter::Local {
            if let Some(index) = self.external.iter().position(|p| p.identifier().as_ref() == Some(id)) {
                let mut package = self.external.remove(index);
                package.dispose(self.runtime.as_ref());
                unloaded = true;
            }
        }
        if unloaded {
            info!(package = %id, "Unloaded package");
        } else {
            debug!(package = %id, "Nothing to unload");
        }
        unloaded
    }

    /// Dispose every indexed package.
    pub fn unload_all(&mut self) {
        for mut package in self.local.drain(..) {
            package.dispose(self.runtime.as_ref());
        }
        for mut package in self.external.drain(..) {
            package.dispose(self.runtime.as_ref());
        }
    }

    /// Fetch an asset under the download size policy. Empty on failure.
    pub async fn download_asset_async(&self, uri: &str) -> Vec<u8> {
        self.downloader.download(uri).await
    }

    pub fn download_asset(&self, uri: &str) -> Vec<u8> {
        blocking(self.download_asset_async(uri), Vec::new())
    }

    // ---- queries ----

    /// Find a package by name and optional version.
    ///
    /// Without a version the greatest indexed version is returned. When
    /// liberal matching is enabled a miss is retried once with normalized
    /// names, and the result says so.
    pub fn find_package(
        &self,
        name: &str,
        version: Option<&PackageVersion>,
        filter: PackageFilter,
    ) -> Option<PackageMatch<'_>> {
        let candidates = query::candidates(&self.local, &self.external, filter);
        let (package, mode) = query::select(&candidates, name, version, self.config.liberal_matching)?;
        if mode == MatchMode::Liberal {
            debug!(requested = name, found = %package.display_name(), "Package matched liberally");
        }
        Some(PackageMatch { package, mode })
    }

    pub fn find_local_package(
        &self,
        name: &str,
        version: Option<&PackageVersion>,
    ) -> Option<(&LocalPackage, MatchMode)> {
        let found = self.find_package(name, version, PackageFilter::Local)?;
        found.package.as_local().map(|p| (p, found.mode))
    }

    pub fn find_external_package(
        &self,
        name: &str,
        version: Option<&PackageVersion>,
    ) -> Option<(&ExternalPackage, MatchMode)> {
        let found = self.find_package(name, version, PackageFilter::External)?;
        found.package.as_external().map(|p| (p, found.mode))
    }

    /// Every version of the packages named `name`, by identity descending.
    pub fn list_packages_by_name(&self, name: &str, filter: PackageFilter) -> Vec<PackageRef<'_>> {
        let candidates = query::candidates(&self.local, &self.external, filter);
        query::list_by_name(&candidates, name, self.config.liberal_matching)
            .into_iter()
            .map(|(package, _)| package)
            .collect()
    }

    pub fn local_packages(&self) -> &[LocalPackage] {
        &self.local
    }

    pub fn external_packages(&self) -> &[ExternalPackage] {
        &self.external
    }

    // ---- projects ----

    pub fn projects(&self) -> &ProjectIndex {
        &self.projects
    }

    pub fn projects_mut(&mut self) -> &mut ProjectIndex {
        &mut self.projects
    }

    /// Indexed packages whose name is assigned to `project`.
    pub fn packages_in_project(&self, project: &str) -> Vec<PackageRef<'_>> {
        let names = self.projects.packages_in_project(project);
        query::candidates(&self.local, &self.external, PackageFilter::Any)
            .into_iter()
            .filter(|(_, id)| names.contains(&id.name.as_str()))
            .map(|(package, _)| package)
            .collect()
    }

    /// Re-read the project index file. Packages are not touched.
    pub async fn reload_projects_async(&mut self) -> bool {
        let path = self.projects.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || read_index(&path)).await;
        match result {
            Ok(Ok(data)) => {
                self.projects.replace_data(data);
                true
            }
            Ok(Err(e)) => {
                warn!(path = %self.projects.path().display(), error = %e, "Failed to load project index");
                false
            }
            Err(e) => {
                warn!(error = %e, "Project index worker failed");
                false
            }
        }
    }

    pub fn reload_projects(&mut self) -> bool {
        blocking(self.reload_projects_async(), false)
    }

    /// Write the project index. Dropped if a save is already in flight.
    pub async fn save_projects_async(&self) -> ProjectSaveOutcome {
        let Some(guard) = self.projects.begin_save() else {
            debug!("Project index save already in flight, dropping request");
            return ProjectSaveOutcome::Dropped;
        };
        let path = self.projects.path().to_path_buf();
        let data = self.projects.data().clone();

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = write_index(&path, &data);
            write_outcome(&path, result)
        })
        .await;
        result.unwrap_or_else(|e| ProjectSaveOutcome::Failed(e.to_string()))
    }

    pub fn save_projects(&self) -> ProjectSaveOutcome {
        blocking(self.save_projects_async(), ProjectSaveOutcome::Failed("no runtime".to_string()))
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.unload_all();
    }
}

/// Check the name and version grammar.
fn validate(info: &PackageInfo) -> RegistryResult<PackageIdentifier> {
    if !info.is_valid_name() {
        return Err(RegistryError::InvalidName(info.name.clone()));
    }
    match info.identifier() {
        Some(id) if info.is_valid_version() => Ok(id),
        _ => Err(RegistryError::InvalidVersion {
            name: info.name.clone(),
            version: info.version.clone(),
        }),
    }
}

/// Entries of `dir` sorted by path.
async fn list_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn block_on<F: Future>(future: F) -> RegistryResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RegistryError::RuntimeCreation(e.to_string()))?;
    Ok(runtime.block_on(future))
}

/// Run `future` to completion, or log and return `fallback`.
fn blocking<F: Future>(future: F, fallback: F::Output) -> F::Output {
    block_on(future).unwrap_or_else(|e| {
        error!(error = %e, "Blocking registry call failed");
        fallback
    })
}
