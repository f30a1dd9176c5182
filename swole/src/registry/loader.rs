//! Package loading: directories, archives and per-entry type dispatch.
//!
//! # Load sequence
//!
//! ```text
//! scan ──► manifest found? ──no──► ManifestNotFound (logged by caller)
//!              │yes
//!              ▼
//!        for each entry (storage order)
//!          classify ──► content ──► codec decode ──► post-process ──► live
//!                   ──► nested .swole ──► recurse (indexed separately)
//!                   ──► unknown ──► ignored
//!              ▼
//!        ContentPackage::new (reconciles dependencies)
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use reqwest::Url;
use tracing::{debug, warn};

use super::archive::{read_entries_async, DEFAULT_ENTRY_LIMIT};
use super::download::Downloader;
use super::error::{RegistryError, RegistryResult};
use super::packages::{Embedding, ExternalPackage};
use crate::content::{
    AssetResolver, BoxFuture, Content, ContentKind, ContentRef, EntryClass, KindRegistry,
};
use crate::package::{
    embedded_cache_path, local_directory_name, sanitize_file_stem, ContentPackage, PackageInfo,
    PackageManifest, MANIFEST_FILENAME,
};

fn final_component(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}

/// Resolves image sources while one package is being loaded.
///
/// Lookup order: files of the same batch by filename, then the package
/// directory, then a bounded download for URIs. Directory lookups never
/// leave the package directory.
pub struct LoadContext<'a> {
    batch: HashMap<&'a str, &'a [u8]>,
    local_dir: Option<&'a Path>,
    downloader: Option<&'a Downloader>,
}

impl<'a> LoadContext<'a> {
    pub fn new(local_dir: Option<&'a Path>, downloader: Option<&'a Downloader>) -> Self {
        Self {
            batch: HashMap::new(),
            local_dir,
            downloader,
        }
    }

    /// Make a batch file available by its filename.
    pub fn insert(&mut self, path: &'a str, bytes: &'a [u8]) {
        self.batch.insert(final_component(path), bytes);
    }
}

impl AssetResolver for LoadContext<'_> {
    fn resolve<'b>(&'b self, source: &'b str) -> BoxFuture<'b, Option<Vec<u8>>> {
        Box::pin(async move {
            if let Some(bytes) = self.batch.get(final_component(source)) {
                return Some(bytes.to_vec());
            }

            let is_uri = Url::parse(source).is_ok_and(|url| url.scheme().len() > 1);
            if let (Some(dir), false) = (self.local_dir, is_uri) {
                if let Some(path) = path_within(dir, source).await {
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => return Some(bytes),
                        Err(e) => debug!(source, error = %e, "Asset source not in package directory"),
                    }
                }
            }

            if let (Some(downloader), true) = (self.downloader, is_uri) {
                let bytes = downloader.download(source).await;
                if !bytes.is_empty() {
                    return Some(bytes);
                }
            }
            None
        })
    }
}

/// `source` resolved under `dir`, or `None` if it is missing or points
/// outside `dir` (absolute, `..`, or through a symlink).
async fn path_within(dir: &Path, source: &str) -> Option<PathBuf> {
    let relative = Path::new(source);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        warn!(source, "Rejecting asset source outside the package directory");
        return None;
    }

    let root = tokio::fs::canonicalize(dir).await.ok()?;
    let path = match tokio::fs::canonicalize(dir.join(relative)).await {
        Ok(path) => path,
        Err(e) => {
            debug!(source, error = %e, "Asset source not in package directory");
            return None;
        }
    };
    if !path.starts_with(&root) {
        warn!(source, path = %path.display(), "Rejecting asset source outside the package directory");
        return None;
    }
    Some(path)
}

/// Where an archive came from.
#[derive(Debug, Clone)]
pub struct ArchiveOrigin {
    /// Archive file on disk, if any.
    pub source_path: Option<PathBuf>,
    /// Location used for content origin paths and log messages.
    pub location: Option<PathBuf>,
    /// Root under which cache paths are allocated.
    pub cache_root: PathBuf,
    /// Set for archives nested in another package.
    pub embedding: Option<Embedding>,
}

impl ArchiveOrigin {
    pub fn from_file(path: PathBuf, cache_root: PathBuf) -> Self {
        Self {
            location: Some(path.clone()),
            source_path: Some(path),
            cache_root,
            embedding: None,
        }
    }

    pub fn from_buffer(cache_root: PathBuf) -> Self {
        Self {
            source_path: None,
            location: None,
            cache_root,
            embedding: None,
        }
    }

    fn describe(&self) -> String {
        self.location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<buffer>".to_string())
    }
}

/// Loads packages using one kind registry.
#[derive(Clone, Copy)]
pub struct Loader<'a> {
    kinds: &'a KindRegistry,
    downloader: Option<&'a Downloader>,
    entry_limit: u64,
}

impl<'a> Loader<'a> {
    pub fn new(kinds: &'a KindRegistry, downloader: Option<&'a Downloader>) -> Self {
        Self {
            kinds,
            downloader,
            entry_limit: DEFAULT_ENTRY_LIMIT,
        }
    }

    /// Set the largest archive entry accepted, nested archives included.
    pub fn with_entry_limit(mut self, limit: u64) -> Self {
        self.entry_limit = limit;
        self
    }

    /// Decode one entry as `kind`. Failures yield `None`.
    pub async fn dispatch(
        &self,
        kind: ContentKind,
        entry_name: &str,
        bytes: &[u8],
        resolver: &dyn AssetResolver,
        log_failures: bool,
    ) -> Option<Box<dyn Content>> {
        let Some(registration) = self.kinds.by_kind(kind) else {
            if log_failures {
                warn!(entry = entry_name, %kind, "No codec registered for content kind");
            }
            return None;
        };

        match registration.codec.decode(bytes, resolver).await {
            Ok(content) => Some(content),
            Err(e) => {
                if log_failures {
                    warn!(entry = entry_name, %kind, error = %e, "Failed to load content");
                }
                None
            }
        }
    }

    /// Load a package from a directory with `manifest.json` at its root.
    ///
    /// Sub-directories are searched too, except those that are package
    /// roots themselves.
    pub async fn load_directory(&self, dir: &Path) -> RegistryResult<ContentPackage> {
        let manifest = read_manifest(dir).await?;
        let files = collect_content_files(dir, self.kinds).await?;

        let mut loaded_files = Vec::with_capacity(files.len());
        for (path, kind) in files {
            match tokio::fs::read(&path).await {
                Ok(bytes) => loaded_files.push((path, kind, bytes)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable content file"),
            }
        }

        let names: Vec<String> = loaded_files
            .iter()
            .map(|(path, _, _)| path.to_string_lossy().into_owned())
            .collect();
        let mut context = LoadContext::new(Some(dir), self.downloader);
        for (name, (_, _, bytes)) in names.iter().zip(&loaded_files) {
            context.insert(name, bytes);
        }

        let mut content: Vec<ContentRef> = Vec::with_capacity(loaded_files.len());
        for (path, kind, bytes) in &loaded_files {
            let name = path.display().to_string();
            let Some(mut item) = self.dispatch(*kind, &name, bytes, &context, true).await else {
                continue;
            };
            let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
            stamp(item.as_mut(), &manifest.info, Some(path.clone()), relative);
            content.push(item.into());
        }

        debug!(
            path = %dir.display(),
            package = %manifest.info.name,
            items = content.len(),
            "Loaded local package"
        );
        Ok(ContentPackage::new(manifest, content))
    }

    /// Load an archive and every archive nested in it.
    ///
    /// The outer package comes first in the result. A nested archive that
    /// fails to load is logged and skipped.
    pub fn load_archive(
        self,
        bytes: Vec<u8>,
        origin: ArchiveOrigin,
    ) -> BoxFuture<'a, RegistryResult<Vec<ExternalPackage>>> {
        Box::pin(async move {
            let label = origin.describe();
            let entries = read_entries_async(bytes, self.entry_limit).await?;

            let manifest_entry = entries
                .iter()
                .find(|e| e.is_root_level() && e.name == MANIFEST_FILENAME)
                .ok_or_else(|| RegistryError::ManifestNotFound(label.clone()))?;
            let manifest = PackageManifest::from_bytes(&manifest_entry.bytes).map_err(|e| {
                RegistryError::InvalidManifest {
                    location: label.clone(),
                    reason: e.to_string(),
                }
            })?;

            let directory_name = cache_directory_name(&manifest);
            let cache_path = match &origin.embedding {
                Some(embedding) => embedded_cache_path(&embedding.parent_cache_path, &directory_name),
                None => origin.cache_root.join(directory_name),
            };

            let mut context = LoadContext::new(None, self.downloader);
            for entry in &entries {
                context.insert(&entry.name, &entry.bytes);
            }

            let mut content: Vec<ContentRef> = Vec::new();
            let mut nested = Vec::new();
            for entry in &entries {
                match self.kinds.classify(&entry.name) {
                    EntryClass::Manifest | EntryClass::Unknown => {}
                    EntryClass::EmbeddedArchive => nested.push(entry),
                    EntryClass::Content(kind) => {
                        let Some(mut item) = self
                            .dispatch(kind, &entry.name, &entry.bytes, &context, true)
                            .await
                        else {
                            continue;
                        };
                        let origin_path = origin.location.as_ref().map(|p| p.join(&entry.name));
                        stamp(item.as_mut(), &manifest.info, origin_path, PathBuf::from(&entry.name));
                        content.push(item.into());
                    }
                }
            }

            let package = ContentPackage::new(manifest, content);
            let outer_id = package.identifier();
            debug!(archive = %label, items = package.len(), nested = nested.len(), "Decoded archive");

            let mut loaded = vec![ExternalPackage::new(
                origin.source_path.clone(),
                cache_path.clone(),
                origin.embedding.clone(),
                package,
            )];

            for entry in nested {
                let Some(parent) = outer_id.clone() else {
                    warn!(archive = %label, entry = %entry.name, "Skipping nested archive of a package without a valid version");
                    continue;
                };
                let child = ArchiveOrigin {
                    source_path: origin.source_path.clone(),
                    location: Some(
                        origin
                            .location
                            .clone()
                            .unwrap_or_default()
                            .join(&entry.name),
                    ),
                    cache_root: origin.cache_root.clone(),
                    embedding: Some(Embedding {
                        parent,
                        parent_cache_path: cache_path.clone(),
                        entry_name: entry.name.clone(),
                    }),
                };
                match self.load_archive(entry.bytes.clone(), child).await {
                    Ok(children) => loaded.extend(children),
                    Err(e) => warn!(archive = %label, entry = %entry.name, error = %e, "Failed to load nested archive"),
                }
            }

            Ok(loaded)
        })
    }
}

/// Derived locations and owning package of a freshly decoded item.
fn stamp(item: &mut dyn Content, package: &PackageInfo, origin: Option<PathBuf>, relative: PathBuf) {
    let info = &mut item.core_mut().info;
    info.package = Some(package.clone());
    info.origin_path = origin;
    info.relative_path = Some(relative);
}

fn cache_directory_name(manifest: &PackageManifest) -> String {
    manifest
        .identifier()
        .map(|id| local_directory_name(&id))
        .unwrap_or_else(|| sanitize_file_stem(&manifest.info.name))
}

async fn read_manifest(dir: &Path) -> RegistryResult<PackageManifest> {
    let path = dir.join(MANIFEST_FILENAME);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RegistryError::ManifestNotFound(dir.display().to_string()))
        }
        Err(source) => return Err(RegistryError::ReadFailed { path, source }),
    };
    PackageManifest::from_bytes(&bytes).map_err(|e| RegistryError::InvalidManifest {
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Content files under `root`, root files first, skipping nested package
/// roots.
async fn collect_content_files(
    root: &Path,
    kinds: &KindRegistry,
) -> RegistryResult<Vec<(PathBuf, ContentKind)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let read_failed = |source| RegistryError::ReadFailed {
            path: dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(read_failed)?;
        let mut subdirs = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(read_failed)?;

            if file_type.is_dir() {
                let nested_root = tokio::fs::try_exists(path.join(MANIFEST_FILENAME))
                    .await
                    .unwrap_or(false);
                if nested_root {
                    debug!(path = %path.display(), "Skipping nested package directory");
                } else {
                    subdirs.push(path);
                }
            } else if file_type.is_file() {
                let filename = entry.file_name().to_string_lossy().into_owned();
                if let EntryClass::Content(kind) = kinds.classify(&filename) {
                    files.push((path, kind));
                }
            }
        }

        pending.extend(subdirs.into_iter().rev());
    }

    Ok(files)
}
