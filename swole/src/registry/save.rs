//! Staged saving of local packages.
//!
//! A save never writes into the package directory directly:
//!
//! 1. A fresh sibling directory is created next to the target.
//! 2. `manifest.json` is written first, then one file per content item.
//! 3. Files the loader does not recognize (and nested package directories)
//!    are copied over from the original directory.
//! 4. The original is removed and the staging directory renamed into place.
//!
//! Until step 4 the original directory is untouched. Dropping a
//! [`StagedSave`] without committing removes the staging directory.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::error::{RegistryError, RegistryResult};
use crate::content::{Content, ContentError, EntryClass, KindRegistry};
use crate::package::{content_filename, ContentPackage, MANIFEST_FILENAME};

/// Outcome of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveReport {
    /// Every content item was written.
    Saved { files: usize },
    /// Some content items failed to encode or write and were skipped.
    Partial { saved: usize, total: usize },
    /// Nothing was written. The original directory is untouched.
    Catastrophic { reason: String },
    /// Staging succeeded but the swap into place failed.
    SwapFailed { reason: String },
}

impl SaveReport {
    /// Whether the package directory now holds the saved package.
    pub fn is_committed(&self) -> bool {
        matches!(self, SaveReport::Saved { .. } | SaveReport::Partial { .. })
    }
}

impl fmt::Display for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveReport::Saved { files } => write!(f, "saved {} items", files),
            SaveReport::Partial { saved, total } => write!(f, "saved {} of {} items", saved, total),
            SaveReport::Catastrophic { reason } => write!(f, "save failed, nothing written: {}", reason),
            SaveReport::SwapFailed { reason } => write!(f, "save staged but not swapped in: {}", reason),
        }
    }
}

/// A package written into a staging directory, waiting to be swapped in.
#[derive(Debug)]
pub struct StagedSave {
    target: PathBuf,
    staging: PathBuf,
    kinds: Arc<KindRegistry>,
    saved: usize,
    total: usize,
    committed: bool,
}

impl StagedSave {
    /// Write `package` into a new directory next to `target`.
    ///
    /// Fails only if the staging directory or the manifest cannot be
    /// written. Content items that fail are logged and skipped.
    pub fn stage(target: &Path, package: &ContentPackage, kinds: Arc<KindRegistry>) -> RegistryResult<Self> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| RegistryError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        })?;

        let stem = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.save-", stem))
            .tempdir_in(parent)
            .map_err(|source| RegistryError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?
            .keep();

        let mut staged = Self {
            target: target.to_path_buf(),
            staging,
            kinds,
            saved: 0,
            total: package.len(),
            committed: false,
        };

        let manifest_path = staged.staging.join(MANIFEST_FILENAME);
        let manifest = package
            .manifest()
            .to_bytes()
            .map_err(|e| RegistryError::EncodeFailed {
                name: MANIFEST_FILENAME.to_string(),
                reason: e.to_string(),
            })?;
        fs::write(&manifest_path, manifest).map_err(|source| RegistryError::WriteFailed {
            path: manifest_path,
            source,
        })?;

        let mut written = HashSet::new();
        for item in package.iter() {
            match staged.write_item(item.as_ref(), &mut written) {
                Ok(()) => staged.saved += 1,
                Err(e) => warn!(item = item.name(), error = %e, "Skipping content item on save"),
            }
        }

        debug!(
            staging = %staged.staging.display(),
            saved = staged.saved,
            total = staged.total,
            "Staged package save"
        );
        Ok(staged)
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn write_item(&self, item: &dyn Content, written: &mut HashSet<PathBuf>) -> RegistryResult<()> {
        let relative = content_path(&self.kinds, item)?;
        if !written.insert(relative.clone()) {
            return Err(RegistryError::EncodeFailed {
                name: item.name().to_string(),
                reason: format!("{} is already written by another item", relative.display()),
            });
        }

        let bytes = encode_content(&self.kinds, item).map_err(|e| RegistryError::EncodeFailed {
            name: item.name().to_string(),
            reason: e.to_string(),
        })?;

        let path = self.staging.join(&relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| RegistryError::CreateDirFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, bytes).map_err(|source| RegistryError::WriteFailed { path, source })
    }

    /// Copy strays from the original, remove it and rename staging into place.
    ///
    /// On a swap failure the staging directory is left on disk.
    pub fn commit(mut self) -> SaveReport {
        if self.target.exists() {
            if !self.target.is_dir() {
                let reason = format!("{} is not a package directory", self.target.display());
                return self.keep_staging(reason);
            }
            if let Err(e) = copy_unrecognized(&self.target, &self.staging, &self.kinds) {
                return SaveReport::Catastrophic {
                    reason: format!("failed to carry over files from {}: {}", self.target.display(), e),
                };
            }
            if let Err(e) = fs::remove_dir_all(&self.target) {
                return self.keep_staging(format!("failed to remove {}: {}", self.target.display(), e));
            }
        }

        if let Err(e) = fs::rename(&self.staging, &self.target) {
            let reason = format!("failed to move {} into place: {}", self.staging.display(), e);
            return self.keep_staging(reason);
        }
        self.committed = true;

        info!(path = %self.target.display(), saved = self.saved, total = self.total, "Saved package");
        if self.saved == self.total {
            SaveReport::Saved { files: self.saved }
        } else {
            SaveReport::Partial {
                saved: self.saved,
                total: self.total,
            }
        }
    }

    fn keep_staging(&mut self, reason: String) -> SaveReport {
        self.committed = true;
        warn!(
            path = %self.target.display(),
            staging = %self.staging.display(),
            reason = %reason,
            "Package save not swapped in, staging directory kept"
        );
        SaveReport::SwapFailed { reason }
    }
}

impl Drop for StagedSave {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_dir_all(&self.staging) {
                warn!(staging = %self.staging.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

/// Package-relative path of `item`: its original sub-directory, if any,
/// and `<name>.<extension>`.
pub(crate) fn content_path(kinds: &KindRegistry, item: &dyn Content) -> RegistryResult<PathBuf> {
    let Some(extension) = kinds.extension_for(item.kind()) else {
        return Err(RegistryError::EncodeFailed {
            name: item.name().to_string(),
            reason: format!("no extension registered for {}", item.kind()),
        });
    };

    let filename = content_filename(item.name(), extension);
    Ok(match item.info().relative_path.as_deref().and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(filename),
        _ => PathBuf::from(filename),
    })
}

/// Type-specific encoding, then the kind's codec, then generic data.
pub(crate) fn encode_content(kinds: &KindRegistry, item: &dyn Content) -> Result<Vec<u8>, ContentError> {
    if let Some(result) = item.encode() {
        return result;
    }
    if let Some(registration) = kinds.by_kind(item.kind()) {
        match registration.codec.encode(item) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => debug!(item = item.name(), error = %e, "Codec encode failed, using generic form"),
        }
    }
    let generic = json!({ "kind": item.kind(), "info": item.info() });
    Ok(serde_json::to_vec_pretty(&generic)?)
}

/// Copy files under `from` the loader would not load into `to`.
///
/// Nested package directories are copied whole. Existing files in `to` win.
fn copy_unrecognized(from: &Path, to: &Path, kinds: &KindRegistry) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if path.join(MANIFEST_FILENAME).exists() {
                copy_tree(&path, &dest)?;
            } else {
                fs::create_dir_all(&dest)?;
                copy_unrecognized(&path, &dest, kinds)?;
            }
        } else if file_type.is_file() && !dest.exists() {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if matches!(
                kinds.classify(&filename),
                EntryClass::Unknown | EntryClass::EmbeddedArchive
            ) {
                fs::copy(&path, &dest)?;
            }
        }
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else if !dest.exists() {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Stage and commit `package` into `target` on a blocking worker.
pub async fn save_package(target: PathBuf, package: Arc<ContentPackage>, kinds: Arc<KindRegistry>) -> SaveReport {
    let worker = tokio::task::spawn_blocking(move || {
        match StagedSave::stage(&target, &package, kinds) {
            Ok(staged) => staged.commit(),
            Err(e) => SaveReport::Catastrophic { reason: e.to_string() },
        }
    });
    let report = match worker.await {
        Ok(report) => report,
        Err(e) => SaveReport::Catastrophic {
            reason: format!("save worker failed: {}", e),
        },
    };
    if let SaveReport::Catastrophic { reason } = &report {
        tracing::error!(reason = %reason, "Package save failed before swap, original untouched");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentInfo, ContentRef, DataContent, ScriptContent};
    use crate::package::{PackageInfo, PackageManifest};
    use tempfile::TempDir;

    fn sample_package() -> ContentPackage {
        let items: Vec<ContentRef> = vec![
            Arc::new(DataContent::new(ContentInfo::new("foo"), json!({"x": 1}))),
            Arc::new(ScriptContent::new(ContentInfo::new("main"), "go()")),
        ];
        ContentPackage::new(PackageManifest::new(PackageInfo::new("mypack", "1.0")), items)
    }

    fn kinds() -> Arc<KindRegistry> {
        Arc::new(KindRegistry::standard())
    }

    #[test]
    fn test_stage_writes_manifest_and_items() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");

        let staged = StagedSave::stage(&target, &sample_package(), kinds()).unwrap();
        let staging = staged.staging_path().to_path_buf();
        assert!(staging.join(MANIFEST_FILENAME).exists());
        assert!(staging.join("foo.swlson").exists());
        assert!(staging.join("main.swlua").exists());
        assert_eq!((staged.saved(), staged.total()), (2, 2));

        assert_eq!(staged.commit(), SaveReport::Saved { files: 2 });
        assert!(target.join("main.swlua").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_drop_without_commit_leaves_original() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");
        fs::create_dir(&target).unwrap();
        fs::write(target.join(MANIFEST_FILENAME), b"original").unwrap();

        let staged = StagedSave::stage(&target, &sample_package(), kinds()).unwrap();
        let staging = staged.staging_path().to_path_buf();
        drop(staged);

        assert!(!staging.exists());
        assert_eq!(fs::read(target.join(MANIFEST_FILENAME)).unwrap(), b"original");
    }

    #[test]
    fn test_commit_carries_over_unrecognized_files() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("notes.txt"), b"keep me").unwrap();
        fs::write(target.join("stale.swlson"), b"{}").unwrap();
        fs::write(target.join("nested").join(MANIFEST_FILENAME), b"{}").unwrap();
        fs::write(target.join("nested/bar.swlson"), b"{}").unwrap();

        let staged = StagedSave::stage(&target, &sample_package(), kinds()).unwrap();
        assert!(staged.commit().is_committed());

        assert_eq!(fs::read(target.join("notes.txt")).unwrap(), b"keep me");
        assert!(!target.join("stale.swlson").exists());
        assert!(target.join("nested/bar.swlson").exists());
    }

    #[test]
    fn test_duplicate_filenames_are_skipped() {
        let items: Vec<ContentRef> = vec![
            Arc::new(ScriptContent::new(ContentInfo::new("main"), "a")),
            Arc::new(ScriptContent::new(ContentInfo::new("main"), "b")),
        ];
        let package = ContentPackage::new(PackageManifest::new(PackageInfo::new("mypack", "1.0")), items);
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");

        let staged = StagedSave::stage(&target, &package, kinds()).unwrap();
        assert_eq!(staged.commit(), SaveReport::Partial { saved: 1, total: 2 });
    }

    #[test]
    fn test_stage_under_a_file_is_catastrophic() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("local");
        fs::write(&blocker, b"not a directory").unwrap();
        let target = blocker.join("mypack-v1.0");

        assert!(matches!(
            StagedSave::stage(&target, &sample_package(), kinds()),
            Err(RegistryError::CreateDirFailed { .. })
        ));
        assert_eq!(fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[tokio::test]
    async fn test_save_package_reports_catastrophic_and_leaves_original() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("local");
        fs::write(&blocker, b"not a directory").unwrap();

        let report = save_package(blocker.join("mypack-v1.0"), Arc::new(sample_package()), kinds()).await;
        assert!(matches!(report, SaveReport::Catastrophic { .. }));
        assert!(!report.is_committed());
        assert_eq!(fs::read(&blocker).unwrap(), b"not a directory");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_swap_failure_keeps_staging() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");

        let staged = StagedSave::stage(&target, &sample_package(), kinds()).unwrap();
        let staging = staged.staging_path().to_path_buf();
        // Something else claims the target path before the swap
        fs::write(&target, b"squatter").unwrap();

        let report = staged.commit();
        assert!(matches!(report, SaveReport::SwapFailed { .. }), "{:?}", report);
        assert!(!report.is_committed());
        assert_eq!(fs::read(&target).unwrap(), b"squatter");
        assert!(staging.join(MANIFEST_FILENAME).exists());
        assert!(staging.join("foo.swlson").exists());
    }

    #[test]
    fn test_rename_failure_is_a_swap_failure() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("mypack-v1.0");

        let staged = StagedSave::stage(&target, &sample_package(), kinds()).unwrap();
        fs::remove_dir_all(staged.staging_path()).unwrap();

        let report = staged.commit();
        match report {
            SaveReport::SwapFailed { reason } => assert!(reason.contains("into place")),
            other => panic!("expected SwapFailed, got {:?}", other),
        }
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_save_package_async() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("local").join("mypack-v1.0");
        let report = save_package(target.clone(), Arc::new(sample_package()), kinds()).await;
        assert_eq!(report, SaveReport::Saved { files: 2 });
        assert!(target.join(MANIFEST_FILENAME).exists());
    }
}
