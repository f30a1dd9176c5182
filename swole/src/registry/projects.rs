//! Grouping of packages into projects.
//!
//! The index is persisted as JSON separately from the packages. Loading or
//! saving it never touches package directories.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{RegistryError, RegistryResult};

/// A project and where its files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub external_paths: Vec<PathBuf>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            external_paths: Vec::new(),
        }
    }
}

/// On-disk form of the project index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIndexFile {
    /// Package name to project name.
    #[serde(default)]
    pub package_projects: BTreeMap<String, String>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
}

/// Outcome of [`ProjectIndex::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSaveOutcome {
    Saved,
    /// Another save was in flight, so this one was not performed.
    Dropped,
    Failed(String),
}

/// Clears the in-flight flag when dropped.
#[derive(Debug)]
pub(crate) struct SaveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The project index bound to its file.
#[derive(Debug)]
pub struct ProjectIndex {
    path: PathBuf,
    data: ProjectIndexFile,
    saving: Arc<AtomicBool>,
}

impl ProjectIndex {
    /// An empty index that will be stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: ProjectIndexFile::default(),
            saving: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &ProjectIndexFile {
        &self.data
    }

    /// Replace the in-memory index with the file contents.
    ///
    /// A missing file yields an empty index.
    pub fn reload(&mut self) -> RegistryResult<()> {
        self.data = read_index(&self.path)?;
        debug!(
            path = %self.path.display(),
            projects = self.data.projects.len(),
            "Loaded project index"
        );
        Ok(())
    }

    pub(crate) fn replace_data(&mut self, data: ProjectIndexFile) {
        self.data = data;
    }

    /// Take the in-flight flag, or `None` if a save is already running.
    pub(crate) fn begin_save(&self) -> Option<SaveGuard> {
        if self.saving.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(SaveGuard {
            flag: Arc::clone(&self.saving),
        })
    }

    /// Write the index. A request made while another save is running is
    /// dropped.
    pub fn save(&self) -> ProjectSaveOutcome {
        let Some(_guard) = self.begin_save() else {
            debug!(path = %self.path.display(), "Project index save already in flight, dropping request");
            return ProjectSaveOutcome::Dropped;
        };
        write_outcome(&self.path, write_index(&self.path, &self.data))
    }

    /// Put `package` in `project`, returning its previous project.
    pub fn assign(&mut self, package: impl Into<String>, project: impl Into<String>) -> Option<String> {
        self.data.package_projects.insert(package.into(), project.into())
    }

    pub fn unassign(&mut self, package: &str) -> Option<String> {
        self.data.package_projects.remove(package)
    }

    pub fn project_of(&self, package: &str) -> Option<&str> {
        self.data.package_projects.get(package).map(String::as_str)
    }

    /// Names of the packages assigned to `project`, sorted.
    pub fn packages_in_project(&self, project: &str) -> Vec<&str> {
        self.data
            .package_projects
            .iter()
            .filter(|(_, p)| p.as_str() == project)
            .map(|(package, _)| package.as_str())
            .collect()
    }

    /// Add a project record, replacing one with the same name.
    pub fn add_project(&mut self, record: ProjectRecord) {
        match self.data.projects.iter_mut().find(|p| p.name == record.name) {
            Some(existing) => *existing = record,
            None => self.data.projects.push(record),
        }
    }

    pub fn project(&self, name: &str) -> Option<&ProjectRecord> {
        self.data.projects.iter().find(|p| p.name == name)
    }

    pub fn projects(&self) -> &[ProjectRecord] {
        &self.data.projects
    }
}

pub(crate) fn read_index(path: &Path) -> RegistryResult<ProjectIndexFile> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ProjectIndexFile::default()),
        Err(source) => {
            return Err(RegistryError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| RegistryError::InvalidManifest {
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Write to a temp file first, then rename into place.
pub(crate) fn write_index(path: &Path, data: &ProjectIndexFile) -> RegistryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RegistryError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let bytes = serde_json::to_vec_pretty(data).map_err(|e| RegistryError::EncodeFailed {
        name: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes).map_err(|source| RegistryError::WriteFailed {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| RegistryError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_outcome(path: &Path, result: RegistryResult<()>) -> ProjectSaveOutcome {
    match result {
        Ok(()) => ProjectSaveOutcome::Saved,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to save project index");
            ProjectSaveOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut index = ProjectIndex::new(temp.path().join("projects.json"));
        index.reload().unwrap();
        assert!(index.projects().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("projects.json");
        let mut index = ProjectIndex::new(&path);
        index.assign("mypack", "game");
        index.assign("other", "game");
        index.assign("tools", "editor");
        let mut record = ProjectRecord::new("game", "/projects/game");
        record.external_paths.push(PathBuf::from("/shared/assets"));
        index.add_project(record.clone());

        assert_eq!(index.save(), ProjectSaveOutcome::Saved);
        assert!(!path.with_extension("tmp").exists());

        let mut reloaded = ProjectIndex::new(&path);
        reloaded.reload().unwrap();
        assert_eq!(reloaded.packages_in_project("game"), vec!["mypack", "other"]);
        assert_eq!(reloaded.project("game"), Some(&record));
        assert_eq!(reloaded.project_of("tools"), Some("editor"));
    }

    #[test]
    fn test_file_uses_camel_case_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("projects.json");
        let mut index = ProjectIndex::new(&path);
        index.assign("mypack", "game");
        index.save();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("packageProjects"));
    }

    #[test]
    fn test_concurrent_save_is_dropped() {
        let temp = TempDir::new().unwrap();
        let index = ProjectIndex::new(temp.path().join("projects.json"));

        let guard = index.begin_save().unwrap();
        assert_eq!(index.save(), ProjectSaveOutcome::Dropped);
        drop(guard);
        assert_eq!(index.save(), ProjectSaveOutcome::Saved);
    }

    #[test]
    fn test_unassign_and_replace_project() {
        let mut index = ProjectIndex::new("/tmp/unused.json");
        assert_eq!(index.assign("mypack", "a"), None);
        assert_eq!(index.assign("mypack", "b"), Some("a".to_string()));
        assert_eq!(index.unassign("mypack"), Some("b".to_string()));
        assert!(index.packages_in_project("b").is_empty());

        index.add_project(ProjectRecord::new("game", "/one"));
        index.add_project(ProjectRecord::new("game", "/two"));
        assert_eq!(index.projects().len(), 1);
        assert_eq!(index.project("game").unwrap().path, PathBuf::from("/two"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("projects.json");
        fs::write(&path, b"not json").unwrap();
        let mut index = ProjectIndex::new(&path);
        assert!(index.reload().is_err());
    }
}
