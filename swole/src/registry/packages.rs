//! Packages bound to storage.
//!
//! A [`LocalPackage`] lives in an editable working directory and wraps a
//! [`SwolePackage`] editor. An [`ExternalPackage`] was read from a `.swole`
//! archive and is read-only. Packages found inside another archive carry an
//! [`Embedding`] naming their parent.
//!
//! # Composition Pattern
//!
//! `LocalPackage` contains its editor rather than duplicating it. The
//! [`Deref`] implementation allows transparent access to the editor.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::ScriptRuntime;
use crate::package::{ContentPackage, PackageIdentifier, SwolePackage, EMBEDDED_MARKER};

/// Where a package is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    Local,
    External,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Local => write!(f, "local"),
            PackageKind::External => write!(f, "external"),
        }
    }
}

/// Behaviour shared by local and external packages.
pub trait Package: fmt::Debug {
    /// Identity of the current snapshot, if its version parses.
    fn identifier(&self) -> Option<PackageIdentifier>;

    /// The current snapshot.
    fn content(&self) -> Option<Arc<ContentPackage>>;

    /// Directory or archive the package was loaded from.
    fn location(&self) -> &Path;

    fn kind(&self) -> PackageKind;

    /// Unbind the script source from `runtime`, then dispose all content.
    fn dispose(&mut self, runtime: &dyn ScriptRuntime);
}

/// An editable package stored as a directory.
#[derive(Debug)]
pub struct LocalPackage {
    /// Directory holding `manifest.json` and the content files.
    pub working_dir: PathBuf,

    editor: SwolePackage,
}

impl LocalPackage {
    pub fn new(working_dir: impl Into<PathBuf>, package: ContentPackage) -> Self {
        Self {
            working_dir: working_dir.into(),
            editor: SwolePackage::from_package(package),
        }
    }

    pub fn editor(&self) -> &SwolePackage {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut SwolePackage {
        &mut self.editor
    }
}

impl Deref for LocalPackage {
    type Target = SwolePackage;

    fn deref(&self) -> &Self::Target {
        &self.editor
    }
}

impl DerefMut for LocalPackage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.editor
    }
}

impl Package for LocalPackage {
    fn identifier(&self) -> Option<PackageIdentifier> {
        self.editor.manifest().and_then(|m| m.identifier())
    }

    fn content(&self) -> Option<Arc<ContentPackage>> {
        self.editor.current().cloned()
    }

    fn location(&self) -> &Path {
        &self.working_dir
    }

    fn kind(&self) -> PackageKind {
        PackageKind::Local
    }

    fn dispose(&mut self, runtime: &dyn ScriptRuntime) {
        if let Some(id) = self.identifier() {
            runtime.unload_source(&id);
        }
        self.editor.dispose_orphaned_content();
        if let Some(current) = self.editor.current() {
            let summary = current.dispose_all();
            debug!(path = %self.working_dir.display(), %summary, "Disposed local package");
        }
    }
}

/// Marks a package that was found inside another archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    /// Identity of the enclosing package.
    pub parent: PackageIdentifier,
    /// Cache path of the enclosing package. The embedded package caches
    /// under its `embedded/` sub-directory.
    pub parent_cache_path: PathBuf,
    /// Name of the archive entry the package was read from.
    pub entry_name: String,
}

/// A read-only package loaded from a `.swole` archive.
#[derive(Debug)]
pub struct ExternalPackage {
    /// Archive file the package came from, when loaded from disk.
    pub source_path: Option<PathBuf>,

    /// Directory for derived files of this package.
    pub cache_path: PathBuf,

    /// Set when the package was nested in another archive.
    pub embedding: Option<Embedding>,

    content: Arc<ContentPackage>,
}

impl ExternalPackage {
    pub fn new(
        source_path: Option<PathBuf>,
        cache_path: PathBuf,
        embedding: Option<Embedding>,
        content: ContentPackage,
    ) -> Self {
        Self {
            source_path,
            cache_path,
            embedding,
            content: Arc::new(content),
        }
    }

    pub fn package(&self) -> &Arc<ContentPackage> {
        &self.content
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    /// Identity string with the embedded marker for nested packages.
    pub fn display_name(&self) -> String {
        let name = self
            .identifier()
            .map(|id| id.to_string())
            .unwrap_or_else(|| self.content.manifest().info.name.clone());
        match &self.embedding {
            Some(_) => format!("{} {}", name, EMBEDDED_MARKER),
            None => name,
        }
    }
}

impl Package for ExternalPackage {
    fn identifier(&self) -> Option<PackageIdentifier> {
        self.content.identifier()
    }

    fn content(&self) -> Option<Arc<ContentPackage>> {
        Some(Arc::clone(&self.content))
    }

    fn location(&self) -> &Path {
        self.source_path.as_deref().unwrap_or(&self.cache_path)
    }

    fn kind(&self) -> PackageKind {
        PackageKind::External
    }

    fn dispose(&mut self, runtime: &dyn ScriptRuntime) {
        if let Some(id) = self.identifier() {
            runtime.unload_source(&id);
        }
        let summary = self.content.dispose_all();
        debug!(package = %self.display_name(), %summary, "Disposed external package");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentInfo, ContentRef, ScriptContent};
    use crate::package::{PackageInfo, PackageManifest};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRuntime {
        unloaded: Mutex<Vec<String>>,
    }

    impl ScriptRuntime for RecordingRuntime {
        fn load_source(&self, _package: &PackageIdentifier, _source: Arc<ContentPackage>) {}

        fn unload_source(&self, package: &PackageIdentifier) {
            self.unloaded.lock().unwrap().push(package.to_string());
        }
    }

    fn package(name: &str, items: Vec<ContentRef>) -> ContentPackage {
        ContentPackage::new(PackageManifest::new(PackageInfo::new(name, "1.0")), items)
    }

    fn script(name: &str) -> ContentRef {
        Arc::new(ScriptContent::new(ContentInfo::new(name), ""))
    }

    #[test]
    fn test_local_package_derefs_to_editor() {
        let mut local = LocalPackage::new("/packages/local/mypack-v1.0", package("mypack", vec![]));
        local.add(script("main"));

        assert_eq!(local.current().unwrap().len(), 1);
        assert_eq!(local.kind(), PackageKind::Local);
        assert_eq!(local.identifier().unwrap().to_string(), "mypack-1.0");
    }

    #[test]
    fn test_local_dispose_unloads_then_disposes() {
        let main = script("main");
        let old = script("old");
        let mut local = LocalPackage::new("/tmp/x", package("mypack", vec![main.clone(), old.clone()]));
        local.remove(&old, true);

        let runtime = RecordingRuntime::default();
        local.dispose(&runtime);

        assert_eq!(*runtime.unloaded.lock().unwrap(), vec!["mypack-1.0".to_string()]);
        assert_eq!(main.core().disposal_count(), 1);
        assert_eq!(old.core().disposal_count(), 1);
    }

    #[test]
    fn test_external_display_name_marks_embedded() {
        let parent = PackageIdentifier::parse("outer", "1").unwrap();
        let plain = ExternalPackage::new(None, PathBuf::from("/cache/outer-v1"), None, package("outer", vec![]));
        let nested = ExternalPackage::new(
            None,
            PathBuf::from("/cache/outer-v1"),
            Some(Embedding {
                parent,
                parent_cache_path: PathBuf::from("/cache/outer-v1"),
                entry_name: "nested.swole".to_string(),
            }),
            package("inner", vec![]),
        );

        assert_eq!(plain.display_name(), "outer-1.0");
        assert_eq!(nested.display_name(), "inner-1.0 (embedded)");
        assert!(nested.is_embedded());
        assert_eq!(nested.location(), Path::new("/cache/outer-v1"));
    }

    #[test]
    fn test_external_dispose() {
        let main = script("main");
        let mut external = ExternalPackage::new(
            Some(PathBuf::from("/packages/external/mypack.swole")),
            PathBuf::from("/cache/mypack-v1.0"),
            None,
            package("mypack", vec![main.clone()]),
        );

        let runtime = RecordingRuntime::default();
        external.dispose(&runtime);
        assert_eq!(runtime.unloaded.lock().unwrap().len(), 1);
        assert_eq!(main.core().disposal_count(), 1);
    }
}
