//! Immutable package snapshots.
//!
//! A [`ContentPackage`] is a manifest plus an ordered list of content. It is
//! never mutated after construction; editing goes through
//! [`SwolePackage`](super::SwolePackage), which builds a new snapshot for
//! every change. The content list is an [`im::Vector`], so a new snapshot
//! shares structure with the one it was derived from.

use std::fmt;
use std::sync::{Arc, OnceLock};

use im::Vector;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{PackageIdentifier, PackageManifest};
use crate::content::{same_instance, Content, ContentKind, ContentRef};

/// Counts from one disposal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposalSummary {
    /// Items fully disposed.
    pub disposed: usize,
    /// Items whose asset is still in use, so only the wrapper was released.
    pub self_disposed: usize,
    /// Items still referenced by the live content and left alone.
    pub retained: usize,
    /// Items whose disposal returned an error.
    pub failed: usize,
}

impl fmt::Display for DisposalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} disposed, {} wrapper-only, {} retained, {} failed",
            self.disposed, self.self_disposed, self.retained, self.failed
        )
    }
}

/// A manifest plus its content, with dependencies reconciled.
pub struct ContentPackage {
    manifest: PackageManifest,
    content: Vector<ContentRef>,
    orphans: Mutex<Vec<ContentRef>>,
    source: OnceLock<Arc<ContentPackage>>,
}

impl ContentPackage {
    /// Build a snapshot, adding any dependencies the content declares to the
    /// manifest.
    pub fn new(mut manifest: PackageManifest, content: impl IntoIterator<Item = ContentRef>) -> Self {
        let content: Vector<ContentRef> = content.into_iter().collect();
        reconcile_dependencies(&mut manifest, &content);
        Self::unreconciled(manifest, content)
    }

    /// Build a snapshot that carries content awaiting disposal.
    pub fn with_orphans(
        manifest: PackageManifest,
        content: impl IntoIterator<Item = ContentRef>,
        orphans: Vec<ContentRef>,
    ) -> Self {
        let package = Self::new(manifest, content);
        *package.orphans.lock() = orphans;
        package
    }

    /// Build a snapshot using the manifest exactly as given.
    pub fn unreconciled(manifest: PackageManifest, content: Vector<ContentRef>) -> Self {
        Self {
            manifest,
            content,
            orphans: Mutex::new(Vec::new()),
            source: OnceLock::new(),
        }
    }

    pub fn empty(manifest: PackageManifest) -> Self {
        Self::unreconciled(manifest, Vector::new())
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    pub fn identifier(&self) -> Option<PackageIdentifier> {
        self.manifest.identifier()
    }

    /// The content list. Cloning it is cheap.
    pub fn content(&self) -> &Vector<ContentRef> {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContentRef> {
        self.content.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentRef> + '_ {
        self.content.iter()
    }

    /// Index of the first item named `name` whose kind satisfies `kind`.
    pub fn index_of(&self, name: &str, kind: Option<ContentKind>, case_sensitive: bool) -> Option<usize> {
        self.content.iter().position(|item| {
            item.kind().is_assignable_to(kind) && names_match(item.name(), name, case_sensitive)
        })
    }

    /// First item named `name` (exact case) whose kind satisfies `kind`.
    pub fn find(&self, name: &str, kind: Option<ContentKind>) -> Option<&ContentRef> {
        self.index_of(name, kind, true)
            .and_then(|index| self.content.get(index))
    }

    /// First item named `name` that is a `T`.
    pub fn try_find<T: Content>(&self, name: &str, case_sensitive: bool) -> Option<&T> {
        self.content
            .iter()
            .filter(|item| names_match(item.name(), name, case_sensitive))
            .find_map(|item| item.as_any().downcast_ref::<T>())
    }

    /// The script content of this package, under the same manifest.
    ///
    /// Computed on first use and cached for the life of the snapshot.
    pub fn source_package(&self) -> Arc<ContentPackage> {
        Arc::clone(self.source.get_or_init(|| {
            let scripts = self
                .content
                .iter()
                .filter(|item| item.kind() == ContentKind::Script)
                .cloned()
                .collect();
            Arc::new(ContentPackage::unreconciled(self.manifest.clone(), scripts))
        }))
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.lock().len()
    }

    /// Dispose every pending orphan that the live content no longer uses.
    pub fn dispose_orphaned_content(&self) -> DisposalSummary {
        let orphans = std::mem::take(&mut *self.orphans.lock());
        dispose_orphans(&self.content, orphans)
    }

    /// Dispose pending orphans, then every live item.
    ///
    /// Called when the owning package is unloaded. Items that appear more
    /// than once are disposed once.
    pub fn dispose_all(&self) -> DisposalSummary {
        let mut summary = self.dispose_orphaned_content();
        let live: Vec<ContentRef> = self.content.iter().cloned().collect();
        for item in dedupe_instances(live) {
            match item.dispose() {
                Ok(()) => summary.disposed += 1,
                Err(e) => {
                    warn!(content = %item.name(), error = %e, "Failed to dispose content");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl fmt::Debug for ContentPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPackage")
            .field("manifest", &self.manifest)
            .field("content", &self.content.len())
            .field("orphans", &self.orphan_count())
            .finish()
    }
}

fn names_match(candidate: &str, name: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        candidate == name
    } else {
        candidate.eq_ignore_ascii_case(name)
    }
}

/// Merge the dependencies declared by `content` into the manifest.
///
/// Existing dependencies keep their order and newly discovered ones are
/// appended. The manifest is only rewritten when the resulting set differs.
/// References to the package itself are skipped. Returns whether the
/// manifest changed.
pub(crate) fn reconcile_dependencies(manifest: &mut PackageManifest, content: &Vector<ContentRef>) -> bool {
    let own = manifest.identifier();
    let mut working: Vec<PackageIdentifier> = Vec::with_capacity(manifest.dependencies.len());
    for dep in &manifest.dependencies {
        if !working.contains(dep) {
            working.push(dep.clone());
        }
    }

    for item in content {
        for dep in item.extract_dependencies() {
            if own.as_ref() == Some(&dep) || working.contains(&dep) {
                continue;
            }
            working.push(dep);
        }
    }

    if working.len() == manifest.dependencies.len() {
        return false;
    }
    debug!(
        package = %manifest.info.name,
        before = manifest.dependencies.len(),
        after = working.len(),
        "Reconciled package dependencies"
    );
    manifest.dependencies = working;
    true
}

fn dedupe_instances(items: Vec<ContentRef>) -> Vec<ContentRef> {
    let mut unique: Vec<ContentRef> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|seen| same_instance(seen, &item)) {
            unique.push(item);
        }
    }
    unique
}

/// Dispose `orphans` against the content that is still live.
///
/// - an orphan that is itself still live is kept
/// - an orphan sharing its asset with a live item is only `dispose_self`d
/// - anything else is fully disposed
///
/// Each orphan is considered once. Failures are logged and counted.
pub(crate) fn dispose_orphans(live: &Vector<ContentRef>, orphans: Vec<ContentRef>) -> DisposalSummary {
    let mut summary = DisposalSummary::default();
    let mut pending = dedupe_instances(orphans);

    pending.retain(|orphan| {
        let still_live = live.iter().any(|item| same_instance(item, orphan));
        if still_live {
            summary.retained += 1;
        }
        !still_live
    });

    let (shared, unique): (Vec<ContentRef>, Vec<ContentRef>) = pending
        .into_iter()
        .partition(|orphan| live.iter().any(|item| item.is_identical_asset(orphan.as_ref())));

    for orphan in shared {
        match orphan.dispose_self() {
            Ok(()) => summary.self_disposed += 1,
            Err(e) => {
                warn!(content = %orphan.name(), error = %e, "Failed to release orphaned content");
                summary.failed += 1;
            }
        }
    }

    for orphan in unique {
        match orphan.dispose() {
            Ok(()) => summary.disposed += 1,
            Err(e) => {
                warn!(content = %orphan.name(), error = %e, "Failed to dispose orphaned content");
                summary.failed += 1;
            }
        }
    }

    if summary != DisposalSummary::default() {
        debug!(%summary, "Disposed orphaned content");
    }
    summary
}
