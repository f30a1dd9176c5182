//! The copy-on-write package editor.

use std::sync::Arc;

use im::Vector;
use tracing::debug;

use super::content_package::{dispose_orphans, DisposalSummary};
use super::{ContentPackage, PackageManifest};
use crate::content::{same_instance, same_slot, ContentRef};

/// Edits a package by producing a new [`ContentPackage`] for every change.
///
/// Items that drop out of the package are collected as orphans when the
/// caller asks for it. Orphans are disposed later with
/// [`SwolePackage::dispose_orphaned_content`], so a caller can still hold
/// on to an older snapshot until then.
///
/// Until a snapshot is bound, every mutation except [`SwolePackage::add`]
/// and [`SwolePackage::add_all`] is a no-op.
#[derive(Debug, Default)]
pub struct SwolePackage {
    current: Option<Arc<ContentPackage>>,
    orphans: Vec<ContentRef>,
}

impl SwolePackage {
    /// An editor with nothing bound yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// An editor over an existing snapshot.
    pub fn from_package(package: ContentPackage) -> Self {
        Self {
            current: Some(Arc::new(package)),
            orphans: Vec::new(),
        }
    }

    /// The committed snapshot, if any.
    pub fn current(&self) -> Option<&Arc<ContentPackage>> {
        self.current.as_ref()
    }

    pub fn manifest(&self) -> Option<&PackageManifest> {
        self.current.as_deref().map(ContentPackage::manifest)
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Take the pending orphans without disposing them.
    pub fn take_orphans(&mut self) -> Vec<ContentRef> {
        std::mem::take(&mut self.orphans)
    }

    /// Finish editing, handing pending orphans to the final snapshot.
    pub fn into_current(mut self) -> Option<ContentPackage> {
        let current = self.current.take()?;
        let orphans = std::mem::take(&mut self.orphans);
        Some(ContentPackage::with_orphans(
            current.manifest().clone(),
            current.content().clone(),
            orphans,
        ))
    }

    /// Append one item, reconciling dependencies.
    pub fn add(&mut self, item: ContentRef) {
        self.add_all(std::iter::once(item), true);
    }

    /// Append items. Binds a package with a default manifest if none is
    /// bound yet.
    pub fn add_all(&mut self, items: impl IntoIterator<Item = ContentRef>, reconcile: bool) {
        let (manifest, mut staging) = match &self.current {
            Some(current) => (current.manifest().clone(), current.content().clone()),
            None => (PackageManifest::default(), Vector::new()),
        };
        staging.extend(items);

        let next = if reconcile {
            ContentPackage::new(manifest, staging)
        } else {
            ContentPackage::unreconciled(manifest, staging)
        };
        self.commit(next, false);
    }

    /// Replace the item matching `old` (by reference, else by name and kind)
    /// with `new`. Returns whether a match was found.
    pub fn replace(&mut self, old: &ContentRef, new: ContentRef, orphan_replaced: bool) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        let mut staging = current.content().clone();
        let Some(index) = find_match(&staging, old) else {
            return false;
        };
        staging.set(index, new);

        let next = ContentPackage::new(current.manifest().clone(), staging);
        self.commit(next, orphan_replaced);
        true
    }

    /// Replace the item with the same name and kind, or append.
    pub fn add_or_replace(&mut self, item: ContentRef, orphan_replaced: bool) {
        self.add_or_replace_all(std::iter::once(item), orphan_replaced);
    }

    /// Apply [`SwolePackage::add_or_replace`] for each item in order. Later
    /// items see the effect of earlier ones.
    pub fn add_or_replace_all(&mut self, items: impl IntoIterator<Item = ContentRef>, orphan_replaced: bool) {
        let Some(current) = &self.current else {
            return;
        };
        let mut staging = current.content().clone();
        for item in items {
            match find_match(&staging, &item) {
                Some(index) => {
                    staging.set(index, item);
                }
                None => staging.push_back(item),
            }
        }

        let next = ContentPackage::new(current.manifest().clone(), staging);
        self.commit(next, orphan_replaced);
    }

    /// Remove the item matching `item`, recomputing dependencies.
    pub fn remove(&mut self, item: &ContentRef, orphan: bool) -> bool {
        self.remove_with(item, orphan, true)
    }

    /// Remove the item matching `item` (by reference, else by name and kind).
    ///
    /// With `recompute_dependencies`, the manifest's dependencies are rebuilt
    /// from the remaining content only.
    pub fn remove_with(&mut self, item: &ContentRef, orphan: bool, recompute_dependencies: bool) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        let mut staging = current.content().clone();
        let Some(index) = find_match(&staging, item) else {
            return false;
        };
        staging.remove(index);

        let next = rebuild(current.manifest().clone(), staging, recompute_dependencies);
        self.commit(next, orphan);
        true
    }

    /// Remove every item matching `predicate`. Returns how many were removed.
    pub fn remove_all<F>(&mut self, mut predicate: F, orphan: bool, recompute_dependencies: bool) -> usize
    where
        F: FnMut(&ContentRef) -> bool,
    {
        let Some(current) = &self.current else {
            return 0;
        };
        let before = current.len();
        let staging: Vector<ContentRef> = current
            .content()
            .iter()
            .filter(|item| !predicate(*item))
            .cloned()
            .collect();
        let removed = before - staging.len();
        if removed == 0 {
            return 0;
        }

        let next = rebuild(current.manifest().clone(), staging, recompute_dependencies);
        self.commit(next, orphan);
        removed
    }

    /// Remove all content, keeping the manifest (and its dependencies unless
    /// `clear_dependencies`).
    pub fn clear(&mut self, orphan: bool, clear_dependencies: bool) {
        let Some(current) = &self.current else {
            return;
        };
        let mut manifest = current.manifest().clone();
        if clear_dependencies {
            manifest.dependencies.clear();
        }
        self.commit(ContentPackage::empty(manifest), orphan);
    }

    /// Swap the manifest, keeping the content.
    pub fn update_manifest(&mut self, manifest: PackageManifest) {
        let Some(current) = &self.current else {
            return;
        };
        let next = ContentPackage::new(manifest, current.content().clone());
        self.commit(next, false);
    }

    /// Dispose pending orphans against the committed snapshot.
    pub fn dispose_orphaned_content(&mut self) -> DisposalSummary {
        let orphans = std::mem::take(&mut self.orphans);
        let live = self
            .current
            .as_ref()
            .map(|current| current.content().clone())
            .unwrap_or_default();
        dispose_orphans(&live, orphans)
    }

    /// Replace the committed snapshot. With `orphan`, every item of the old
    /// snapshot missing from the new one joins the orphan list.
    fn commit(&mut self, next: ContentPackage, orphan: bool) {
        let next = Arc::new(next);
        if let (true, Some(previous)) = (orphan, self.current.as_ref()) {
            let before = self.orphans.len();
            for item in previous.iter() {
                if !next.iter().any(|live| same_instance(live, item)) {
                    self.orphans.push(Arc::clone(item));
                }
            }
            debug!(
                package = %next.manifest().info.name,
                orphaned = self.orphans.len() - before,
                "Committed package snapshot"
            );
        }
        self.current = Some(next);
    }
}

fn find_match(content: &Vector<ContentRef>, target: &ContentRef) -> Option<usize> {
    content
        .iter()
        .position(|item| same_instance(item, target))
        .or_else(|| {
            content
                .iter()
                .position(|item| same_slot(item.as_ref(), target.as_ref()))
        })
}

fn rebuild(mut manifest: PackageManifest, content: Vector<ContentRef>, recompute: bool) -> ContentPackage {
    if recompute {
        manifest.dependencies.clear();
    }
    ContentPackage::new(manifest, content)
}
