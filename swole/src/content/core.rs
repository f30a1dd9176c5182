//! State shared by every content variant.
//!
//! Each live content item is a thin wrapper ([`ContentCore`]) around a
//! reference-counted [`AssetHandle`]. Several wrappers may share one asset,
//! which is what "identical asset" means. Disposal is two-tier:
//!
//! - `dispose_self` releases the wrapper only
//! - `dispose` releases the wrapper and the shared asset
//!
//! Assets decoded from storage are external and really release on dispose.
//! Internal assets (built in memory by the host) are never released here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::package::PackageInfo;

/// Descriptive fields of a content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    /// Metadata of the package this item was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageInfo>,

    pub name: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub created: DateTime<Utc>,

    #[serde(default)]
    pub last_edited: DateTime<Utc>,

    #[serde(default)]
    pub description: String,

    /// Absolute location the item was read from.
    #[serde(skip)]
    pub origin_path: Option<PathBuf>,

    /// Location relative to the package root.
    #[serde(skip)]
    pub relative_path: Option<PathBuf>,
}

impl ContentInfo {
    /// Create info for a brand new item, stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created: now,
            last_edited: now,
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Record an edit.
    pub fn touch(&mut self) {
        self.last_edited = Utc::now();
    }
}

/// Shared resource behind one or more content wrappers.
#[derive(Debug)]
pub struct AssetHandle {
    internal: AtomicBool,
    releases: AtomicUsize,
}

impl AssetHandle {
    /// An asset owned by the host; [`AssetHandle::release`] leaves it alone.
    pub fn internal() -> Arc<Self> {
        Arc::new(Self {
            internal: AtomicBool::new(true),
            releases: AtomicUsize::new(0),
        })
    }

    /// An asset decoded from storage and owned by the registry.
    pub fn external() -> Arc<Self> {
        let handle = Self::internal();
        handle.mark_external();
        handle
    }

    pub fn is_internal(&self) -> bool {
        self.internal.load(Ordering::Acquire)
    }

    pub fn mark_external(&self) {
        self.internal.store(false, Ordering::Release);
    }

    /// Release the asset. Returns `true` if this call released it.
    pub fn release(&self) -> bool {
        if self.is_internal() {
            return false;
        }
        self.releases.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Number of release requests that reached an external asset.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.release_count() > 0
    }
}

/// The wrapper state every variant embeds.
///
/// Cloning a core produces a new wrapper over the same asset, with fresh
/// disposal counters. Serializes as its [`ContentInfo`].
#[derive(Debug)]
pub struct ContentCore {
    pub info: ContentInfo,
    asset: Arc<AssetHandle>,
    self_disposals: AtomicUsize,
    disposals: AtomicUsize,
}

impl ContentCore {
    /// A core for a new, internal item.
    pub fn new(info: ContentInfo) -> Self {
        Self::with_asset(info, AssetHandle::internal())
    }

    pub fn with_asset(info: ContentInfo, asset: Arc<AssetHandle>) -> Self {
        Self {
            info,
            asset,
            self_disposals: AtomicUsize::new(0),
            disposals: AtomicUsize::new(0),
        }
    }

    pub fn asset(&self) -> &Arc<AssetHandle> {
        &self.asset
    }

    /// Whether both cores wrap the same asset.
    pub fn shares_asset_with(&self, other: &ContentCore) -> bool {
        Arc::ptr_eq(&self.asset, &other.asset)
    }

    /// Release this wrapper only.
    pub fn release_wrapper(&self) {
        self.self_disposals.fetch_add(1, Ordering::AcqRel);
    }

    /// Release this wrapper and its asset.
    pub fn release_all(&self) {
        self.disposals.fetch_add(1, Ordering::AcqRel);
        self.asset.release();
    }

    /// How many times `dispose_self` reached this wrapper.
    pub fn self_disposal_count(&self) -> usize {
        self.self_disposals.load(Ordering::Acquire)
    }

    /// How many times `dispose` reached this wrapper.
    pub fn disposal_count(&self) -> usize {
        self.disposals.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposal_count() > 0
    }
}

impl Clone for ContentCore {
    fn clone(&self) -> Self {
        Self::with_asset(self.info.clone(), Arc::clone(&self.asset))
    }
}

impl From<ContentInfo> for ContentCore {
    fn from(info: ContentInfo) -> Self {
        Self::new(info)
    }
}

impl Serialize for ContentCore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.info.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentCore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ContentInfo::deserialize(deserializer).map(ContentCore::new)
    }
}
