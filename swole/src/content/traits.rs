//! The capability interface shared by all content variants.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use super::{ContentCore, ContentInfo, ContentKind};
use crate::package::PackageIdentifier;

/// Boxed future type for dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared handle to one live content item.
pub type ContentRef = Arc<dyn Content>;

/// Errors raised while decoding, encoding or disposing content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The bytes were not valid for the content's serialized form.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No kind is registered for the file extension.
    #[error("No content kind registered for extension '{0}'")]
    UnknownExtension(String),

    /// No codec is registered for the kind.
    #[error("No codec registered for {0}")]
    UnregisteredKind(ContentKind),

    /// A codec was handed a content item of another variant.
    #[error("Codec for {expected} cannot encode '{name}' ({found})")]
    WrongVariant {
        name: String,
        expected: ContentKind,
        found: ContentKind,
    },

    /// Image bytes could not be decoded.
    #[error("Image error: {0}")]
    Image(String),

    /// An image carried neither data nor a resolvable source.
    #[error("Image '{name}' has no data and source '{source_path}' could not be resolved")]
    UnresolvedSource { name: String, source_path: String },

    /// Releasing resources failed.
    #[error("Failed to dispose '{name}': {reason}")]
    Dispose { name: String, reason: String },
}

/// One typed asset inside a package.
///
/// Implementors embed a [`ContentCore`] and expose it through
/// [`Content::core`]; every other method has a default built on it.
pub trait Content: Send + Sync + fmt::Debug + 'static {
    fn core(&self) -> &ContentCore;

    fn core_mut(&mut self) -> &mut ContentCore;

    fn kind(&self) -> ContentKind;

    fn as_any(&self) -> &dyn Any;

    fn info(&self) -> &ContentInfo {
        &self.core().info
    }

    fn name(&self) -> &str {
        &self.core().info.name
    }

    /// Packages this item references.
    fn extract_dependencies(&self) -> Vec<PackageIdentifier> {
        Vec::new()
    }

    /// Whether `other` wraps the same underlying asset.
    fn is_identical_asset(&self, other: &dyn Content) -> bool {
        self.core().shares_asset_with(other.core())
    }

    /// Release this wrapper's own resources.
    fn dispose_self(&self) -> Result<(), ContentError> {
        self.core().release_wrapper();
        Ok(())
    }

    /// Release this wrapper and the shared asset it owns.
    fn dispose(&self) -> Result<(), ContentError> {
        self.core().release_all();
        Ok(())
    }

    /// Type-specific save encoding, if the variant has one.
    fn encode(&self) -> Option<Result<Vec<u8>, ContentError>> {
        None
    }
}

/// Whether two handles point at the same content instance.
pub fn same_instance(a: &ContentRef, b: &ContentRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Whether `item` has the same name (exact) and kind as `other`.
pub fn same_slot(item: &dyn Content, other: &dyn Content) -> bool {
    item.kind() == other.kind() && item.name() == other.name()
}
