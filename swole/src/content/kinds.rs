//! The kind registry: which extension and codec belong to each kind.
//!
//! Built once (usually via [`KindRegistry::standard`]) and shared by the
//! loader and the save path.

use std::fmt;
use std::sync::Arc;

use super::{
    AssetCodec, ContentCodec, ContentKind, CreationContent, DataContent, DirectCodec,
    ExperienceContent, ScriptContent, SerializedCodec, SerializedImage,
};
use crate::package::{is_archive_filename, MANIFEST_FILENAME};

/// How the loader treats one file or archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    /// The package manifest.
    Manifest,
    /// A package archive nested inside another one.
    EmbeddedArchive,
    /// A typed content item.
    Content(ContentKind),
    /// Not something the loader understands.
    Unknown,
}

#[derive(Clone)]
pub struct KindRegistration {
    pub kind: ContentKind,
    pub extension: String,
    pub codec: Arc<dyn ContentCodec>,
}

impl fmt::Debug for KindRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistration")
            .field("kind", &self.kind)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    registrations: Vec<KindRegistration>,
}

impl KindRegistry {
    /// A registry with no kinds.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard table covering every [`ContentKind`].
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for kind in ContentKind::ALL {
            let codec: Arc<dyn ContentCodec> = match kind {
                ContentKind::Data => Arc::new(DirectCodec::<DataContent>::new(kind)),
                ContentKind::Script => Arc::new(DirectCodec::<ScriptContent>::new(kind)),
                ContentKind::Creation => Arc::new(DirectCodec::<CreationContent>::new(kind)),
                ContentKind::Experience => Arc::new(DirectCodec::<ExperienceContent>::new(kind)),
                ContentKind::Image => Arc::new(SerializedCodec::<SerializedImage>::new(kind)),
                _ => Arc::new(AssetCodec::new(kind)),
            };
            registry.register(kind, kind.default_extension(), codec);
        }
        registry
    }

    /// Register (or replace) the extension and codec for a kind.
    pub fn register(
        &mut self,
        kind: ContentKind,
        extension: impl Into<String>,
        codec: Arc<dyn ContentCodec>,
    ) {
        let extension: String = extension.into();
        let registration = KindRegistration {
            kind,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            codec,
        };
        match self.registrations.iter_mut().find(|r| r.kind == kind) {
            Some(existing) => *existing = registration,
            None => self.registrations.push(registration),
        }
    }

    pub fn by_kind(&self, kind: ContentKind) -> Option<&KindRegistration> {
        self.registrations.iter().find(|r| r.kind == kind)
    }

    /// Look up a registration by extension, ignoring case and a leading dot.
    pub fn by_extension(&self, extension: &str) -> Option<&KindRegistration> {
        let extension = extension.trim_start_matches('.');
        self.registrations
            .iter()
            .find(|r| r.extension.eq_ignore_ascii_case(extension))
    }

    pub fn extension_for(&self, kind: ContentKind) -> Option<&str> {
        self.by_kind(kind).map(|r| r.extension.as_str())
    }

    /// Classify a file by its name. Only the final path component is used.
    pub fn classify(&self, path: &str) -> EntryClass {
        let filename = path.rsplit(&['/', '\\'][..]).next().unwrap_or(path);

        if filename == MANIFEST_FILENAME {
            return EntryClass::Manifest;
        }
        if is_archive_filename(filename) {
            return EntryClass::EmbeddedArchive;
        }
        match filename.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => self
                .by_extension(extension)
                .map_or(EntryClass::Unknown, |r| EntryClass::Content(r.kind)),
            _ => EntryClass::Unknown,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = ContentKind> + '_ {
        self.registrations.iter().map(|r| r.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_covers_every_kind() {
        let registry = KindRegistry::standard();
        for kind in ContentKind::ALL {
            assert_eq!(registry.extension_for(kind), Some(kind.default_extension()));
        }
    }

    #[test]
    fn test_classify() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.classify("manifest.json"), EntryClass::Manifest);
        assert_eq!(registry.classify("nested.swole"), EntryClass::EmbeddedArchive);
        assert_eq!(
            registry.classify("foo.swlson"),
            EntryClass::Content(ContentKind::Data)
        );
        assert_eq!(
            registry.classify("scripts/Main.SWLUA"),
            EntryClass::Content(ContentKind::Script)
        );
        assert_eq!(registry.classify("readme.txt"), EntryClass::Unknown);
        assert_eq!(registry.classify(".swlson"), EntryClass::Unknown);
        assert_eq!(registry.classify("noextension"), EntryClass::Unknown);
    }

    #[test]
    fn test_nested_manifest_is_classified_by_filename() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.classify("sub/manifest.json"), EntryClass::Manifest);
    }

    #[test]
    fn test_register_replaces_extension() {
        let mut registry = KindRegistry::standard();
        let codec = registry.by_kind(ContentKind::Script).unwrap().codec.clone();
        registry.register(ContentKind::Script, ".LUA", codec);

        assert_eq!(registry.extension_for(ContentKind::Script), Some("lua"));
        assert_eq!(
            registry.classify("main.lua"),
            EntryClass::Content(ContentKind::Script)
        );
        assert_eq!(registry.classify("main.swlua"), EntryClass::Unknown);
        assert_eq!(registry.kinds().count(), ContentKind::ALL.len());
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        let registry = KindRegistry::empty();
        assert_eq!(registry.classify("foo.swlson"), EntryClass::Unknown);
        assert_eq!(registry.classify("manifest.json"), EntryClass::Manifest);
    }
}
