//! Generic engine assets (animations, avatars, rigs, actors, meshes,
//! materials and models).
//!
//! The registry does not interpret these beyond their info and the packages
//! they reference; the payload is kept as structured data for the host.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    AssetResolver, BoxFuture, Content, ContentCodec, ContentCore, ContentError, ContentInfo,
    ContentKind,
};
use crate::package::PackageIdentifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContent {
    #[serde(flatten)]
    core: ContentCore,

    #[serde(skip)]
    kind: ContentKind,

    #[serde(default)]
    pub data: Value,

    /// Packages whose content this asset is built from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<PackageIdentifier>,
}

impl AssetContent {
    pub fn new(kind: ContentKind, info: ContentInfo, data: Value) -> Self {
        Self {
            core: ContentCore::new(info),
            kind,
            data,
            references: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<PackageIdentifier>) -> Self {
        self.references = references;
        self
    }
}

impl Content for AssetContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_dependencies(&self) -> Vec<PackageIdentifier> {
        self.references.clone()
    }
}

/// Codec shared by all generic asset kinds.
#[derive(Debug, Clone, Copy)]
pub struct AssetCodec {
    kind: ContentKind,
}

impl AssetCodec {
    pub fn new(kind: ContentKind) -> Self {
        Self { kind }
    }
}

impl ContentCodec for AssetCodec {
    fn decode<'a>(
        &'a self,
        bytes: &'a [u8],
        _resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<Box<dyn Content>, ContentError>> {
        Box::pin(async move {
            let mut asset: AssetContent = serde_json::from_slice(bytes)?;
            asset.kind = self.kind;
            asset.core.asset().mark_external();
            Ok(Box::new(asset) as Box<dyn Content>)
        })
    }

    fn encode(&self, content: &dyn Content) -> Result<Vec<u8>, ContentError> {
        match content.as_any().downcast_ref::<AssetContent>() {
            Some(asset) if asset.kind == self.kind => Ok(serde_json::to_vec_pretty(asset)?),
            _ => Err(ContentError::WrongVariant {
                name: content.name().to_string(),
                expected: self.kind,
                found: content.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NoAssets;
    use serde_json::json;

    #[tokio::test]
    async fn test_codec_assigns_kind() {
        let codec = AssetCodec::new(ContentKind::Mesh);
        let content = codec
            .decode(br#"{"name":"hull","data":{"vertices":3}}"#, &NoAssets)
            .await
            .unwrap();

        assert_eq!(content.kind(), ContentKind::Mesh);
        assert_eq!(content.name(), "hull");
    }

    #[test]
    fn test_codec_rejects_other_kind() {
        let codec = AssetCodec::new(ContentKind::Mesh);
        let model = AssetContent::new(ContentKind::Model, ContentInfo::new("ship"), json!({}));
        assert!(matches!(
            codec.encode(&model),
            Err(ContentError::WrongVariant { .. })
        ));
    }

    #[test]
    fn test_references_are_dependencies() {
        let base = PackageIdentifier::parse("base-rig", "3").unwrap();
        let avatar = AssetContent::new(ContentKind::Avatar, ContentInfo::new("hero"), json!(null))
            .with_references(vec![base.clone()]);
        assert_eq!(avatar.extract_dependencies(), vec![base]);
    }
}
