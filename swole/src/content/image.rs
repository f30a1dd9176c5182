//! Image content and its serialized companion.
//!
//! A stored image either embeds its encoded bytes or names a source to load
//! them from. The source is resolved during post-processing: first against
//! the other files of the same load batch, then the package directory, then
//! as a download.

use std::any::Any;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageReader;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{
    AssetResolver, BoxFuture, Content, ContentCore, ContentError, ContentInfo, ContentKind,
    SerializedForm,
};

/// A decoded image: encoded bytes plus their pixel dimensions.
#[derive(Debug, Clone)]
pub struct ImageContent {
    core: ContentCore,
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (PNG, JPEG, ...).
    pub encoded: Vec<u8>,
    /// Where the bytes originally came from, if not embedded.
    pub source: Option<String>,
}

impl ImageContent {
    /// Build an image from encoded bytes, reading its dimensions.
    pub fn from_encoded(info: ContentInfo, encoded: Vec<u8>) -> Result<Self, ContentError> {
        let (width, height) = read_dimensions(&encoded)?;
        Ok(Self {
            core: ContentCore::new(info),
            width,
            height,
            encoded,
            source: None,
        })
    }
}

impl Content for ImageContent {
    fn core(&self) -> &ContentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContentCore {
        &mut self.core
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Image
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn read_dimensions(encoded: &[u8]) -> Result<(u32, u32), ContentError> {
    ImageReader::new(Cursor::new(encoded))
        .with_guessed_format()
        .map_err(|e| ContentError::Image(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ContentError::Image(e.to_string()))
}

/// Stored form of an [`ImageContent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedImage {
    #[serde(flatten)]
    pub info: ContentInfo,

    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    pub data: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SerializedForm for SerializedImage {
    type Live = ImageContent;

    fn post_process<'a>(
        &'a mut self,
        resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<(), ContentError>> {
        Box::pin(async move {
            if !self.data.is_empty() {
                return Ok(());
            }
            let Some(source) = self.source.as_deref() else {
                return Ok(());
            };
            match resolver.resolve(source).await {
                Some(bytes) if !bytes.is_empty() => {
                    self.data = bytes;
                    Ok(())
                }
                _ => Err(ContentError::UnresolvedSource {
                    name: self.info.name.clone(),
                    source_path: source.to_string(),
                }),
            }
        })
    }

    fn into_live(self) -> Result<ImageContent, ContentError> {
        let mut live = ImageContent::from_encoded(self.info, self.data)?;
        live.source = self.source;
        Ok(live)
    }

    fn from_live(live: &ImageContent) -> Self {
        Self {
            info: live.core.info.clone(),
            data: live.encoded.clone(),
            source: live.source.clone(),
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
