//! Byte codecs for content kinds.
//!
//! A kind either has a serialized companion form that needs post-processing
//! before it becomes live content ([`SerializedCodec`]), or decodes directly
//! into its live type ([`DirectCodec`]). Either way the decoded asset is
//! marked external so disposal releases it.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{BoxFuture, Content, ContentError, ContentKind};

/// Resolves an asset source path to bytes during decoding.
pub trait AssetResolver: Send + Sync {
    /// Bytes for `source`, or `None` when it cannot be found.
    fn resolve<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Option<Vec<u8>>>;
}

/// A resolver that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve<'a>(&'a self, _source: &'a str) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(std::future::ready(None))
    }
}

/// Decoder/encoder for one content kind.
pub trait ContentCodec: Send + Sync {
    fn decode<'a>(
        &'a self,
        bytes: &'a [u8],
        resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<Box<dyn Content>, ContentError>>;

    fn encode(&self, content: &dyn Content) -> Result<Vec<u8>, ContentError>;
}

/// A persisted form that is converted to and from live content.
pub trait SerializedForm: Serialize + DeserializeOwned + Send + 'static {
    type Live: Content;

    /// Fill in anything the stored form left out.
    fn post_process<'a>(
        &'a mut self,
        _resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<(), ContentError>> {
        Box::pin(std::future::ready(Ok(())))
    }

    fn into_live(self) -> Result<Self::Live, ContentError>;

    fn from_live(live: &Self::Live) -> Self;
}

fn downcast<'c, T: Content>(
    content: &'c dyn Content,
    expected: ContentKind,
) -> Result<&'c T, ContentError> {
    content
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ContentError::WrongVariant {
            name: content.name().to_string(),
            expected,
            found: content.kind(),
        })
}

/// Codec for kinds with a serialized companion form.
pub struct SerializedCodec<S> {
    kind: ContentKind,
    _form: PhantomData<fn() -> S>,
}

impl<S: SerializedForm> SerializedCodec<S> {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            _form: PhantomData,
        }
    }
}

impl<S: SerializedForm> ContentCodec for SerializedCodec<S> {
    fn decode<'a>(
        &'a self,
        bytes: &'a [u8],
        resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<Box<dyn Content>, ContentError>> {
        Box::pin(async move {
            let mut form: S = serde_json::from_slice(bytes)?;
            form.post_process(resolver).await?;
            let live = form.into_live()?;
            live.core().asset().mark_external();
            Ok(Box::new(live) as Box<dyn Content>)
        })
    }

    fn encode(&self, content: &dyn Content) -> Result<Vec<u8>, ContentError> {
        let live = downcast::<S::Live>(content, self.kind)?;
        Ok(serde_json::to_vec_pretty(&S::from_live(live))?)
    }
}

/// Codec for kinds stored exactly as their live type.
pub struct DirectCodec<T> {
    kind: ContentKind,
    _content: PhantomData<fn() -> T>,
}

impl<T> DirectCodec<T>
where
    T: Content + Serialize + DeserializeOwned,
{
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            _content: PhantomData,
        }
    }
}

impl<T> ContentCodec for DirectCodec<T>
where
    T: Content + Serialize + DeserializeOwned,
{
    fn decode<'a>(
        &'a self,
        bytes: &'a [u8],
        _resolver: &'a dyn AssetResolver,
    ) -> BoxFuture<'a, Result<Box<dyn Content>, ContentError>> {
        Box::pin(async move {
            let live: T = serde_json::from_slice(bytes)?;
            live.core().asset().mark_external();
            Ok(Box::new(live) as Box<dyn Content>)
        })
    }

    fn encode(&self, content: &dyn Content) -> Result<Vec<u8>, ContentError> {
        let live = downcast::<T>(content, self.kind)?;
        Ok(serde_json::to_vec_pretty(live)?)
    }
}
