//! Read/write options and record metadata
//!
//! [`ReadOptions`] is the load context threaded through every read call.
//! It carries the active cache bin explicitly; nothing is looked up from
//! global or thread-local state.

use crate::bin::CacheBin;
use crate::loader::LoaderChain;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Free-form metadata stored next to a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    /// Create empty metadata
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an entry
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// How image payloads are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteImageHint {
    /// Follow each image's own [`WriteHint`](scenebin_graph::WriteHint)
    #[default]
    FromImage,
    /// Embed every payload, even for images marked external
    IncludeData,
}

/// Options for a single write call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    image_hint: WriteImageHint,
}

impl WriteOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of these options that embeds image payloads
    ///
    /// Used when the image itself is the record being written; without it
    /// an image whose file name is already a locator would point at itself.
    #[must_use]
    pub fn with_inline_images(&self) -> Self {
        Self {
            image_hint: WriteImageHint::IncludeData,
        }
    }

    /// Image payload hint
    #[inline]
    #[must_use]
    pub fn image_hint(&self) -> WriteImageHint {
        self.image_hint
    }

    /// Check whether payloads are forced inline
    #[inline]
    #[must_use]
    pub fn inline_images(&self) -> bool {
        self.image_hint == WriteImageHint::IncludeData
    }
}

/// Load context for read calls
#[derive(Clone, Default)]
pub struct ReadOptions {
    bin: Option<Arc<dyn CacheBin>>,
    loaders: LoaderChain,
}

impl ReadOptions {
    /// Options with the default loader chain and no bin
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the active cache bin
    #[must_use]
    pub fn with_bin(mut self, bin: Arc<dyn CacheBin>) -> Self {
        self.bin = Some(bin);
        self
    }

    /// Replace the loader chain
    #[must_use]
    pub fn with_loaders(mut self, loaders: LoaderChain) -> Self {
        self.loaders = loaders;
        self
    }

    /// Active cache bin, if one was supplied
    #[inline]
    #[must_use]
    pub fn cache_bin(&self) -> Option<&Arc<dyn CacheBin>> {
        self.bin.as_ref()
    }

    /// Loaders consulted for external references
    #[inline]
    #[must_use]
    pub fn loaders(&self) -> &LoaderChain {
        &self.loaders
    }
}

impl Debug for ReadOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("bin", &self.bin.as_ref().map(|bin| bin.id().to_string()))
            .field("loaders", &self.loaders)
            .finish()
    }
}
