//! Cache keys and synthetic locators
//!
//! A [`CacheKey`] is derived from a resource's identity path:
//! `<kind prefix><16 hex chars>`, where the hex digits are the first 8 bytes
//! of the BLAKE3 digest of the path. The derivation is pure: the same path
//! always yields the same key.
//!
//! A [`SyntheticLocator`] is the key plus the redirect extension
//! (`i_3f2a9c01d2e4b5a6.cachebin`). Graphs carry locators in place of the
//! original file names so that loads are routed back to the cache bin.

use crate::error::KeyError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Extension that routes a load to the cache bin
pub const REDIRECT_EXTENSION: &str = "cachebin";

/// Number of digest bytes kept in a key
const DIGEST_BYTES: usize = 8;

/// Kind of object stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Generic object (a serialized graph)
    Object,
    /// Image payload
    Image,
}

impl ResourceKind {
    /// Key prefix distinguishing this kind
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Object => "o_",
            Self::Image => "i_",
        }
    }

    /// Kind whose prefix starts `key`
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        [Self::Image, Self::Object]
            .into_iter()
            .find(|kind| key.starts_with(kind.prefix()))
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Image => f.write_str("image"),
        }
    }
}

/// Deterministic key derived from a resource path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `path` in the namespace of `kind`
    #[must_use]
    pub fn derive(kind: ResourceKind, path: &str) -> Self {
        let digest = blake3::hash(path.as_bytes());
        Self(format!(
            "{}{}",
            kind.prefix(),
            hex::encode(&digest.as_bytes()[..DIGEST_BYTES])
        ))
    }

    /// Derive the key of an image from its file name
    #[inline]
    #[must_use]
    pub fn for_image(path: &str) -> Self {
        Self::derive(ResourceKind::Image, path)
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kind encoded in the prefix
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        // Construction guarantees a known prefix
        ResourceKind::from_key(&self.0).unwrap_or(ResourceKind::Object)
    }

    /// Locator that redirects a load to this key
    #[inline]
    #[must_use]
    pub fn locator(&self) -> SyntheticLocator {
        SyntheticLocator::new(self)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CacheKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = ResourceKind::from_key(s).ok_or_else(|| KeyError::invalid(s, "unknown prefix"))?;
        let digest = &s[kind.prefix().len()..];
        if digest.len() != DIGEST_BYTES * 2 {
            return Err(KeyError::invalid(s, "digest must be 16 hex characters"));
        }
        if !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(KeyError::invalid(s, "digest must be lowercase hex"));
        }
        Ok(Self(s.to_string()))
    }
}

/// `<key>.<redirect extension>` string embedded in a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticLocator(String);

impl SyntheticLocator {
    /// Locator for `key`
    #[must_use]
    pub fn new(key: &CacheKey) -> Self {
        Self(format!("{key}.{REDIRECT_EXTENSION}"))
    }

    /// Parse a location that was produced by [`SyntheticLocator::new`]
    ///
    /// Only the last path component is checked, so a locator keeps its
    /// meaning when a loader prefixes it with a directory.
    #[must_use]
    pub fn parse(location: &str) -> Option<Self> {
        if !has_redirect_extension(location) {
            return None;
        }
        name_less_extension(file_component(location)).parse::<CacheKey>().ok()?;
        Some(Self(location.to_string()))
    }

    /// Check whether `location` is a synthetic locator
    #[inline]
    #[must_use]
    pub fn is_locator(location: &str) -> bool {
        Self::parse(location).is_some()
    }

    /// Key encoded in the locator
    #[must_use]
    pub fn key(&self) -> CacheKey {
        CacheKey(name_less_extension(file_component(&self.0)).to_string())
    }

    /// Locator as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SyntheticLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SyntheticLocator> for String {
    fn from(locator: SyntheticLocator) -> Self {
        locator.0
    }
}

/// Lower-cased extension of the last path component
#[must_use]
pub fn lowercase_extension(location: &str) -> Option<String> {
    let file = file_component(location);
    file.rfind('.')
        .map(|dot| file[dot + 1..].to_ascii_lowercase())
}

/// Location with the extension of its last component removed
#[must_use]
pub fn name_less_extension(location: &str) -> &str {
    let start = location.len() - file_component(location).len();
    match location[start..].rfind('.') {
        Some(dot) => &location[..start + dot],
        None => location,
    }
}

/// Check whether the location ends in the redirect extension
#[must_use]
pub fn has_redirect_extension(location: &str) -> bool {
    lowercase_extension(location).as_deref() == Some(REDIRECT_EXTENSION)
}

fn file_component(location: &str) -> &str {
    match location.rfind(['/', '\\']) {
        Some(sep) => &location[sep + 1..],
        None => location,
    }
}
