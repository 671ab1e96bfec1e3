//! Cache bin contract
//!
//! A cache bin is a key/value object store. The caching protocol only relies
//! on the operations below; where and how records are persisted is up to the
//! implementation.

use crate::error::BinError;
use crate::key::ResourceKind;
use crate::options::{Metadata, ReadOptions, WriteOptions};
use scenebin_graph::{ImageRef, NodeRef};

/// Freshness of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// Present and within its freshness window
    Valid,
    /// Present but older than the bin's maximum age
    Expired,
    /// Not present
    Missing,
}

impl RecordStatus {
    /// Expired and missing records both have to be (re)written
    #[inline]
    #[must_use]
    pub fn needs_write(self) -> bool {
        !matches!(self, Self::Valid)
    }
}

/// Object stored in or loaded from a bin
#[derive(Debug, Clone)]
pub enum CacheObject {
    /// Scene graph rooted at a node
    Node(NodeRef),
    /// Image payload
    Image(ImageRef),
}

impl CacheObject {
    /// Kind of the stored object
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Node(_) => ResourceKind::Object,
            Self::Image(_) => ResourceKind::Image,
        }
    }

    /// Node, if this is a graph
    #[must_use]
    pub fn into_node(self) -> Option<NodeRef> {
        match self {
            Self::Node(node) => Some(node),
            Self::Image(_) => None,
        }
    }

    /// Image, if this is an image
    #[must_use]
    pub fn into_image(self) -> Option<ImageRef> {
        match self {
            Self::Image(image) => Some(image),
            Self::Node(_) => None,
        }
    }
}

impl From<NodeRef> for CacheObject {
    fn from(node: NodeRef) -> Self {
        Self::Node(node)
    }
}

impl From<ImageRef> for CacheObject {
    fn from(image: ImageRef) -> Self {
        Self::Image(image)
    }
}

/// Key/value object store used as the durable cache backend
///
/// Implementations must be safe to share between threads. Every method is
/// synchronous.
pub trait CacheBin: Send + Sync {
    /// Bin identifier
    fn id(&self) -> &str;

    /// Store `object` under `key`, replacing any previous record
    ///
    /// # Errors
    /// Returns error if the object cannot be encoded or persisted
    fn write(
        &self,
        key: &str,
        object: &CacheObject,
        metadata: &Metadata,
        options: &WriteOptions,
    ) -> Result<(), BinError>;

    /// Load the object stored under `key`
    ///
    /// External references inside a graph are resolved through
    /// `options`. Returns `Ok(None)` if no record exists.
    ///
    /// # Errors
    /// Returns error if the record exists but cannot be read
    fn read_object(&self, key: &str, options: &ReadOptions) -> Result<Option<CacheObject>, BinError>;

    /// Load the image stored under `key`
    ///
    /// # Errors
    /// Returns error if the record cannot be read or is not an image
    fn read_image(&self, key: &str, options: &ReadOptions) -> Result<Option<ImageRef>, BinError> {
        match self.read_object(key, options)? {
            Some(CacheObject::Image(image)) => Ok(Some(image)),
            Some(other) => Err(BinError::WrongKind {
                key: key.to_string(),
                expected: ResourceKind::Image,
                found: other.kind(),
            }),
            None => Ok(None),
        }
    }

    /// Metadata stored with the record under `key`
    ///
    /// # Errors
    /// Returns error if the metadata exists but cannot be read
    fn read_metadata(&self, key: &str) -> Result<Option<Metadata>, BinError>;

    /// Freshness of the record under `key`
    fn record_status(&self, key: &str) -> RecordStatus;

    /// Delete the record under `key`. Returns `true` if one existed.
    ///
    /// # Errors
    /// Returns error if the backend fails to delete
    fn remove(&self, key: &str) -> Result<bool, BinError>;

    /// Reset the age of the record under `key`. Returns `true` if one existed.
    ///
    /// # Errors
    /// Returns error if the backend fails to update the record
    fn touch(&self, key: &str) -> Result<bool, BinError>;

    /// Delete every record in the bin
    ///
    /// # Errors
    /// Returns error if the backend fails to delete
    fn clear(&self) -> Result<(), BinError>;

    /// Approximate bytes used by stored records
    fn storage_size(&self) -> u64;
}

/// Reject keys no backend can store
pub(crate) fn validate_key(key: &str) -> Result<(), BinError> {
    if key.is_empty() || key.chars().any(char::is_control) {
        return Err(BinError::InvalidKey(key.to_string()));
    }
    Ok(())
}
