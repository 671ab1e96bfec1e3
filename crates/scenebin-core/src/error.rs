//! Error types for scenebin Core
//!
//! Two layers:
//! - [`CacheError`] / [`ConfigError`]: failures returned to the caller
//! - [`ResourceFailure`]: per-resource problems recorded in reports; these
//!   never abort a write

use scenebin_graph::CloneError;
use scenebin_store::BinError;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Result alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Main cache error type
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Bin operation failed
    #[error("bin error: {0}")]
    Bin(#[from] BinError),

    /// Record under the key is not a graph
    #[error("record {key} is not a graph")]
    NotAGraph { key: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file could not be read
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value out of range
    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Category of a per-resource failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Image has no file name to derive a key from
    UnkeyableResource,
    /// Bin refused or failed the image write
    StoreWriteFailure,
    /// Texture could not be duplicated
    CloneFailure,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnkeyableResource => "unkeyable resource",
            Self::StoreWriteFailure => "store write failure",
            Self::CloneFailure => "clone failure",
        })
    }
}

/// Non-fatal failure recorded while processing one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Resource path (file name) involved, possibly empty
    pub path: String,
    /// Cache key involved, if one was derived
    pub key: Option<String>,
    /// Human-readable detail
    pub message: String,
}

impl ResourceFailure {
    /// Image without a file name
    #[must_use]
    pub fn unkeyable(path: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::UnkeyableResource,
            path: path.into(),
            key: None,
            message: "image has no file name".to_string(),
        }
    }

    /// Failed image write
    #[must_use]
    pub fn store_write(path: impl Into<String>, key: impl Into<String>, error: &BinError) -> Self {
        Self {
            kind: FailureKind::StoreWriteFailure,
            path: path.into(),
            key: Some(key.into()),
            message: error.to_string(),
        }
    }

    /// Image whose payload was gone before it could be stored
    #[must_use]
    pub fn missing_payload(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::StoreWriteFailure,
            path: path.into(),
            key: Some(key.into()),
            message: "image has no resident payload".to_string(),
        }
    }

    /// Failed texture duplication
    #[must_use]
    pub fn clone_failure(path: impl Into<String>, error: &CloneError) -> Self {
        Self {
            kind: FailureKind::CloneFailure,
            path: path.into(),
            key: None,
            message: error.to_string(),
        }
    }
}

impl Display for ResourceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {:?}", self.kind, self.path)?;
        if let Some(key) = &self.key {
            write!(f, " ({key})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_failure_display() {
        let failure = ResourceFailure::store_write(
            "sky.png",
            "i_0011223344556677",
            &BinError::rejected("tiles", "i_0011223344556677", "read-only"),
        );
        assert_eq!(
            failure.to_string(),
            "store write failure for \"sky.png\" (i_0011223344556677): bin tiles rejected i_0011223344556677: read-only"
        );

        let unkeyable = ResourceFailure::unkeyable("");
        assert_eq!(unkeyable.to_string(), "unkeyable resource for \"\": image has no file name");
    }

    #[test]
    fn clone_failure_carries_message() {
        let failure = ResourceFailure::clone_failure("a.png", &CloneError::ImportedHandle { handle: 0x10 });
        assert_eq!(failure.kind, FailureKind::CloneFailure);
        assert!(failure.message.contains("0x10"));
    }

    #[test]
    fn cache_error_from_bin_error() {
        let err: CacheError = BinError::InvalidKey(String::new()).into();
        assert!(matches!(err, CacheError::Bin(_)));
        assert_eq!(err.to_string(), "bin error: invalid key \"\"");
    }
}
