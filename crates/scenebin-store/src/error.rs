//! Error types for the store layer
//!
//! - [`KeyError`]: malformed cache keys
//! - [`CodecError`]: record encoding/decoding
//! - [`BinError`]: failures reported by a cache bin

use crate::key::ResourceKind;

/// Errors parsing cache keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Key does not follow the `<prefix><hex digest>` layout
    #[error("invalid cache key {key:?}: {reason}")]
    Invalid { key: String, reason: &'static str },
}

impl KeyError {
    /// Create invalid key error
    pub(crate) fn invalid(key: &str, reason: &'static str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason,
        }
    }
}

/// Errors encoding or decoding cache records
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON (de)serialization failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedded payload is not valid hex
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Record written by an incompatible format version
    #[error("unsupported record format {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    /// Document refers to an entry that does not exist
    #[error("dangling {table} index {index}")]
    DanglingIndex { table: &'static str, index: usize },
}

/// Errors reported by cache bins
#[derive(Debug, thiserror::Error)]
pub enum BinError {
    /// Key cannot be stored by this bin
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// Record could not be encoded or decoded
    #[error("codec error for {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: CodecError,
    },

    /// Backend I/O failed
    #[error("io error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Record exists but holds another kind of object
    #[error("record {key} holds {found}, expected {expected}")]
    WrongKind {
        key: String,
        expected: ResourceKind,
        found: ResourceKind,
    },

    /// Backend refused the write
    #[error("bin {bin} rejected {key}: {reason}")]
    Rejected {
        bin: String,
        key: String,
        reason: String,
    },
}

impl BinError {
    /// Create codec error for key
    pub fn codec(key: impl Into<String>, source: CodecError) -> Self {
        Self::Codec {
            key: key.into(),
            source,
        }
    }

    /// Create IO error for key
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    /// Create rejection error
    pub fn rejected(bin: impl Into<String>, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            bin: bin.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_error_display() {
        let err = KeyError::invalid("zz", "unknown prefix");
        assert_eq!(err.to_string(), "invalid cache key \"zz\": unknown prefix");
    }

    #[test]
    fn bin_error_display() {
        let err = BinError::WrongKind {
            key: "scene1".to_string(),
            expected: ResourceKind::Image,
            found: ResourceKind::Object,
        };
        assert_eq!(err.to_string(), "record scene1 holds object, expected image");

        let err = BinError::rejected("tiles", "i_00", "quota exceeded");
        assert_eq!(err.to_string(), "bin tiles rejected i_00: quota exceeded");
    }

    #[test]
    fn codec_error_conversions() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CodecError = json_err.into();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
