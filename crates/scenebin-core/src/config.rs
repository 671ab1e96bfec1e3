//! Cache configuration
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! log_filter = "scenebin=debug"
//! log_format = "json"
//! default_max_age_secs = 3600
//!
//! [extraction]
//! lock_shards = 128
//! hold_lock_during_write = true
//! ```

use crate::error::{CacheResult, ConfigError};
use scenebin_store::{BinError, DirectoryCacheBin, MemoryCacheBin};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of extraction lock shards
pub const DEFAULT_LOCK_SHARDS: usize = 64;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Settings for external image extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Number of lock shards keyed by cache key
    pub lock_shards: usize,
    /// Issue the image write while the shard lock is held
    ///
    /// Turning this off shortens lock hold times but lets two writers store
    /// the same key concurrently; only safe for bins that tolerate that.
    pub hold_lock_during_write: bool,
}

impl ExtractionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With lock shard count
    #[inline]
    #[must_use]
    pub fn with_lock_shards(mut self, shards: usize) -> Self {
        self.lock_shards = shards;
        self
    }

    /// With write-under-lock behaviour
    #[inline]
    #[must_use]
    pub fn with_hold_lock_during_write(mut self, hold: bool) -> Self {
        self.hold_lock_during_write = hold;
        self
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            lock_shards: DEFAULT_LOCK_SHARDS,
            hold_lock_during_write: true,
        }
    }
}

/// Top-level cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Extraction settings
    pub extraction: ExtractionConfig,
    /// Default tracing filter directive
    pub log_filter: String,
    /// Tracing output format
    pub log_format: LogFormat,
    /// Maximum record age for bins built from this config
    pub default_max_age_secs: Option<u64>,
}

impl CacheConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With extraction settings
    #[inline]
    #[must_use]
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// With tracing filter
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// With tracing output format
    #[inline]
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// With maximum record age
    #[inline]
    #[must_use]
    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age_secs = Some(max_age.as_secs());
        self
    }

    /// Maximum record age, if configured
    #[must_use]
    pub fn default_max_age(&self) -> Option<Duration> {
        self.default_max_age_secs.map(Duration::from_secs)
    }

    /// In-memory bin honouring the configured record age
    #[must_use]
    pub fn memory_bin(&self, id: impl Into<String>) -> MemoryCacheBin {
        let bin = MemoryCacheBin::new(id);
        match self.default_max_age() {
            Some(max_age) => bin.with_max_age(max_age),
            None => bin,
        }
    }

    /// Directory bin under `root` honouring the configured record age
    ///
    /// # Errors
    /// Returns error if the bin directory cannot be created
    pub fn directory_bin(&self, root: impl AsRef<Path>, id: &str) -> CacheResult<DirectoryCacheBin> {
        let bin = DirectoryCacheBin::open(root, id).map_err(|source| BinError::Io {
            key: id.to_string(),
            source,
        })?;
        Ok(match self.default_max_age() {
            Some(max_age) => bin.with_max_age(max_age),
            None => bin,
        })
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns error if the document is malformed or fails validation
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or its contents are invalid
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;
        Self::from_toml_str(&source)
    }

    /// Check invariants
    ///
    /// # Errors
    /// Returns error if the lock shard count is zero or the filter is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.lock_shards == 0 {
            return Err(ConfigError::Invalid {
                field: "extraction.lock_shards",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_filter",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            default_max_age_secs: None,
        }
    }
}
