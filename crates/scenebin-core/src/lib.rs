//! scenebin Core - cached scene-graph writes
//!
//! Writes scene graphs to a cache bin so that every image is stored once
//! under a key derived from its path, and graphs only carry references.
//!
//! # Core Concepts
//!
//! - [`GraphSanitizer`]: Strips annotations and isolates textures
//! - [`ExternalResourceExtractor`]: Stores images under their own keys and
//!   rewrites file names to synthetic locators
//! - [`WriteOrchestrator`]: Sanitize, extract, then write the graph
//! - [`GraphReader`]: Loads a graph and resolves its image references
//! - [`CacheConfig`]: Lock sharding and logging settings
//!
//! # Example
//!
//! ```rust
//! use scenebin_core::{GraphReader, WriteOrchestrator};
//! use scenebin_graph::{Image, Node, StateBlock, Texture};
//! use scenebin_store::{CacheBin, MemoryCacheBin, Metadata, ReadOptions, WriteOptions};
//! use std::sync::Arc;
//!
//! let bin: Arc<dyn CacheBin> = Arc::new(MemoryCacheBin::new("tiles"));
//! let image = Image::new("sky.png").with_data(vec![0u8; 16]).into_ref();
//! let state = StateBlock::new()
//!     .with_texture_attribute(0, Texture::with_image(image))
//!     .into_ref();
//! let root = Node::new("root").with_state(state).into_ref();
//!
//! let report = WriteOrchestrator::new(bin.clone())
//!     .write_node("scene1", &root, &Metadata::new(), &WriteOptions::new());
//! assert!(report.succeeded());
//!
//! let loaded = GraphReader::new(bin).read_node("scene1", ReadOptions::new()).unwrap().unwrap();
//! let texture = loaded.state().unwrap().texture(0).unwrap();
//! assert!(texture.images()[0].has_data());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod extract;
mod reader;
pub mod report;
mod sanitize;
pub mod telemetry;
mod writer;

// Re-exports for convenience
pub use config::{CacheConfig, ExtractionConfig, LogFormat, DEFAULT_LOCK_SHARDS};
pub use error::{CacheError, CacheResult, ConfigError, FailureKind, ResourceFailure};
pub use extract::{ExternalResourceExtractor, ExtractionLocks, ORIGINAL_PATH_METADATA};
pub use reader::GraphReader;
pub use report::{ExtractReport, SanitizeReport, WriteReport};
pub use sanitize::GraphSanitizer;
pub use writer::WriteOrchestrator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for caching graphs
    pub use crate::{
        CacheConfig, ExternalResourceExtractor, GraphReader, GraphSanitizer, WriteOrchestrator,
        WriteReport,
    };
    pub use scenebin_store::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
