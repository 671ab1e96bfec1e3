//! scenebin Store Layer
//!
//! Cache keys, the cache bin contract and the redirect loader that serves
//! synthetic locators from a bin.
//!
//! # Core Concepts
//!
//! - [`CacheKey`]: Deterministic key derived from a resource path
//! - [`SyntheticLocator`]: Key plus redirect extension, embedded in graphs
//! - [`CacheBin`]: Key/value object store contract
//! - [`ReadOptions`]: Load context carrying the active bin
//! - [`RedirectResolver`]: Loader turning locators into bin lookups
//! - [`MemoryCacheBin`] / [`DirectoryCacheBin`]: Reference backends
//!
//! # Example
//!
//! ```rust
//! use scenebin_graph::Image;
//! use scenebin_store::{CacheBin, CacheKey, MemoryCacheBin, Metadata, ReadOptions, WriteOptions};
//!
//! let bin = MemoryCacheBin::new("tiles");
//! let key = CacheKey::for_image("sky.png");
//! let image = Image::new(key.locator().as_str()).with_data(vec![1u8, 2, 3]).into_ref();
//!
//! bin.write(key.as_str(), &image.into(), &Metadata::new(), &WriteOptions::new().with_inline_images())
//!     .unwrap();
//!
//! let loaded = bin.read_image(key.as_str(), &ReadOptions::new()).unwrap().unwrap();
//! assert_eq!(loaded.data().as_deref(), Some(&[1u8, 2, 3][..]));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod bin;
pub mod codec;
mod directory;
mod error;
mod key;
mod loader;
mod memory;
mod options;
mod redirect;

// Re-exports
pub use bin::{CacheBin, CacheObject, RecordStatus};
pub use directory::DirectoryCacheBin;
pub use error::{BinError, CodecError, KeyError};
pub use key::{
    has_redirect_extension, lowercase_extension, name_less_extension, CacheKey, ResourceKind,
    SyntheticLocator, REDIRECT_EXTENSION,
};
pub use loader::{FileLoader, LoadOutcome, LoaderChain, MissReason, ReaderWriter};
pub use memory::{CacheStats, MemoryCacheBin};
pub use options::{Metadata, ReadOptions, WriteImageHint, WriteOptions};
pub use redirect::RedirectResolver;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with cache bins
    pub use crate::{
        CacheBin, CacheKey, CacheObject, Metadata, ReadOptions, RecordStatus, ResourceKind,
        SyntheticLocator, WriteOptions,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
