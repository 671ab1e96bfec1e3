//! Loader chain for external references
//!
//! When a decoded graph names an image by location instead of embedding it,
//! the location is offered to each [`ReaderWriter`] in order. The first one
//! that handles the location decides the outcome.

use crate::bin::CacheObject;
use crate::options::ReadOptions;
use crate::redirect::RedirectResolver;
use scenebin_graph::{Image, ImageRef, PixelFormat};
use std::fmt::{self, Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Why a handled location produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissReason {
    /// Read options carry no cache bin
    MissingAmbientBin,
    /// Nothing stored under the key
    KeyNotFound,
    /// Record holds another kind of object
    WrongKind,
    /// Record exists but could not be read
    Unreadable,
}

impl Display for MissReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingAmbientBin => "no cache bin in read options",
            Self::KeyNotFound => "key not found",
            Self::WrongKind => "record holds another kind",
            Self::Unreadable => "record unreadable",
        })
    }
}

/// Result of offering a location to a loader
#[derive(Debug, Clone)]
pub enum LoadOutcome<T> {
    /// Loaded successfully
    Found(T),
    /// Loader is responsible for the location but has nothing for it
    NotFound(MissReason),
    /// Loader does not handle this kind of location
    NotHandled,
}

impl<T> LoadOutcome<T> {
    /// Loaded value, if any
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound(_) | Self::NotHandled => None,
        }
    }

    /// Check whether the loader declined the location
    #[inline]
    #[must_use]
    pub fn is_not_handled(&self) -> bool {
        matches!(self, Self::NotHandled)
    }
}

/// A loader that may handle some locations
pub trait ReaderWriter: Send + Sync + Debug {
    /// Loader name for logs
    fn name(&self) -> &str;

    /// Load a generic object from `location`
    fn read_object(&self, location: &str, options: &ReadOptions) -> LoadOutcome<CacheObject>;

    /// Load an image from `location`
    fn read_image(&self, location: &str, options: &ReadOptions) -> LoadOutcome<ImageRef>;
}

/// Ordered list of loaders
#[derive(Debug, Clone)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn ReaderWriter>>,
}

impl LoaderChain {
    /// Chain with no loaders
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Append a loader
    #[must_use]
    pub fn with(mut self, loader: impl ReaderWriter + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Number of loaders
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Loader names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.loaders.iter().map(|loader| loader.name())
    }

    /// Offer `location` as an object to each loader in turn
    #[must_use]
    pub fn read_object(&self, location: &str, options: &ReadOptions) -> LoadOutcome<CacheObject> {
        self.first_handled(|loader| loader.read_object(location, options))
    }

    /// Offer `location` as an image to each loader in turn
    #[must_use]
    pub fn read_image(&self, location: &str, options: &ReadOptions) -> LoadOutcome<ImageRef> {
        self.first_handled(|loader| loader.read_image(location, options))
    }

    fn first_handled<T>(&self, mut load: impl FnMut(&dyn ReaderWriter) -> LoadOutcome<T>) -> LoadOutcome<T> {
        for loader in &self.loaders {
            let outcome = load(loader.as_ref());
            if !outcome.is_not_handled() {
                return outcome;
            }
        }
        LoadOutcome::NotHandled
    }
}

impl Default for LoaderChain {
    fn default() -> Self {
        Self::empty().with(RedirectResolver).with(FileLoader::new())
    }
}

/// Reads raw image bytes from the filesystem
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    /// Loader resolving locations as given
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader resolving relative locations under `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        match &self.root {
            Some(root) if Path::new(location).is_relative() => root.join(location),
            _ => PathBuf::from(location),
        }
    }
}

impl ReaderWriter for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    fn read_object(&self, _location: &str, _options: &ReadOptions) -> LoadOutcome<CacheObject> {
        // Graphs are only ever loaded from a bin
        LoadOutcome::NotHandled
    }

    fn read_image(&self, location: &str, _options: &ReadOptions) -> LoadOutcome<ImageRef> {
        if location.is_empty() || crate::key::has_redirect_extension(location) {
            return LoadOutcome::NotHandled;
        }
        let path = self.resolve(location);
        match std::fs::read(&path) {
            Ok(bytes) => LoadOutcome::Found(
                Image::new(location)
                    .with_format(PixelFormat::Compressed)
                    .with_data(bytes)
                    .into_ref(),
            ),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "image file not readable");
                LoadOutcome::NotFound(MissReason::KeyNotFound)
            }
        }
    }
}
