//! Image resources referenced by textures
//!
//! An [`Image`] is the large binary payload the cache extracts and stores
//! under its own key. Its `file_name` is the identity used to derive that key.

use crate::annotation::Annotations;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to an image
pub type ImageRef = Arc<Image>;

/// Pixel layout of an image payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single 8-bit channel
    R8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGBA
    #[default]
    Rgba8,
    /// Block-compressed data, opaque to the cache
    Compressed,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::R8 => Some(1),
            Self::Rgb8 => Some(3),
            Self::Rgba8 => Some(4),
            Self::Compressed => None,
        }
    }
}

/// How a serializer should treat the image when writing a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteHint {
    /// Serializer decides (pixel data is embedded)
    #[default]
    Default,
    /// Write only the file name; the payload lives elsewhere
    External,
    /// Always embed the payload
    IncludeData,
}

/// Image payload with its identity path
#[derive(Debug)]
pub struct Image {
    file_name: RwLock<String>,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: RwLock<Option<Arc<[u8]>>>,
    write_hint: Mutex<WriteHint>,
    annotations: Annotations,
}

impl Image {
    /// Create an image with no payload
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: RwLock::new(file_name.into()),
            width: 0,
            height: 0,
            format: PixelFormat::default(),
            data: RwLock::new(None),
            write_hint: Mutex::new(WriteHint::Default),
            annotations: Annotations::new(),
        }
    }

    /// Set dimensions
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set pixel format
    #[must_use]
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the payload
    #[must_use]
    pub fn with_data(self, data: impl Into<Arc<[u8]>>) -> Self {
        *self.data.write() = Some(data.into());
        self
    }

    /// Set the write hint
    #[must_use]
    pub fn with_write_hint(self, hint: WriteHint) -> Self {
        *self.write_hint.lock() = hint;
        self
    }

    /// Wrap in a shared handle
    #[inline]
    #[must_use]
    pub fn into_ref(self) -> ImageRef {
        Arc::new(self)
    }

    /// Current file name (identity path or synthetic locator)
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file_name.read().clone()
    }

    /// Replace the file name
    pub fn set_file_name(&self, file_name: impl Into<String>) {
        *self.file_name.write() = file_name.into();
    }

    /// Replace the file name only if `should_replace` accepts the current one
    ///
    /// Check and replacement happen under one write lock. Returns the
    /// previous name when a replacement happened.
    pub fn replace_file_name_if<F>(&self, should_replace: F, file_name: impl Into<String>) -> Option<String>
    where
        F: FnOnce(&str) -> bool,
    {
        let mut guard = self.file_name.write();
        if should_replace(&guard) {
            Some(std::mem::replace(&mut *guard, file_name.into()))
        } else {
            None
        }
    }

    /// Width in pixels
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format
    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Payload, if still resident
    #[must_use]
    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.data.read().clone()
    }

    /// Check whether the payload is resident
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.read().is_some()
    }

    /// Replace the payload
    pub fn set_data(&self, data: impl Into<Arc<[u8]>>) {
        *self.data.write() = Some(data.into());
    }

    /// Drop the payload from memory. Returns `true` if something was released.
    pub fn release_data(&self) -> bool {
        self.data.write().take().is_some()
    }

    /// Current write hint
    #[must_use]
    pub fn write_hint(&self) -> WriteHint {
        *self.write_hint.lock()
    }

    /// Change the write hint
    pub fn set_write_hint(&self, hint: WriteHint) {
        *self.write_hint.lock() = hint;
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}
