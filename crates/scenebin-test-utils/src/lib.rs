//! Testing utilities for the scenebin workspace
//!
//! Scene fixtures and a bin wrapper that counts writes and injects failures.

#![allow(missing_docs)]

use parking_lot::Mutex;
use scenebin_graph::{
    Drawable, Image, ImageRef, Material, Node, NodeRef, PixelFormat, StateBlock, Texture,
};
use scenebin_store::{
    BinError, CacheBin, CacheObject, MemoryCacheBin, Metadata, ReadOptions, RecordStatus,
    WriteOptions,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 2x2 RGBA image with a recognisable payload
pub fn image(name: &str, fill: u8) -> ImageRef {
    Image::new(name)
        .with_dimensions(2, 2)
        .with_format(PixelFormat::Rgba8)
        .with_data(vec![fill; 16])
        .into_ref()
}

/// Node with one texture per image on consecutive units
pub fn textured_node(name: &str, images: &[ImageRef]) -> NodeRef {
    let state = StateBlock::new().with_attribute(Material::new("default", [1.0; 4]));
    for (unit, image) in (0u32..).zip(images) {
        state.add_texture_attribute(
            unit,
            Texture::with_image(image.clone()).with_unref_after_apply(true),
        );
    }
    Node::new(name).with_state(state.into_ref()).into_ref()
}

/// Root with one textured child using `sky.png`
pub fn sky_scene() -> (NodeRef, ImageRef) {
    let sky = image("sky.png", 0x5A);
    let child = textured_node("sky-dome", &[sky.clone()]);
    let root = Node::new("root").with_child(child).into_ref();
    (root, sky)
}

/// Two children sharing one texture and one drawable, plus a second image
pub fn shared_texture_scene() -> (NodeRef, Vec<ImageRef>) {
    let grass = image("terrain/grass.png", 0x11);
    let rock = image("terrain/rock.png", 0x22);
    let shared = Arc::new(Texture::with_image(grass.clone()).with_unref_after_apply(true));

    let state = |extra: Option<&ImageRef>| {
        let block = StateBlock::new().with_texture_attribute(0, shared.clone());
        if let Some(image) = extra {
            block.add_texture_attribute(1, Texture::with_image(image.clone()));
        }
        block.into_ref()
    };
    let quad = Drawable::new("quad", vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]])
        .with_state(state(None))
        .into_ref();

    let left = Node::new("left")
        .with_state(state(Some(&rock)))
        .with_drawable(quad.clone())
        .into_ref();
    let right = Node::new("right")
        .with_state(state(None))
        .with_drawable(quad)
        .into_ref();
    let root = Node::new("root").with_child(left).with_child(right).into_ref();
    (root, vec![grass, rock])
}

type KeyPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type KeyHook = Box<dyn Fn(&str) + Send + Sync>;

/// Bin wrapper recording writes and failing selected keys
pub struct RecordingBin {
    inner: Arc<dyn CacheBin>,
    writes: Mutex<HashMap<String, usize>>,
    status_checks: AtomicUsize,
    fail_writes: Option<KeyPredicate>,
    on_status_check: Option<KeyHook>,
}

impl RecordingBin {
    /// Wrap an in-memory bin named `id`
    pub fn new(id: &str) -> Self {
        Self::wrap(Arc::new(MemoryCacheBin::new(id)))
    }

    /// Wrap an existing bin
    pub fn wrap(inner: Arc<dyn CacheBin>) -> Self {
        Self {
            inner,
            writes: Mutex::new(HashMap::new()),
            status_checks: AtomicUsize::new(0),
            fail_writes: None,
            on_status_check: None,
        }
    }

    /// Reject writes whose key matches `predicate`
    #[must_use]
    pub fn failing_writes(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_writes = Some(Box::new(predicate));
        self
    }

    /// Run `hook` before every `record_status` call
    #[must_use]
    pub fn on_status_check(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_status_check = Some(Box::new(hook));
        self
    }

    /// Successful writes recorded for `key`
    pub fn writes_for(&self, key: &str) -> usize {
        self.writes.lock().get(key).copied().unwrap_or(0)
    }

    /// Successful writes across all keys
    pub fn total_writes(&self) -> usize {
        self.writes.lock().values().sum()
    }

    /// Keys written at least once
    pub fn written_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.writes.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of `record_status` calls
    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }
}

impl CacheBin for RecordingBin {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn write(
        &self,
        key: &str,
        object: &CacheObject,
        metadata: &Metadata,
        options: &WriteOptions,
    ) -> Result<(), BinError> {
        if self.fail_writes.as_ref().is_some_and(|fail| fail(key)) {
            return Err(BinError::rejected(self.id(), key, "injected failure"));
        }
        self.inner.write(key, object, metadata, options)?;
        *self.writes.lock().entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn read_object(&self, key: &str, options: &ReadOptions) -> Result<Option<CacheObject>, BinError> {
        self.inner.read_object(key, options)
    }

    fn read_metadata(&self, key: &str) -> Result<Option<Metadata>, BinError> {
        self.inner.read_metadata(key)
    }

    fn record_status(&self, key: &str) -> RecordStatus {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_status_check {
            hook(key);
        }
        self.inner.record_status(key)
    }

    fn remove(&self, key: &str) -> Result<bool, BinError> {
        self.inner.remove(key)
    }

    fn touch(&self, key: &str) -> Result<bool, BinError> {
        self.inner.touch(key)
    }

    fn clear(&self) -> Result<(), BinError> {
        self.writes.lock().clear();
        self.inner.clear()
    }

    fn storage_size(&self) -> u64 {
        self.inner.storage_size()
    }
}
