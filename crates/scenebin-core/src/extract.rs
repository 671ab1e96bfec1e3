//! External resource extraction
//!
//! Moves image payloads out of a graph into their own bin records. Each
//! image's file name is replaced by the synthetic locator of its key, so the
//! graph record only carries references and every image is stored once no
//! matter how many graphs use it.
//!
//! The check-and-rewrite sequence for one key runs under a shard of a
//! process-wide lock set. With the default configuration the bin write for
//! the image is issued under the same lock.

use crate::config::ExtractionConfig;
use crate::error::ResourceFailure;
use crate::report::ExtractReport;
use parking_lot::{Mutex, MutexGuard};
use scenebin_graph::{walk, Image, ImageRef, NodeRef, Visitor, WriteHint};
use scenebin_store::{CacheBin, CacheKey, CacheObject, Metadata, RecordStatus, SyntheticLocator, WriteOptions};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Metadata entry recording the path an image was extracted from
pub const ORIGINAL_PATH_METADATA: &str = "original_path";

static PROCESS_LOCKS: OnceLock<Arc<ExtractionLocks>> = OnceLock::new();

/// Lock set sharded by cache key
#[derive(Debug)]
pub struct ExtractionLocks {
    shards: Vec<Mutex<()>>,
}

impl ExtractionLocks {
    /// Create a lock set with `shards` shards (at least one)
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Lock set shared by every extractor in the process
    ///
    /// The first call fixes the shard count; later calls asking for a
    /// different count get the existing set.
    #[must_use]
    pub fn process_wide(shards: usize) -> Arc<Self> {
        let locks = PROCESS_LOCKS.get_or_init(|| Arc::new(Self::new(shards)));
        if locks.shard_count() != shards.max(1) {
            debug!(
                requested = shards,
                active = locks.shard_count(),
                "process-wide extraction locks already initialized"
            );
        }
        Arc::clone(locks)
    }

    /// Number of shards
    #[inline]
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard guarding `key`
    #[must_use]
    pub fn shard_for(&self, key: &CacheKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Modulo keeps the value below the shard count, which is a usize
        #[allow(clippy::cast_possible_truncation)]
        let shard = (hasher.finish() % self.shards.len() as u64) as usize;
        shard
    }

    /// Acquire the shard guarding `key`
    pub fn lock(&self, key: &CacheKey) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(key)].lock()
    }
}

/// Extracts image payloads into their own bin records
#[derive(Debug, Clone)]
pub struct ExternalResourceExtractor {
    config: ExtractionConfig,
    locks: Arc<ExtractionLocks>,
}

impl ExternalResourceExtractor {
    /// Extractor using the process-wide lock set
    #[must_use]
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            locks: ExtractionLocks::process_wide(config.lock_shards),
            config,
        }
    }

    /// Replace the lock set
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<ExtractionLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Lock set in use
    #[inline]
    #[must_use]
    pub fn locks(&self) -> &Arc<ExtractionLocks> {
        &self.locks
    }

    /// Extract every image reachable from `root` into `bin`
    ///
    /// Per-image problems are recorded in the report and never stop the
    /// pass.
    pub fn extract(&self, root: &NodeRef, bin: &dyn CacheBin, options: &WriteOptions) -> ExtractReport {
        let mut collector = ImageCollector::default();
        walk(root, &mut collector);

        let mut report = ExtractReport {
            images_visited: collector.images.len(),
            ..ExtractReport::default()
        };
        let image_options = options.with_inline_images();
        for image in &collector.images {
            self.extract_image(image, bin, &image_options, &mut report);
        }

        debug!(
            bin = bin.id(),
            images = report.images_visited,
            written = report.written,
            cached = report.already_cached,
            failures = report.failures.len(),
            "external resources extracted"
        );
        report
    }

    fn extract_image(
        &self,
        image: &ImageRef,
        bin: &dyn CacheBin,
        options: &WriteOptions,
        report: &mut ExtractReport,
    ) {
        let path = image.file_name();
        if path.is_empty() {
            warn!("image without file name cannot be keyed");
            report.failures.push(ResourceFailure::unkeyable(path));
            return;
        }
        if SyntheticLocator::is_locator(&path) {
            report.already_rewritten += 1;
            return;
        }

        let key = CacheKey::for_image(&path);
        let locator = key.locator();
        let guard = self.locks.lock(&key);

        // Another writer may have rewritten this image since the name was read
        if image
            .replace_file_name_if(|current| current == path, locator.as_str())
            .is_none()
        {
            report.already_rewritten += 1;
            return;
        }
        report.rewritten += 1;
        image.set_write_hint(WriteHint::External);
        let pinned = Self::pin(image);

        if self.config.hold_lock_during_write {
            Self::store(pinned, &path, &key, bin, options, report);
            drop(guard);
        } else {
            drop(guard);
            Self::store(pinned, &path, &key, bin, options, report);
        }
    }

    /// Snapshot of `image` holding its current payload
    ///
    /// The live image may release its data at any time once the lock is
    /// gone; the record is written from the snapshot instead.
    fn pin(image: &ImageRef) -> Option<ImageRef> {
        let data = image.data()?;
        Some(
            Image::new(image.file_name())
                .with_dimensions(image.width(), image.height())
                .with_format(image.format())
                .with_write_hint(image.write_hint())
                .with_data(data)
                .into_ref(),
        )
    }

    fn store(
        pinned: Option<ImageRef>,
        path: &str,
        key: &CacheKey,
        bin: &dyn CacheBin,
        options: &WriteOptions,
        report: &mut ExtractReport,
    ) {
        if bin.record_status(key.as_str()) == RecordStatus::Valid {
            debug!(%path, %key, "image already cached");
            report.already_cached += 1;
            return;
        }
        let Some(image) = pinned else {
            warn!(%path, %key, "image has no resident payload");
            report.failures.push(ResourceFailure::missing_payload(path, key.as_str()));
            return;
        };

        let metadata = Metadata::new().with(ORIGINAL_PATH_METADATA, path);
        match bin.write(key.as_str(), &CacheObject::Image(image), &metadata, options) {
            Ok(()) => {
                debug!(%path, %key, "image stored");
                report.written += 1;
            }
            Err(err) => {
                warn!(%path, %key, error = %err, "image write failed");
                report
                    .failures
                    .push(ResourceFailure::store_write(path, key.as_str(), &err));
            }
        }
    }
}

impl Default for ExternalResourceExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

#[derive(Default)]
struct ImageCollector {
    images: Vec<ImageRef>,
}

impl Visitor for ImageCollector {
    fn visit_image(&mut self, image: &ImageRef) {
        self.images.push(image.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenebin_graph::{Node, StateBlock, Texture};
    use scenebin_store::{MemoryCacheBin, ReadOptions};

    fn scene(images: &[ImageRef]) -> NodeRef {
        let state = StateBlock::new();
        for (unit, image) in (0u32..).zip(images) {
            state.add_texture_attribute(unit, Texture::with_image(image.clone()));
        }
        Node::new("root").with_state(state.into_ref()).into_ref()
    }

    fn extractor() -> ExternalResourceExtractor {
        ExternalResourceExtractor::default().with_locks(Arc::new(ExtractionLocks::new(4)))
    }

    #[test]
    fn rewrites_and_stores_image() {
        let image = Image::new("sky.png").with_data(vec![7u8; 8]).into_ref();
        let bin = MemoryCacheBin::new("tiles");

        let report = extractor().extract(&scene(&[image.clone()]), &bin, &WriteOptions::new());

        let key = CacheKey::for_image("sky.png");
        assert_eq!(image.file_name(), key.locator().as_str());
        assert_eq!(image.write_hint(), WriteHint::External);
        assert_eq!((report.images_visited, report.rewritten, report.written), (1, 1, 1));

        let stored = bin.read_image(key.as_str(), &ReadOptions::new()).unwrap().unwrap();
        assert_eq!(stored.data().as_deref(), Some(&[7u8; 8][..]));
        let metadata = bin.read_metadata(key.as_str()).unwrap().unwrap();
        assert_eq!(
            metadata.get(ORIGINAL_PATH_METADATA).and_then(|value| value.as_str()),
            Some("sky.png")
        );
    }

    #[test]
    fn empty_name_is_unkeyable() {
        let image = Image::new("").with_data(vec![1u8]).into_ref();
        let bin = MemoryCacheBin::new("tiles");

        let report = extractor().extract(&scene(&[image.clone()]), &bin, &WriteOptions::new());

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, crate::FailureKind::UnkeyableResource);
        assert_eq!(image.file_name(), "");
        assert_eq!(image.write_hint(), WriteHint::Default);
        assert!(bin.is_empty());
    }

    #[test]
    fn locators_are_skipped() {
        let image = Image::new("sky.png").with_data(vec![1u8]).into_ref();
        let bin = MemoryCacheBin::new("tiles");
        let extractor = extractor();

        extractor.extract(&scene(&[image.clone()]), &bin, &WriteOptions::new());
        let again = extractor.extract(&scene(&[image]), &bin, &WriteOptions::new());

        assert_eq!(again.already_rewritten, 1);
        assert_eq!(again.written, 0);
        assert_eq!(bin.stats().writes, 1);
    }

    #[test]
    fn prefixed_locator_is_not_keyed_again() {
        let locator = format!("textures/{}", CacheKey::for_image("sky.png").locator());
        let image = Image::new(locator.clone()).with_data(vec![1u8]).into_ref();
        let bin = MemoryCacheBin::new("tiles");

        let report = extractor().extract(&scene(&[image.clone()]), &bin, &WriteOptions::new());

        assert_eq!((report.already_rewritten, report.rewritten), (1, 0));
        assert_eq!(image.file_name(), locator);
        assert!(bin.is_empty());
    }

    #[test]
    fn valid_record_is_not_rewritten() {
        let bin = MemoryCacheBin::new("tiles");
        let extractor = extractor();
        let first = Image::new("sky.png").with_data(vec![1u8]).into_ref();
        let second = Image::new("sky.png").with_data(vec![1u8]).into_ref();

        extractor.extract(&scene(&[first]), &bin, &WriteOptions::new());
        let report = extractor.extract(&scene(&[second.clone()]), &bin, &WriteOptions::new());

        assert_eq!((report.rewritten, report.already_cached, report.written), (1, 1, 0));
        assert!(SyntheticLocator::is_locator(&second.file_name()));
        assert_eq!(bin.stats().writes, 1);
    }

    #[test]
    fn image_without_payload_is_a_store_failure() {
        let image = Image::new("sky.png").into_ref();
        let bin = MemoryCacheBin::new("tiles");

        let report = extractor().extract(&scene(&[image.clone()]), &bin, &WriteOptions::new());

        assert_eq!((report.rewritten, report.written), (1, 0));
        let failures: Vec<_> = report.failures_of(crate::FailureKind::StoreWriteFailure).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].key.as_deref(), Some(CacheKey::for_image("sky.png").as_str()));
        assert!(bin.is_empty());
    }

    #[test]
    fn record_keeps_payload_released_after_pinning() {
        let image = Image::new("sky.png").with_data(vec![3u8; 8]).into_ref();
        let pinned = ExternalResourceExtractor::pin(&image).unwrap();
        image.release_data();

        assert!(!image.has_data());
        assert_eq!(pinned.data().as_deref(), Some(&[3u8; 8][..]));
        assert_eq!(pinned.file_name(), image.file_name());
        assert!(!Arc::ptr_eq(&pinned, &image));
    }

    #[test]
    fn write_outside_lock_still_stores() {
        let bin = MemoryCacheBin::new("tiles");
        let config = ExtractionConfig::new().with_hold_lock_during_write(false);
        let extractor = ExternalResourceExtractor::new(config).with_locks(Arc::new(ExtractionLocks::new(1)));
        let image = Image::new("a.png").with_data(vec![1u8]).into_ref();

        let report = extractor.extract(&scene(&[image]), &bin, &WriteOptions::new());
        assert_eq!(report.written, 1);
        assert!(!extractor.config().hold_lock_during_write);
    }

    #[test]
    fn shard_for_is_stable_and_bounded() {
        let locks = ExtractionLocks::new(8);
        let key = CacheKey::for_image("sky.png");
        assert_eq!(locks.shard_for(&key), locks.shard_for(&key));
        assert!(locks.shard_for(&key) < 8);
        assert_eq!(ExtractionLocks::new(0).shard_count(), 1);
    }
}
