//! In-process cache bin
//!
//! Records are kept encoded, exactly as a persistent backend would store
//! them, so reads always produce fresh objects that share nothing with the
//! graph that was written.

use crate::bin::{validate_key, CacheBin, CacheObject, RecordStatus};
use crate::codec;
use crate::error::BinError;
use crate::key::ResourceKind;
use crate::options::{Metadata, ReadOptions, WriteOptions};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Statistics for bin usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Object and image reads
    pub reads: u64,
    /// Reads that found a record
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Successful writes
    pub writes: u64,
    /// Number of stored records
    pub entry_count: u64,
    /// Encoded bytes held
    pub bytes: u64,
}

impl CacheStats {
    /// Fraction of reads that hit, 0.0 with no reads
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.hits as f64 / self.reads as f64
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    bytes: Arc<[u8]>,
    metadata: Metadata,
    kind: ResourceKind,
    written_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Cache bin backed by a concurrent in-memory map
#[derive(Debug)]
pub struct MemoryCacheBin {
    id: String,
    records: DashMap<String, StoredRecord>,
    max_age: Option<Duration>,
    counters: Counters,
}

impl MemoryCacheBin {
    /// Create an empty bin whose records never expire
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: DashMap::new(),
            max_age: None,
            counters: Counters::default(),
        }
    }

    /// Expire records older than `max_age`
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Configured maximum record age
    #[inline]
    #[must_use]
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Kind of the record under `key`
    #[must_use]
    pub fn kind_of(&self, key: &str) -> Option<ResourceKind> {
        self.records.get(key).map(|record| record.kind)
    }

    /// Usage statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            entry_count: self.records.len() as u64,
            bytes: self.storage_size(),
        }
    }

    fn is_expired(&self, record: &StoredRecord) -> bool {
        self.max_age
            .is_some_and(|max_age| record.written_at.elapsed() > max_age)
    }
}

impl CacheBin for MemoryCacheBin {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(
        &self,
        key: &str,
        object: &CacheObject,
        metadata: &Metadata,
        options: &WriteOptions,
    ) -> Result<(), BinError> {
        validate_key(key)?;
        let bytes = codec::encode(object, options).map_err(|err| BinError::codec(key, err))?;
        debug!(bin = %self.id, %key, kind = %object.kind(), size = bytes.len(), "record stored");

        self.records.insert(
            key.to_string(),
            StoredRecord {
                bytes: bytes.into(),
                metadata: metadata.clone(),
                kind: object.kind(),
                written_at: Instant::now(),
            },
        );
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_object(&self, key: &str, options: &ReadOptions) -> Result<Option<CacheObject>, BinError> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);

        // Clone the bytes out so no shard lock is held while decoding;
        // decoding may re-enter this bin through the redirect loader.
        let bytes = self.records.get(key).map(|record| record.bytes.clone());
        let Some(bytes) = bytes else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        self.counters.hits.fetch_add(1, Ordering::Relaxed);

        codec::decode(&bytes, options)
            .map(Some)
            .map_err(|err| BinError::codec(key, err))
    }

    fn read_metadata(&self, key: &str) -> Result<Option<Metadata>, BinError> {
        Ok(self.records.get(key).map(|record| record.metadata.clone()))
    }

    fn record_status(&self, key: &str) -> RecordStatus {
        match self.records.get(key) {
            Some(record) if self.is_expired(&record) => RecordStatus::Expired,
            Some(_) => RecordStatus::Valid,
            None => RecordStatus::Missing,
        }
    }

    fn remove(&self, key: &str) -> Result<bool, BinError> {
        Ok(self.records.remove(key).is_some())
    }

    fn touch(&self, key: &str) -> Result<bool, BinError> {
        Ok(match self.records.get_mut(key) {
            Some(mut record) => {
                record.written_at = Instant::now();
                true
            }
            None => false,
        })
    }

    fn clear(&self) -> Result<(), BinError> {
        self.records.clear();
        Ok(())
    }

    fn storage_size(&self) -> u64 {
        self.records
            .iter()
            .map(|record| record.bytes.len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenebin_graph::{Image, Node};
    use std::thread;

    fn image_object(name: &str) -> CacheObject {
        Image::new(name).with_data(vec![5u8; 8]).into_ref().into()
    }

    #[test]
    fn write_then_read() {
        let bin = MemoryCacheBin::new("tiles");
        let meta = Metadata::new().with("source", "test");
        bin.write("i_a", &image_object("a.png"), &meta, &WriteOptions::new())
            .unwrap();

        let image = bin
            .read_image("i_a", &ReadOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(image.file_name(), "a.png");
        assert_eq!(image.data().as_deref(), Some(&[5u8; 8][..]));
        assert_eq!(bin.read_metadata("i_a").unwrap(), Some(meta));
        assert_eq!(bin.kind_of("i_a"), Some(ResourceKind::Image));
    }

    #[test]
    fn missing_key_reads_none() {
        let bin = MemoryCacheBin::new("tiles");
        assert!(bin.read_object("nope", &ReadOptions::new()).unwrap().is_none());
        assert_eq!(bin.record_status("nope"), RecordStatus::Missing);

        let stats = bin.stats();
        assert_eq!((stats.reads, stats.misses, stats.hits), (1, 1, 0));
        assert!(stats.hit_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn read_image_of_graph_is_wrong_kind() {
        let bin = MemoryCacheBin::new("tiles");
        bin.write(
            "scene1",
            &Node::new("root").into_ref().into(),
            &Metadata::new(),
            &WriteOptions::new(),
        )
        .unwrap();

        let err = bin.read_image("scene1", &ReadOptions::new()).unwrap_err();
        assert!(matches!(err, BinError::WrongKind { .. }));
    }

    #[test]
    fn records_expire_and_touch_refreshes() {
        let bin = MemoryCacheBin::new("tiles").with_max_age(Duration::from_millis(20));
        bin.write("k", &image_object("a.png"), &Metadata::new(), &WriteOptions::new())
            .unwrap();
        assert_eq!(bin.record_status("k"), RecordStatus::Valid);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(bin.record_status("k"), RecordStatus::Expired);

        assert!(bin.touch("k").unwrap());
        assert_eq!(bin.record_status("k"), RecordStatus::Valid);
        assert!(!bin.touch("other").unwrap());
    }

    #[test]
    fn remove_and_clear() {
        let bin = MemoryCacheBin::new("tiles");
        for key in ["a", "b", "c"] {
            bin.write(key, &image_object(key), &Metadata::new(), &WriteOptions::new())
                .unwrap();
        }
        assert!(bin.storage_size() > 0);
        assert_eq!(bin.keys(), vec!["a", "b", "c"]);

        assert!(bin.remove("b").unwrap());
        assert!(!bin.remove("b").unwrap());
        assert_eq!(bin.len(), 2);

        bin.clear().unwrap();
        assert!(bin.is_empty());
        assert_eq!(bin.storage_size(), 0);
    }

    #[test]
    fn invalid_key_rejected() {
        let bin = MemoryCacheBin::new("tiles");
        let err = bin
            .write("", &image_object("a.png"), &Metadata::new(), &WriteOptions::new())
            .unwrap_err();
        assert!(matches!(err, BinError::InvalidKey(_)));
        assert_eq!(bin.stats().writes, 0);
    }

    #[test]
    fn concurrent_writers() {
        let bin = Arc::new(MemoryCacheBin::new("tiles"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bin = Arc::clone(&bin);
                thread::spawn(move || {
                    let key = format!("k{}", i % 4);
                    bin.write(&key, &image_object(&key), &Metadata::new(), &WriteOptions::new())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bin.len(), 4);
        assert_eq!(bin.stats().writes, 8);
    }
}
