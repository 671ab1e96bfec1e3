//! Orchestrated graph writes
//!
//! A write runs three steps in strict order:
//! 1. sanitize the graph ([`GraphSanitizer`])
//! 2. extract images into their own records ([`ExternalResourceExtractor`])
//! 3. write the graph record itself
//!
//! Per-resource failures in steps 1 and 2 are logged and reported; only the
//! final write decides whether the call succeeded. Nothing is rolled back
//! when it fails: image records written in step 2 stay in the bin.

use crate::config::CacheConfig;
use crate::extract::ExternalResourceExtractor;
use crate::report::WriteReport;
use crate::sanitize::GraphSanitizer;
use scenebin_graph::NodeRef;
use scenebin_store::{CacheBin, CacheObject, Metadata, WriteOptions};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::{info, warn};

/// Writes graphs to a cache bin with external image deduplication
#[derive(Clone)]
pub struct WriteOrchestrator {
    bin: Arc<dyn CacheBin>,
    sanitizer: GraphSanitizer,
    extractor: ExternalResourceExtractor,
}

impl WriteOrchestrator {
    /// Orchestrator with default configuration
    #[must_use]
    pub fn new(bin: Arc<dyn CacheBin>) -> Self {
        Self::with_config(bin, &CacheConfig::default())
    }

    /// Orchestrator using `config`
    #[must_use]
    pub fn with_config(bin: Arc<dyn CacheBin>, config: &CacheConfig) -> Self {
        Self {
            bin,
            sanitizer: GraphSanitizer::new(),
            extractor: ExternalResourceExtractor::new(config.extraction),
        }
    }

    /// Replace the extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: ExternalResourceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Bin written to
    #[inline]
    #[must_use]
    pub fn bin(&self) -> &Arc<dyn CacheBin> {
        &self.bin
    }

    /// Extractor in use
    #[inline]
    #[must_use]
    pub fn extractor(&self) -> &ExternalResourceExtractor {
        &self.extractor
    }

    /// Sanitize, extract and write the graph under `key`
    pub fn write_node(
        &self,
        key: &str,
        root: &NodeRef,
        metadata: &Metadata,
        options: &WriteOptions,
    ) -> WriteReport {
        let sanitize = self.sanitizer.sanitize(root);
        let extract = self.extractor.extract(root, self.bin.as_ref(), options);

        let graph_error = self
            .bin
            .write(key, &CacheObject::Node(root.clone()), metadata, options)
            .err();

        let report = WriteReport {
            key: key.to_string(),
            sanitize,
            extract,
            graph_error,
        };
        for failure in report.failures() {
            warn!(%key, %failure, "resource not cached");
        }
        match &report.graph_error {
            None => info!(
                bin = self.bin.id(),
                %key,
                images = report.extract.images_visited,
                written = report.extract.written,
                "graph cached"
            ),
            Some(err) => warn!(bin = self.bin.id(), %key, error = %err, "graph write failed"),
        }
        report
    }
}

impl Debug for WriteOrchestrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOrchestrator")
            .field("bin", &self.bin.id())
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
