//! Cached graph reads

use crate::error::{CacheError, CacheResult};
use scenebin_graph::NodeRef;
use scenebin_store::{CacheBin, CacheObject, ReadOptions};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::debug;

/// Loads graphs written by [`WriteOrchestrator`](crate::WriteOrchestrator)
#[derive(Clone)]
pub struct GraphReader {
    bin: Arc<dyn CacheBin>,
}

impl GraphReader {
    /// Reader over `bin`
    #[must_use]
    pub fn new(bin: Arc<dyn CacheBin>) -> Self {
        Self { bin }
    }

    /// Load the graph stored under `key`
    ///
    /// External image references are resolved through `options`; when the
    /// options carry no bin, this reader's bin is supplied. Returns
    /// `Ok(None)` if nothing is stored under `key`.
    ///
    /// # Errors
    /// Returns error if the record is unreadable or holds an image
    pub fn read_node(&self, key: &str, options: ReadOptions) -> CacheResult<Option<NodeRef>> {
        let options = if options.cache_bin().is_some() {
            options
        } else {
            options.with_bin(Arc::clone(&self.bin))
        };

        match self.bin.read_object(key, &options)? {
            Some(CacheObject::Node(node)) => {
                debug!(bin = self.bin.id(), %key, "graph loaded");
                Ok(Some(node))
            }
            Some(CacheObject::Image(_)) => Err(CacheError::NotAGraph {
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }
}

impl Debug for GraphReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphReader")
            .field("bin", &self.bin.id())
            .finish()
    }
}
