//! Reports returned by the write pipeline

use crate::error::{FailureKind, ResourceFailure};
use scenebin_store::BinError;

/// Outcome of one sanitizer pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub nodes_visited: usize,
    pub drawables_visited: usize,
    pub state_blocks_visited: usize,
    /// Annotation slots that held data and were cleared
    pub annotations_cleared: usize,
    /// Texture attributes replaced by a private copy
    pub textures_isolated: usize,
    pub failures: Vec<ResourceFailure>,
}

/// Outcome of one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Distinct images reached
    pub images_visited: usize,
    /// Images whose file name was replaced by a locator
    pub rewritten: usize,
    /// Images that already carried a locator
    pub already_rewritten: usize,
    /// Images whose record was already valid in the bin
    pub already_cached: usize,
    /// Image records written to the bin
    pub written: usize,
    pub failures: Vec<ResourceFailure>,
}

impl ExtractReport {
    /// Failures of the given kind
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &ResourceFailure> {
        self.failures.iter().filter(move |failure| failure.kind == kind)
    }
}

/// Outcome of an orchestrated graph write
#[derive(Debug)]
pub struct WriteReport {
    /// Key the graph was written under
    pub key: String,
    pub sanitize: SanitizeReport,
    pub extract: ExtractReport,
    /// Error from the final graph write, if it failed
    pub graph_error: Option<BinError>,
}

impl WriteReport {
    /// True iff the graph record was written
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.graph_error.is_none()
    }

    /// Every per-resource failure, sanitizer first
    pub fn failures(&self) -> impl Iterator<Item = &ResourceFailure> {
        self.sanitize.failures.iter().chain(&self.extract.failures)
    }
}
