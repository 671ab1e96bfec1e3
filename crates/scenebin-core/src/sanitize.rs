//! Graph sanitizer
//!
//! Prepares a graph for serialization:
//! - detaches annotations from every node, drawable, state block and
//!   attribute
//! - replaces every texture, global or bound on a texture unit, by a private
//!   shallow copy whose auto-release flag is cleared, so uploading the live
//!   graph can no longer drop image payloads that the writer still needs
//!
//! The original textures are left untouched. A texture shared by several
//! state blocks is replaced by a single copy, keeping the sharing visible to
//! the encoder.

use crate::error::ResourceFailure;
use crate::report::SanitizeReport;
use scenebin_graph::{
    identity, Annotations, DrawableRef, NodeRef, StateAttribute, StateBlockRef, Texture, Traversal,
    Visitor,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Strips annotations and isolates textures before a graph is written
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSanitizer;

impl GraphSanitizer {
    /// Create a sanitizer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Sanitize the graph below `root` in place
    pub fn sanitize(&self, root: &NodeRef) -> SanitizeReport {
        let mut pass = SanitizePass::default();
        let mut traversal = Traversal::new();
        traversal.walk(root, &mut pass);

        let stats = traversal.stats();
        let report = SanitizeReport {
            nodes_visited: stats.nodes,
            drawables_visited: stats.drawables,
            state_blocks_visited: stats.state_blocks,
            annotations_cleared: pass.annotations_cleared,
            textures_isolated: pass.copies.len(),
            failures: pass.failures,
        };
        debug!(
            nodes = report.nodes_visited,
            annotations = report.annotations_cleared,
            textures = report.textures_isolated,
            "graph sanitized"
        );
        report
    }
}

#[derive(Default)]
struct SanitizePass {
    annotations_cleared: usize,
    /// Original texture identity -> (original, copy). The original handle
    /// keeps its address from being reused during the pass.
    copies: HashMap<usize, (Arc<Texture>, Arc<Texture>)>,
    copy_ids: HashSet<usize>,
    failed: HashSet<usize>,
    failures: Vec<ResourceFailure>,
}

impl SanitizePass {
    fn clear(&mut self, annotations: &Annotations) {
        if annotations.detach().is_some() {
            self.annotations_cleared += 1;
        }
    }

    fn isolate_attribute(&mut self, attribute: &StateAttribute) -> Option<StateAttribute> {
        attribute
            .as_texture()
            .and_then(|texture| self.isolate(texture))
            .map(StateAttribute::Texture)
    }

    /// Copy to substitute for `texture`, or `None` to leave it in place
    fn isolate(&mut self, texture: &Arc<Texture>) -> Option<Arc<Texture>> {
        let id = identity(texture);
        if self.copy_ids.contains(&id) || self.failed.contains(&id) {
            return None;
        }
        if let Some((_, copy)) = self.copies.get(&id) {
            return Some(copy.clone());
        }

        match texture.shallow_clone() {
            Ok(copy) => {
                copy.set_unref_image_data_after_apply(false);
                let copy = Arc::new(copy);
                self.copy_ids.insert(identity(&copy));
                self.copies.insert(id, (texture.clone(), copy.clone()));
                Some(copy)
            }
            Err(err) => {
                let path = texture
                    .images()
                    .first()
                    .map(|image| image.file_name())
                    .unwrap_or_default();
                warn!(%path, error = %err, "texture left in place, cannot be copied");
                self.failed.insert(id);
                self.failures.push(ResourceFailure::clone_failure(path, &err));
                None
            }
        }
    }
}

impl Visitor for SanitizePass {
    fn visit_node(&mut self, node: &NodeRef) {
        self.clear(node.annotations());
    }

    fn visit_drawable(&mut self, drawable: &DrawableRef) {
        self.clear(drawable.annotations());
    }

    fn visit_state_block(&mut self, state: &StateBlockRef) {
        self.clear(state.annotations());
        state.replace_attributes(|attribute| self.isolate_attribute(attribute));
        state.replace_texture_attributes(|_unit, attribute| self.isolate_attribute(attribute));
    }

    fn visit_attribute(&mut self, attribute: &StateAttribute) {
        match attribute {
            StateAttribute::Texture(texture) => {
                let id = identity(texture);
                // Only private copies are cleaned; originals stay untouched
                if !self.copy_ids.contains(&id) {
                    return;
                }
                self.clear(texture.annotations());
                for image in texture.images() {
                    self.clear(image.annotations());
                }
            }
            StateAttribute::Material(_) | StateAttribute::Uniform(_) => {
                self.clear(attribute.annotations());
            }
        }
    }
}
