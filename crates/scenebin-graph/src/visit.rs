//! Identity-aware graph traversal
//!
//! Graphs are DAGs with shared sub-objects. [`Traversal`] visits every
//! distinct node, drawable, state block, attribute and image exactly once,
//! keyed by `Arc` identity rather than by value.
//!
//! State blocks are handed to the visitor *before* their attributes are
//! enumerated, so a visitor may substitute attributes and the traversal
//! continues into the substituted ones.

use crate::identity;
use crate::image::ImageRef;
use crate::node::{DrawableRef, NodeRef};
use crate::state::{StateAttribute, StateBlockRef};
use std::collections::HashSet;

/// Callbacks invoked by [`Traversal`]
pub trait Visitor {
    fn visit_node(&mut self, _node: &NodeRef) {}

    fn visit_drawable(&mut self, _drawable: &DrawableRef) {}

    fn visit_state_block(&mut self, _state: &StateBlockRef) {}

    fn visit_attribute(&mut self, _attribute: &StateAttribute) {}

    fn visit_image(&mut self, _image: &ImageRef) {}
}

/// Counts of distinct objects visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub nodes: usize,
    pub drawables: usize,
    pub state_blocks: usize,
    pub attributes: usize,
    pub images: usize,
}

/// Depth-first traversal with visited sets
#[derive(Debug, Default)]
pub struct Traversal {
    nodes: HashSet<usize>,
    drawables: HashSet<usize>,
    state_blocks: HashSet<usize>,
    attributes: HashSet<usize>,
    images: HashSet<usize>,
}

impl Traversal {
    /// Create a traversal with empty visited sets
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the graph below `root`
    ///
    /// Objects already seen by this traversal (including in earlier walks
    /// with the same instance) are skipped.
    pub fn walk<V: Visitor + ?Sized>(&mut self, root: &NodeRef, visitor: &mut V) {
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if !self.nodes.insert(identity(&node)) {
                continue;
            }
            visitor.visit_node(&node);

            if let Some(state) = node.state() {
                self.state_block(&state, visitor);
            }

            for drawable in node.drawables() {
                if !self.drawables.insert(identity(&drawable)) {
                    continue;
                }
                visitor.visit_drawable(&drawable);
                if let Some(state) = drawable.state() {
                    self.state_block(&state, visitor);
                }
            }

            // Reverse so children are visited in declaration order
            for child in node.children().into_iter().rev() {
                stack.push(child);
            }
        }
    }

    fn state_block<V: Visitor + ?Sized>(&mut self, state: &StateBlockRef, visitor: &mut V) {
        if !self.state_blocks.insert(identity(state)) {
            return;
        }
        visitor.visit_state_block(state);

        for attribute in state.all_attributes() {
            if !self.attributes.insert(attribute.identity()) {
                continue;
            }
            visitor.visit_attribute(&attribute);

            if let StateAttribute::Texture(texture) = &attribute {
                for image in texture.images() {
                    if self.images.insert(identity(image)) {
                        visitor.visit_image(image);
                    }
                }
            }
        }
    }

    /// Distinct objects visited so far
    #[must_use]
    pub fn stats(&self) -> TraversalStats {
        TraversalStats {
            nodes: self.nodes.len(),
            drawables: self.drawables.len(),
            state_blocks: self.state_blocks.len(),
            attributes: self.attributes.len(),
            images: self.images.len(),
        }
    }
}

/// Walk `root` once with a fresh traversal
pub fn walk<V: Visitor + ?Sized>(root: &NodeRef, visitor: &mut V) -> TraversalStats {
    let mut traversal = Traversal::new();
    traversal.walk(root, visitor);
    traversal.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use crate::node::{Drawable, Node};
    use crate::state::{Material, StateBlock, Texture};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        nodes: Vec<String>,
        images: Vec<String>,
    }

    impl Visitor for Recorder {
        fn visit_node(&mut self, node: &NodeRef) {
            self.nodes.push(node.name().to_string());
        }

        fn visit_image(&mut self, image: &ImageRef) {
            self.images.push(image.file_name());
        }
    }

    #[test]
    fn shared_objects_visited_once() {
        let image = Image::new("shared.png").into_ref();
        let texture = Arc::new(Texture::with_image(image.clone()));
        let state = StateBlock::new()
            .with_texture_attribute(0, texture.clone())
            .into_ref();

        let leaf = Node::new("leaf").with_state(state.clone()).into_ref();
        let left = Node::new("left").with_child(leaf.clone()).into_ref();
        let right = Node::new("right")
            .with_child(leaf.clone())
            .with_drawable(Drawable::new("quad", vec![]).with_state(state).into_ref())
            .into_ref();
        let root = Node::new("root").with_child(left).with_child(right).into_ref();

        let mut recorder = Recorder::default();
        let stats = walk(&root, &mut recorder);

        assert_eq!(recorder.nodes, vec!["root", "left", "leaf", "right"]);
        assert_eq!(recorder.images, vec!["shared.png"]);
        assert_eq!(
            stats,
            TraversalStats {
                nodes: 4,
                drawables: 1,
                state_blocks: 1,
                attributes: 1,
                images: 1,
            }
        );
    }

    #[test]
    fn same_image_in_two_textures_visited_once() {
        let image = Image::new("a.png").into_ref();
        let state = StateBlock::new()
            .with_attribute(Material::new("m", [0.5; 4]))
            .with_texture_attribute(0, Texture::with_image(image.clone()))
            .with_texture_attribute(1, Texture::with_image(image))
            .into_ref();
        let root = Node::new("root").with_state(state).into_ref();

        let mut recorder = Recorder::default();
        let stats = walk(&root, &mut recorder);

        assert_eq!(stats.attributes, 3);
        assert_eq!(stats.images, 1);
    }

    #[test]
    fn visitor_substitution_is_followed() {
        struct Swap(ImageRef);

        impl Visitor for Swap {
            fn visit_state_block(&mut self, state: &StateBlockRef) {
                let replacement = Texture::with_image(self.0.clone());
                let replacement: StateAttribute = replacement.into();
                state.replace_texture_attributes(|_, _| Some(replacement.clone()));
            }
        }

        let state = StateBlock::new()
            .with_texture_attribute(0, Texture::with_image(Image::new("old.png").into_ref()))
            .into_ref();
        let root = Node::new("root").with_state(state).into_ref();

        let mut swap = Swap(Image::new("new.png").into_ref());
        let mut traversal = Traversal::new();
        traversal.walk(&root, &mut swap);

        let mut recorder = Recorder::default();
        walk(&root, &mut recorder);
        assert_eq!(recorder.images, vec!["new.png"]);
        assert_eq!(traversal.stats().images, 1);
    }
}
