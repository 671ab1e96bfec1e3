//! Scene-graph nodes and drawables

use crate::annotation::Annotations;
use crate::state::StateBlockRef;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to a node
pub type NodeRef = Arc<Node>;

/// Shared handle to a drawable
pub type DrawableRef = Arc<Drawable>;

/// Leaf geometry with optional state
#[derive(Debug)]
pub struct Drawable {
    name: String,
    vertices: Vec<[f32; 3]>,
    state: RwLock<Option<StateBlockRef>>,
    annotations: Annotations,
}

impl Drawable {
    /// Create a drawable
    #[must_use]
    pub fn new(name: impl Into<String>, vertices: Vec<[f32; 3]>) -> Self {
        Self {
            name: name.into(),
            vertices,
            state: RwLock::new(None),
            annotations: Annotations::new(),
        }
    }

    /// Attach a state block
    #[must_use]
    pub fn with_state(self, state: StateBlockRef) -> Self {
        self.set_state(Some(state));
        self
    }

    /// Wrap in a shared handle
    #[inline]
    #[must_use]
    pub fn into_ref(self) -> DrawableRef {
        Arc::new(self)
    }

    /// Drawable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex positions
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    /// Attached state block
    #[must_use]
    pub fn state(&self) -> Option<StateBlockRef> {
        self.state.read().clone()
    }

    /// Replace the state block
    pub fn set_state(&self, state: Option<StateBlockRef>) {
        *self.state.write() = state;
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// Graph node: optional state, drawables and child nodes
#[derive(Debug)]
pub struct Node {
    name: String,
    state: RwLock<Option<StateBlockRef>>,
    drawables: RwLock<Vec<DrawableRef>>,
    children: RwLock<Vec<NodeRef>>,
    annotations: Annotations,
}

impl Node {
    /// Create an empty node
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(None),
            drawables: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            annotations: Annotations::new(),
        }
    }

    /// Attach a state block
    #[must_use]
    pub fn with_state(self, state: StateBlockRef) -> Self {
        self.set_state(Some(state));
        self
    }

    /// Add a drawable
    #[must_use]
    pub fn with_drawable(self, drawable: DrawableRef) -> Self {
        self.add_drawable(drawable);
        self
    }

    /// Add a child node
    #[must_use]
    pub fn with_child(self, child: NodeRef) -> Self {
        self.add_child(child);
        self
    }

    /// Wrap in a shared handle
    #[inline]
    #[must_use]
    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }

    /// Node name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attached state block
    #[must_use]
    pub fn state(&self) -> Option<StateBlockRef> {
        self.state.read().clone()
    }

    /// Replace the state block
    pub fn set_state(&self, state: Option<StateBlockRef>) {
        *self.state.write() = state;
    }

    /// Snapshot of the drawables
    #[must_use]
    pub fn drawables(&self) -> Vec<DrawableRef> {
        self.drawables.read().clone()
    }

    /// Add a drawable
    pub fn add_drawable(&self, drawable: DrawableRef) {
        self.drawables.write().push(drawable);
    }

    /// Snapshot of the children
    #[must_use]
    pub fn children(&self) -> Vec<NodeRef> {
        self.children.read().clone()
    }

    /// Add a child node
    pub fn add_child(&self, child: NodeRef) {
        self.children.write().push(child);
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateBlock;

    #[test]
    fn shared_child_keeps_identity() {
        let shared = Node::new("shared").into_ref();
        let a = Node::new("a").with_child(shared.clone()).into_ref();
        let b = Node::new("b").with_child(shared.clone()).into_ref();

        assert!(Arc::ptr_eq(&a.children()[0], &b.children()[0]));
        assert_eq!(Arc::strong_count(&shared), 3);
    }

    #[test]
    fn drawable_state_can_be_replaced() {
        let drawable = Drawable::new("quad", vec![[0.0; 3]; 4]);
        assert!(drawable.state().is_none());

        drawable.set_state(Some(StateBlock::new().into_ref()));
        assert!(drawable.state().is_some());
        assert_eq!(drawable.vertices().len(), 4);
    }
}
