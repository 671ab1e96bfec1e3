//! scenebin Graph Model
//!
//! Minimal scene graph used by the caching protocol.
//!
//! # Core Concepts
//!
//! - [`Node`]: Graph node with optional [`StateBlock`], drawables and children
//! - [`StateBlock`]: Global and per-texture-unit [`StateAttribute`]s
//! - [`Texture`]: Texture attribute referencing shared [`Image`]s
//! - [`Image`]: Binary payload identified by its file name
//! - [`Annotations`]: Non-serializable user data slot on every object
//! - [`Traversal`]: Identity-aware walk over shared sub-objects
//!
//! Every object is held through an `Arc` handle. Sharing the same handle
//! between parents is how a scene expresses aliasing, and the traversal
//! preserves it.
//!
//! # Example
//!
//! ```rust
//! use scenebin_graph::{Image, Node, StateBlock, Texture};
//!
//! let image = Image::new("sky.png").with_data(vec![0u8; 16]).into_ref();
//! let state = StateBlock::new()
//!     .with_texture_attribute(0, Texture::with_image(image))
//!     .into_ref();
//! let root = Node::new("root").with_state(state).into_ref();
//!
//! assert!(root.state().unwrap().texture(0).is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod annotation;
mod error;
mod image;
mod node;
mod state;
pub mod visit;

use std::sync::Arc;

// Re-exports
pub use annotation::{Annotations, UserData};
pub use error::CloneError;
pub use image::{Image, ImageRef, PixelFormat, WriteHint};
pub use node::{Drawable, DrawableRef, Node, NodeRef};
pub use state::{Material, StateAttribute, StateBlock, StateBlockRef, Texture, TextureKind, Uniform};
pub use visit::{walk, Traversal, TraversalStats, Visitor};

/// Identity of a shared handle (address of the pointee)
#[inline]
#[must_use]
pub fn identity<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle).cast::<()>() as usize
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building scenes
    pub use crate::{
        Drawable, Image, ImageRef, Node, NodeRef, PixelFormat, StateAttribute, StateBlock,
        StateBlockRef, Texture, Visitor, WriteHint,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
