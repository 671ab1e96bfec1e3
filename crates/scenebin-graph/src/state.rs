//! Rendering state: state blocks and their attributes
//!
//! A [`StateBlock`] owns a list of global attributes plus per-unit texture
//! attributes. Attributes are shared handles; several state blocks may point
//! at the same [`Texture`].

use crate::annotation::Annotations;
use crate::error::CloneError;
use crate::image::ImageRef;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to a state block
pub type StateBlockRef = Arc<StateBlock>;

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    #[default]
    #[serde(rename = "texture_2d")]
    Texture2D,
    #[serde(rename = "texture_2d_array")]
    Texture2DArray,
    CubeMap,
}

/// Texture attribute referencing one or more images
#[derive(Debug)]
pub struct Texture {
    kind: TextureKind,
    images: Vec<ImageRef>,
    unref_image_data_after_apply: AtomicBool,
    imported_handle: Option<u64>,
    annotations: Annotations,
}

impl Texture {
    /// Create a texture over the given images
    #[must_use]
    pub fn new(kind: TextureKind, images: Vec<ImageRef>) -> Self {
        Self {
            kind,
            images,
            unref_image_data_after_apply: AtomicBool::new(false),
            imported_handle: None,
            annotations: Annotations::new(),
        }
    }

    /// Single-image 2D texture
    #[must_use]
    pub fn with_image(image: ImageRef) -> Self {
        Self::new(TextureKind::Texture2D, vec![image])
    }

    /// Set the auto-release flag
    #[must_use]
    pub fn with_unref_after_apply(self, enabled: bool) -> Self {
        self.set_unref_image_data_after_apply(enabled);
        self
    }

    /// Mark the texture as wrapping an externally created GPU handle
    #[must_use]
    pub fn with_imported_handle(mut self, handle: u64) -> Self {
        self.imported_handle = Some(handle);
        self
    }

    /// Texture dimensionality
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// Images backing this texture
    #[inline]
    #[must_use]
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// Imported GPU handle, if any
    #[inline]
    #[must_use]
    pub fn imported_handle(&self) -> Option<u64> {
        self.imported_handle
    }

    /// Whether image payloads are dropped after the texture is applied
    #[must_use]
    pub fn unref_image_data_after_apply(&self) -> bool {
        self.unref_image_data_after_apply.load(Ordering::Acquire)
    }

    /// Change the auto-release flag
    pub fn set_unref_image_data_after_apply(&self, enabled: bool) {
        self.unref_image_data_after_apply
            .store(enabled, Ordering::Release);
    }

    /// Simulate an upload: with the auto-release flag set, every image
    /// payload is dropped. Returns the number of payloads released.
    pub fn apply(&self) -> usize {
        if !self.unref_image_data_after_apply() {
            return 0;
        }
        self.images.iter().filter(|image| image.release_data()).count()
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Shallow copy: images are shared, flags and annotations are copied
    ///
    /// # Errors
    /// Returns error if the texture wraps an imported handle
    pub fn shallow_clone(&self) -> Result<Self, CloneError> {
        if let Some(handle) = self.imported_handle {
            return Err(CloneError::ImportedHandle { handle });
        }
        Ok(Self {
            kind: self.kind,
            images: self.images.clone(),
            unref_image_data_after_apply: AtomicBool::new(self.unref_image_data_after_apply()),
            imported_handle: None,
            annotations: self.annotations.share(),
        })
    }
}

/// Surface material
#[derive(Debug)]
pub struct Material {
    name: String,
    diffuse: [f32; 4],
    annotations: Annotations,
}

impl Material {
    /// Create a material
    #[must_use]
    pub fn new(name: impl Into<String>, diffuse: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            diffuse,
            annotations: Annotations::new(),
        }
    }

    /// Material name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Diffuse color (RGBA)
    #[inline]
    #[must_use]
    pub fn diffuse(&self) -> [f32; 4] {
        self.diffuse
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// Named shader uniform
#[derive(Debug)]
pub struct Uniform {
    name: String,
    values: Vec<f32>,
    annotations: Annotations,
}

impl Uniform {
    /// Create a uniform
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            values,
            annotations: Annotations::new(),
        }
    }

    /// Uniform name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uniform values
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Attached user data
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// State attribute handle
#[derive(Debug, Clone)]
pub enum StateAttribute {
    Texture(Arc<Texture>),
    Material(Arc<Material>),
    Uniform(Arc<Uniform>),
}

impl StateAttribute {
    /// Attached user data of the underlying attribute
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        match self {
            Self::Texture(texture) => texture.annotations(),
            Self::Material(material) => material.annotations(),
            Self::Uniform(uniform) => uniform.annotations(),
        }
    }

    /// Texture, if this is a texture attribute
    #[must_use]
    pub fn as_texture(&self) -> Option<&Arc<Texture>> {
        match self {
            Self::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    /// Identity of the underlying object
    #[must_use]
    pub fn identity(&self) -> usize {
        match self {
            Self::Texture(texture) => crate::identity(texture),
            Self::Material(material) => crate::identity(material),
            Self::Uniform(uniform) => crate::identity(uniform),
        }
    }
}

impl From<Texture> for StateAttribute {
    fn from(texture: Texture) -> Self {
        Self::Texture(Arc::new(texture))
    }
}

impl From<Arc<Texture>> for StateAttribute {
    fn from(texture: Arc<Texture>) -> Self {
        Self::Texture(texture)
    }
}

impl From<Material> for StateAttribute {
    fn from(material: Material) -> Self {
        Self::Material(Arc::new(material))
    }
}

impl From<Uniform> for StateAttribute {
    fn from(uniform: Uniform) -> Self {
        Self::Uniform(Arc::new(uniform))
    }
}

/// Set of rendering attributes attached to a node or drawable
#[derive(Debug, Default)]
pub struct StateBlock {
    attributes: RwLock<Vec<StateAttribute>>,
    texture_units: RwLock<BTreeMap<u32, Vec<StateAttribute>>>,
    annotations: Annotations,
}

impl StateBlock {
    /// Create an empty state block
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global attribute
    #[must_use]
    pub fn with_attribute(self, attribute: impl Into<StateAttribute>) -> Self {
        self.add_attribute(attribute);
        self
    }

    /// Add an attribute on a texture unit
    #[must_use]
    pub fn with_texture_attribute(self, unit: u32, attribute: impl Into<StateAttribute>) -> Self {
        self.add_texture_attribute(unit, attribute);
        self
    }

    /// Wrap in a shared handle
    #[inline]
    #[must_use]
    pub fn into_ref(self) -> StateBlockRef {
        Arc::new(self)
    }

    /// Add a global attribute
    pub fn add_attribute(&self, attribute: impl Into<StateAttribute>) {
        self.attributes.write().push(attribute.into());
    }

    /// Add an attribute on a texture unit
    pub fn add_texture_attribute(&self, unit: u32, attribute: impl Into<StateAttribute>) {
        self.texture_units
            .write()
            .entry(unit)
            .or_default()
            .push(attribute.into());
    }

    /// Snapshot of the global attributes
    #[must_use]
    pub fn attributes(&self) -> Vec<StateAttribute> {
        self.attributes.read().clone()
    }

    /// Snapshot of the per-unit texture attributes
    #[must_use]
    pub fn texture_units(&self) -> BTreeMap<u32, Vec<StateAttribute>> {
        self.texture_units.read().clone()
    }

    /// First texture bound on `unit`
    #[must_use]
    pub fn texture(&self, unit: u32) -> Option<Arc<Texture>> {
        self.texture_units
            .read()
            .get(&unit)
            .and_then(|attrs| attrs.iter().find_map(|a| a.as_texture().cloned()))
    }

    /// Every attribute, global ones first, then texture units in order
    #[must_use]
    pub fn all_attributes(&self) -> Vec<StateAttribute> {
        let mut all = self.attributes();
        for attrs in self.texture_units.read().values() {
            all.extend(attrs.iter().cloned());
        }
        all
    }

    /// Rewrite texture-unit attributes in place
    ///
    /// `replace` receives the unit and the current attribute; returning
    /// `Some` substitutes the attribute. The whole pass runs under one
    /// write lock. Returns the number of substitutions.
    pub fn replace_texture_attributes<F>(&self, mut replace: F) -> usize
    where
        F: FnMut(u32, &StateAttribute) -> Option<StateAttribute>,
    {
        let mut units = self.texture_units.write();
        let mut replaced = 0;
        for (unit, attrs) in units.iter_mut() {
            for slot in attrs.iter_mut() {
                if let Some(next) = replace(*unit, slot) {
                    *slot = next;
                    replaced += 1;
                }
            }
        }
        replaced
    }

    /// Rewrite global attributes in place
    ///
    /// Same contract as [`StateBlock::replace_texture_attributes`] for the
    /// global list.
    pub fn replace_attributes<F>(&self, mut replace: F) -> usize
    where
        F: FnMut(&StateAttribute) -> Option<StateAttribute>,
    {
        let mut attributes = self.attributes.write();
        let mut replaced = 0;
        for slot in attributes.iter_mut() {
            if let Some(next) = replace(slot) {
                *slot = next;
                replaced += 1;
            }
        }
        replaced
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
    use crate::image::Image;

    fn texture(name: &str) -> Texture {
        Texture::with_image(Image::new(name).with_data(vec![1u8; 4]).into_ref())
    }

    #[test]
    fn shallow_clone_shares_images_and_copies_flags() {
        let original = texture("a.png").with_unref_after_apply(true);
        original.annotations().attach(Arc::new(5u8));

        let copy = original.shallow_clone().unwrap();
        assert!(copy.unref_image_data_after_apply());
        assert!(Arc::ptr_eq(&copy.images()[0], &original.images()[0]));
        assert!(!copy.annotations().is_empty());

        copy.set_unref_image_data_after_apply(false);
        assert!(original.unref_image_data_after_apply());
    }

    #[test]
    fn shallow_clone_fails_for_imported_handle() {
        let imported = texture("b.png").with_imported_handle(42);
        assert_eq!(
            imported.shallow_clone().unwrap_err(),
            CloneError::ImportedHandle { handle: 42 }
        );
    }

    #[test]
    fn apply_releases_only_when_flag_set() {
        let keep = texture("keep.png");
        assert_eq!(keep.apply(), 0);
        assert!(keep.images()[0].has_data());

        let dropping = texture("drop.png").with_unref_after_apply(true);
        assert_eq!(dropping.apply(), 1);
        assert!(!dropping.images()[0].has_data());
    }

    #[test]
    fn replace_texture_attributes_substitutes_in_place() {
        let block = StateBlock::new()
            .with_attribute(Material::new("stone", [1.0; 4]))
            .with_texture_attribute(0, texture("a.png"))
            .with_texture_attribute(1, texture("b.png"));

        let replacement: StateAttribute = texture("c.png").into();
        let replaced = block.replace_texture_attributes(|unit, _| {
            (unit == 1).then(|| replacement.clone())
        });

        assert_eq!(replaced, 1);
        let unit1 = block.texture(1).unwrap();
        assert_eq!(unit1.images()[0].file_name(), "c.png");
        assert_eq!(block.all_attributes().len(), 3);
    }

    #[test]
    fn replace_attributes_touches_global_list_only() {
        let block = StateBlock::new()
            .with_attribute(texture("a.png"))
            .with_attribute(Material::new("stone", [1.0; 4]))
            .with_texture_attribute(0, texture("b.png"));

        let replaced = block.replace_attributes(|attribute| {
            attribute.as_texture().map(|_| texture("c.png").into())
        });

        assert_eq!(replaced, 1);
        let global = block.attributes();
        assert_eq!(global[0].as_texture().unwrap().images()[0].file_name(), "c.png");
        assert_eq!(block.texture(0).unwrap().images()[0].file_name(), "b.png");
    }

    #[test]
    fn texture_kind_names() {
        assert_eq!(serde_json::to_string(&TextureKind::Texture2D).unwrap(), r#""texture_2d""#);
        assert_eq!(serde_json::to_string(&TextureKind::Texture2DArray).unwrap(), r#""texture_2d_array""#);
        assert_eq!(serde_json::to_string(&TextureKind::CubeMap).unwrap(), r#""cube_map""#);
        assert_eq!(
            serde_json::from_str::<TextureKind>(r#""texture_2d_array""#).unwrap(),
            TextureKind::Texture2DArray
        );
    }

    #[test]
    fn attribute_identity_follows_arc() {
        let shared: StateAttribute = texture("a.png").into();
        let alias = shared.clone();
        let other: StateAttribute = texture("a.png").into();

        assert_eq!(shared.identity(), alias.identity());
        assert_ne!(shared.identity(), other.identity());
    }
}
