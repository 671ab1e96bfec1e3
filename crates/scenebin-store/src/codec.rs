//! Record encoding
//!
//! Records are JSON documents. A graph is flattened into identity tables:
//! every distinct node, drawable, state block, attribute and image appears
//! once and is referenced by index, so shared sub-objects stay shared after
//! a round trip. Image payloads are hex strings. Annotations and imported
//! GPU handles are never written.
//!
//! Images written as references (no payload) are resolved through the
//! loader chain of the [`ReadOptions`] while a graph is decoded. A
//! standalone image record is decoded as-is and never triggers resolution.

use crate::bin::CacheObject;
use crate::error::CodecError;
use crate::key::ResourceKind;
use crate::loader::LoadOutcome;
use crate::options::{ReadOptions, WriteOptions};
use scenebin_graph::{
    identity, walk, Drawable, DrawableRef, Image, ImageRef, Material, Node, NodeRef, PixelFormat,
    StateAttribute, StateBlock, StateBlockRef, Texture, TextureKind, Uniform, Visitor, WriteHint,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Version written into every record
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: u32,
    record: Record,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Object(GraphDocument),
    Image(ImageRecord),
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    root: usize,
    nodes: Vec<NodeRecord>,
    drawables: Vec<DrawableRecord>,
    state_blocks: Vec<StateBlockRecord>,
    attributes: Vec<AttributeRecord>,
    images: Vec<ImageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    drawables: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DrawableRecord {
    name: String,
    vertices: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateBlockRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    texture_units: Vec<TextureUnitRecord>,
}

/// Attributes bound to one texture unit
///
/// Kept as a list rather than a map: records are buffered while the tagged
/// envelope is decoded, and buffered maps only accept string keys.
#[derive(Debug, Serialize, Deserialize)]
struct TextureUnitRecord {
    unit: u32,
    attributes: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AttributeRecord {
    Texture {
        texture_kind: TextureKind,
        images: Vec<usize>,
        unref_image_data_after_apply: bool,
    },
    Material {
        name: String,
        diffuse: [f32; 4],
    },
    Uniform {
        name: String,
        values: Vec<f32>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageRecord {
    file_name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    write_hint: WriteHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl ImageRecord {
    fn encode(image: &Image, options: &WriteOptions) -> Self {
        let embed = options.inline_images() || image.write_hint() != WriteHint::External;
        Self {
            file_name: image.file_name(),
            width: image.width(),
            height: image.height(),
            format: image.format(),
            write_hint: image.write_hint(),
            data: embed.then(|| image.data()).flatten().map(hex::encode),
        }
    }

    fn build(&self, data: Option<Arc<[u8]>>) -> ImageRef {
        let image = Image::new(self.file_name.clone())
            .with_dimensions(self.width, self.height)
            .with_format(self.format)
            .with_write_hint(self.write_hint);
        if let Some(data) = data {
            image.set_data(data);
        }
        image.into_ref()
    }

    fn payload(&self) -> Result<Option<Arc<[u8]>>, CodecError> {
        self.data
            .as_deref()
            .map(|encoded| hex::decode(encoded).map(Arc::from))
            .transpose()
            .map_err(CodecError::from)
    }
}

/// Kind of object held by an encoded record, without decoding it fully
///
/// # Errors
/// Returns error if the bytes are not a record of a supported format
pub fn peek_kind(bytes: &[u8]) -> Result<ResourceKind, CodecError> {
    #[derive(Deserialize)]
    struct Header {
        format: u32,
        record: Tag,
    }

    #[derive(Deserialize)]
    struct Tag {
        kind: ResourceKind,
    }

    let header: Header = serde_json::from_slice(bytes)?;
    if header.format != FORMAT_VERSION {
        return Err(CodecError::UnsupportedFormat {
            found: header.format,
            expected: FORMAT_VERSION,
        });
    }
    Ok(header.record.kind)
}

/// Encode an object into record bytes
///
/// # Errors
/// Returns error if the graph changes shape while being encoded or JSON
/// serialization fails
pub fn encode(object: &CacheObject, options: &WriteOptions) -> Result<Vec<u8>, CodecError> {
    let record = match object {
        CacheObject::Node(root) => Record::Object(GraphEncoder::encode(root, options)?),
        CacheObject::Image(image) => Record::Image(ImageRecord::encode(image, options)),
    };
    let envelope = Envelope {
        format: FORMAT_VERSION,
        record,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode record bytes, resolving external image references through
/// `options`
///
/// # Errors
/// Returns error if the record is malformed or of an unsupported format
pub fn decode(bytes: &[u8], options: &ReadOptions) -> Result<CacheObject, CodecError> {
    peek_kind(bytes)?;
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    match envelope.record {
        Record::Object(document) => GraphDecoder::decode(&document, options).map(CacheObject::Node),
        Record::Image(record) => Ok(CacheObject::Image(record.build(record.payload()?))),
    }
}

/// Collects distinct objects in traversal order
#[derive(Default)]
struct GraphEncoder {
    nodes: Vec<NodeRef>,
    drawables: Vec<DrawableRef>,
    state_blocks: Vec<StateBlockRef>,
    attributes: Vec<StateAttribute>,
    images: Vec<ImageRef>,
    index: HashMap<usize, usize>,
}

impl Visitor for GraphEncoder {
    fn visit_node(&mut self, node: &NodeRef) {
        self.index.insert(identity(node), self.nodes.len());
        self.nodes.push(node.clone());
    }

    fn visit_drawable(&mut self, drawable: &DrawableRef) {
        self.index.insert(identity(drawable), self.drawables.len());
        self.drawables.push(drawable.clone());
    }

    fn visit_state_block(&mut self, state: &StateBlockRef) {
        self.index.insert(identity(state), self.state_blocks.len());
        self.state_blocks.push(state.clone());
    }

    fn visit_attribute(&mut self, attribute: &StateAttribute) {
        self.index.insert(attribute.identity(), self.attributes.len());
        self.attributes.push(attribute.clone());
    }

    fn visit_image(&mut self, image: &ImageRef) {
        self.index.insert(identity(image), self.images.len());
        self.images.push(image.clone());
    }
}

impl GraphEncoder {
    fn encode(root: &NodeRef, options: &WriteOptions) -> Result<GraphDocument, CodecError> {
        let mut encoder = Self::default();
        walk(root, &mut encoder);

        // Every table holds a strong handle, so addresses are unique across tables
        let lookup = |table: &'static str, id: usize| {
            encoder
                .index
                .get(&id)
                .copied()
                .ok_or(CodecError::DanglingIndex { table, index: id })
        };

        let nodes = encoder
            .nodes
            .iter()
            .map(|node| {
                Ok(NodeRecord {
                    name: node.name().to_string(),
                    state: node
                        .state()
                        .map(|state| lookup("state_blocks", identity(&state)))
                        .transpose()?,
                    drawables: node
                        .drawables()
                        .iter()
                        .map(|drawable| lookup("drawables", identity(drawable)))
                        .collect::<Result<_, _>>()?,
                    children: node
                        .children()
                        .iter()
                        .map(|child| lookup("nodes", identity(child)))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let drawables = encoder
            .drawables
            .iter()
            .map(|drawable| {
                Ok(DrawableRecord {
                    name: drawable.name().to_string(),
                    vertices: drawable.vertices().to_vec(),
                    state: drawable
                        .state()
                        .map(|state| lookup("state_blocks", identity(&state)))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let state_blocks = encoder
            .state_blocks
            .iter()
            .map(|state| {
                let attributes: Vec<usize> = state
                    .attributes()
                    .iter()
                    .map(|attr| lookup("attributes", attr.identity()))
                    .collect::<Result<_, _>>()?;
                let texture_units: Vec<TextureUnitRecord> = state
                    .texture_units()
                    .iter()
                    .map(|(&unit, attrs)| {
                        let attributes: Vec<usize> = attrs
                            .iter()
                            .map(|attr| lookup("attributes", attr.identity()))
                            .collect::<Result<_, _>>()?;
                        Ok(TextureUnitRecord { unit, attributes })
                    })
                    .collect::<Result<_, CodecError>>()?;
                Ok(StateBlockRecord {
                    attributes,
                    texture_units,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let attributes = encoder
            .attributes
            .iter()
            .map(|attribute| {
                Ok(match attribute {
                    StateAttribute::Texture(texture) => AttributeRecord::Texture {
                        texture_kind: texture.kind(),
                        images: texture
                            .images()
                            .iter()
                            .map(|image| lookup("images", identity(image)))
                            .collect::<Result<_, _>>()?,
                        unref_image_data_after_apply: texture.unref_image_data_after_apply(),
                    },
                    StateAttribute::Material(material) => AttributeRecord::Material {
                        name: material.name().to_string(),
                        diffuse: material.diffuse(),
                    },
                    StateAttribute::Uniform(uniform) => AttributeRecord::Uniform {
                        name: uniform.name().to_string(),
                        values: uniform.values().to_vec(),
                    },
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let images = encoder
            .images
            .iter()
            .map(|image| ImageRecord::encode(image, options))
            .collect();

        Ok(GraphDocument {
            root: lookup("nodes", identity(root))?,
            nodes,
            drawables,
            state_blocks,
            attributes,
            images,
        })
    }
}

/// Rebuilds a graph from its identity tables
struct GraphDecoder;

impl GraphDecoder {
    fn decode(document: &GraphDocument, options: &ReadOptions) -> Result<NodeRef, CodecError> {
        let images = document
            .images
            .iter()
            .map(|record| Self::image(record, options))
            .collect::<Result<Vec<_>, _>>()?;

        let attributes = document
            .attributes
            .iter()
            .map(|record| {
                Ok(match record {
                    AttributeRecord::Texture {
                        texture_kind,
                        images: indices,
                        unref_image_data_after_apply,
                    } => {
                        let texture_images = indices
                            .iter()
                            .map(|&i| fetch(&images, "images", i).cloned())
                            .collect::<Result<_, _>>()?;
                        StateAttribute::from(
                            Texture::new(*texture_kind, texture_images)
                                .with_unref_after_apply(*unref_image_data_after_apply),
                        )
                    }
                    AttributeRecord::Material { name, diffuse } => {
                        StateAttribute::from(Material::new(name.clone(), *diffuse))
                    }
                    AttributeRecord::Uniform { name, values } => {
                        StateAttribute::from(Uniform::new(name.clone(), values.clone()))
                    }
                })
            })
            .collect::<Result<Vec<StateAttribute>, CodecError>>()?;

        let state_blocks = document
            .state_blocks
            .iter()
            .map(|record| {
                let state = StateBlock::new();
                for &i in &record.attributes {
                    state.add_attribute(fetch(&attributes, "attributes", i)?.clone());
                }
                for binding in &record.texture_units {
                    for &i in &binding.attributes {
                        state.add_texture_attribute(binding.unit, fetch(&attributes, "attributes", i)?.clone());
                    }
                }
                Ok(state.into_ref())
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let drawables = document
            .drawables
            .iter()
            .map(|record| {
                let drawable = Drawable::new(record.name.clone(), record.vertices.clone());
                if let Some(i) = record.state {
                    drawable.set_state(Some(fetch(&state_blocks, "state_blocks", i)?.clone()));
                }
                Ok(drawable.into_ref())
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        // Nodes are created first and wired afterwards so any child order,
        // including back references, can be restored.
        let nodes: Vec<NodeRef> = document
            .nodes
            .iter()
            .map(|record| Node::new(record.name.clone()).into_ref())
            .collect();
        for (node, record) in nodes.iter().zip(&document.nodes) {
            if let Some(i) = record.state {
                node.set_state(Some(fetch(&state_blocks, "state_blocks", i)?.clone()));
            }
            for &i in &record.drawables {
                node.add_drawable(fetch(&drawables, "drawables", i)?.clone());
            }
            for &i in &record.children {
                node.add_child(fetch(&nodes, "nodes", i)?.clone());
            }
        }

        fetch(&nodes, "nodes", document.root).cloned()
    }

    fn image(record: &ImageRecord, options: &ReadOptions) -> Result<ImageRef, CodecError> {
        if let Some(data) = record.payload()? {
            return Ok(record.build(Some(data)));
        }
        if record.file_name.is_empty() {
            return Ok(record.build(None));
        }
        match options.loaders().read_image(&record.file_name, options) {
            LoadOutcome::Found(loaded) if loaded.has_data() => Ok(record.build(loaded.data())),
            LoadOutcome::Found(_) | LoadOutcome::NotHandled => {
                warn!(location = %record.file_name, "no loader resolved image reference");
                Ok(record.build(None))
            }
            LoadOutcome::NotFound(reason) => {
                warn!(location = %record.file_name, %reason, "image reference unresolved");
                Ok(record.build(None))
            }
        }
    }
}

fn fetch<'a, T>(table: &'a [T], name: &'static str, index: usize) -> Result<&'a T, CodecError> {
    table
        .get(index)
        .ok_or(CodecError::DanglingIndex { table: name, index })
}
