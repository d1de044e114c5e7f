//! Minimal binary glTF 2.0 (GLB) reader
//!
//! Reads triangle-list primitives of the default scene into one [`Mesh`]
//! with node transforms applied. Positions must be FLOAT VEC3; indices may
//! be u8, u16 or u32. Materials, textures, skins and animation are ignored.
//! Only the embedded BIN chunk is used as buffer storage.

use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;
use std::collections::HashMap;

use super::{Mesh, MeshError};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_U8: u32 = 5121;
const COMPONENT_U16: u32 = 5123;
const COMPONENT_U32: u32 = 5125;
const COMPONENT_F32: u32 = 5126;

const MODE_TRIANGLES: u32 = 4;

/// Node nesting limit; deeper hierarchies are treated as malformed
const MAX_NODE_DEPTH: usize = 64;

#[derive(Debug, Deserialize)]
struct Document {
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<Scene>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    meshes: Vec<GltfMesh>,
    #[serde(default)]
    accessors: Vec<Accessor>,
    #[serde(default, rename = "bufferViews")]
    buffer_views: Vec<BufferView>,
}

#[derive(Debug, Deserialize)]
struct Scene {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct Node {
    mesh: Option<usize>,
    #[serde(default)]
    children: Vec<usize>,
    matrix: Option<[f32; 16]>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl Node {
    fn local_transform(&self) -> Mat4 {
        if let Some(matrix) = self.matrix {
            return Mat4::from_cols_array(&matrix);
        }
        Mat4::from_scale_rotation_translation(
            self.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
            self.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY),
            self.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
        )
    }
}

#[derive(Debug, Deserialize)]
struct GltfMesh {
    #[serde(default)]
    primitives: Vec<GltfPrimitive>,
}

#[derive(Debug, Deserialize)]
struct GltfPrimitive {
    attributes: HashMap<String, usize>,
    indices: Option<usize>,
    mode: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Accessor {
    #[serde(rename = "bufferView")]
    buffer_view: Option<usize>,
    #[serde(default, rename = "byteOffset")]
    byte_offset: usize,
    #[serde(rename = "componentType")]
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct BufferView {
    #[serde(default)]
    buffer: usize,
    #[serde(default, rename = "byteOffset")]
    byte_offset: usize,
    #[serde(rename = "byteLength")]
    byte_length: usize,
    #[serde(rename = "byteStride")]
    byte_stride: Option<usize>,
}

/// Parse a GLB container into a single triangle mesh
pub fn parse_glb(bytes: &[u8]) -> Result<Mesh, MeshError> {
    let (json, bin) = split_chunks(bytes)?;
    let document: Document = serde_json::from_slice(json)
        .map_err(|e| MeshError::InvalidContainer(format!("JSON chunk: {}", e)))?;

    let reader = Reader {
        document: &document,
        bin: bin.unwrap_or(&[]),
    };

    let mut mesh = Mesh::default();
    let default_scene = document
        .scene
        .or_else(|| (!document.scenes.is_empty()).then_some(0));
    let roots: Vec<usize> = match default_scene {
        Some(index) => document
            .scenes
            .get(index)
            .ok_or_else(|| MeshError::InvalidContainer(format!("scene {} missing", index)))?
            .nodes
            .clone(),
        None => root_nodes(&document),
    };

    for node in roots {
        reader.collect_node(node, Mat4::IDENTITY, 0, &mut mesh)?;
    }

    if mesh.is_empty() {
        return Err(MeshError::Empty);
    }
    Ok(mesh)
}

/// Nodes nobody lists as a child
fn root_nodes(document: &Document) -> Vec<usize> {
    let children: Vec<usize> = document
        .nodes
        .iter()
        .flat_map(|n| n.children.iter().copied())
        .collect();
    (0..document.nodes.len())
        .filter(|i| !children.contains(i))
        .collect()
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, MeshError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| MeshError::InvalidContainer("truncated".to_string()))
}

fn split_chunks(bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), MeshError> {
    if read_u32(bytes, 0)? != GLB_MAGIC {
        return Err(MeshError::InvalidContainer("bad magic".to_string()));
    }
    let version = read_u32(bytes, 4)?;
    if version != 2 {
        return Err(MeshError::Unsupported(format!("glTF version {}", version)));
    }
    let total = (read_u32(bytes, 8)? as usize).min(bytes.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= total {
        let length = read_u32(bytes, offset)? as usize;
        let kind = read_u32(bytes, offset + 4)?;
        let start = offset + 8;
        let end = start
            .checked_add(length)
            .ok_or_else(|| MeshError::InvalidContainer("chunk length overflows".to_string()))?;
        let chunk = bytes
            .get(start..end)
            .ok_or_else(|| MeshError::InvalidContainer("chunk exceeds file".to_string()))?;
        match kind {
            CHUNK_JSON if json.is_none() => json = Some(chunk),
            CHUNK_BIN if bin.is_none() => bin = Some(chunk),
            _ => {}
        }
        offset = end;
    }

    let json = json.ok_or_else(|| MeshError::InvalidContainer("missing JSON chunk".to_string()))?;
    Ok((json, bin))
}

struct Reader<'a> {
    document: &'a Document,
    bin: &'a [u8],
}

impl Reader<'_> {
    fn collect_node(
        &self,
        index: usize,
        parent: Mat4,
        depth: usize,
        out: &mut Mesh,
    ) -> Result<(), MeshError> {
        if depth > MAX_NODE_DEPTH {
            return Err(MeshError::InvalidContainer("node hierarchy too deep".to_string()));
        }
        let node = self
            .document
            .nodes
            .get(index)
            .ok_or_else(|| MeshError::InvalidContainer(format!("node {} missing", index)))?;
        let transform = parent * node.local_transform();

        if let Some(mesh_index) = node.mesh {
            let gltf_mesh = self
                .document
                .meshes
                .get(mesh_index)
                .ok_or_else(|| MeshError::InvalidContainer(format!("mesh {} missing", mesh_index)))?;
            for primitive in &gltf_mesh.primitives {
                out.append(self.read_primitive(primitive, transform)?);
            }
        }

        for &child in &node.children {
            self.collect_node(child, transform, depth + 1, out)?;
        }
        Ok(())
    }

    fn read_primitive(&self, primitive: &GltfPrimitive, transform: Mat4) -> Result<Mesh, MeshError> {
        let mode = primitive.mode.unwrap_or(MODE_TRIANGLES);
        if mode != MODE_TRIANGLES {
            return Err(MeshError::Unsupported(format!("primitive mode {}", mode)));
        }

        let position = *primitive
            .attributes
            .get("POSITION")
            .ok_or_else(|| MeshError::Unsupported("primitive without POSITION".to_string()))?;
        let vertices: Vec<[f32; 3]> = self
            .read_positions(position)?
            .into_iter()
            .map(|p| transform.transform_point3(p).to_array())
            .collect();

        let indices = match primitive.indices {
            Some(accessor) => self.read_indices(accessor)?,
            None => (0..vertices.len() as u32).collect(),
        };
        if indices.iter().any(|&i| i as usize >= vertices.len()) {
            return Err(MeshError::InvalidContainer("index out of range".to_string()));
        }

        let triangles = indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        Ok(Mesh {
            vertices,
            triangles,
        })
    }

    /// Accessor elements as raw byte slices
    fn elements(&self, index: usize, element_size: usize) -> Result<Vec<&[u8]>, MeshError> {
        let accessor = self.accessor(index)?;
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| MeshError::Unsupported("accessor without bufferView".to_string()))?;
        let view = self
            .document
            .buffer_views
            .get(view_index)
            .ok_or_else(|| MeshError::InvalidContainer(format!("bufferView {} missing", view_index)))?;
        if view.buffer != 0 {
            return Err(MeshError::Unsupported("external buffers".to_string()));
        }

        let view_end = view
            .byte_offset
            .checked_add(view.byte_length)
            .ok_or_else(|| MeshError::InvalidContainer("bufferView range overflows".to_string()))?;
        let view_bytes = self
            .bin
            .get(view.byte_offset..view_end)
            .ok_or_else(|| MeshError::InvalidContainer("bufferView exceeds BIN chunk".to_string()))?;
        let stride = match view.byte_stride {
            Some(stride) if stride > 0 => stride,
            _ => element_size,
        };

        // The last element must end inside the view; this also bounds `count`
        if let Some(last) = accessor.count.checked_sub(1) {
            last.checked_mul(stride)
                .and_then(|offset| offset.checked_add(accessor.byte_offset))
                .and_then(|start| start.checked_add(element_size))
                .filter(|&end| end <= view_bytes.len())
                .ok_or_else(|| MeshError::InvalidContainer("accessor exceeds bufferView".to_string()))?;
        }

        Ok((0..accessor.count)
            .map(|i| {
                let start = accessor.byte_offset + i * stride;
                &view_bytes[start..start + element_size]
            })
            .collect())
    }

    fn accessor(&self, index: usize) -> Result<&Accessor, MeshError> {
        self.document
            .accessors
            .get(index)
            .ok_or_else(|| MeshError::InvalidContainer(format!("accessor {} missing", index)))
    }

    fn read_positions(&self, index: usize) -> Result<Vec<Vec3>, MeshError> {
        let accessor = self.accessor(index)?;
        if accessor.component_type != COMPONENT_F32 || accessor.kind != "VEC3" {
            return Err(MeshError::Unsupported(format!(
                "POSITION as {} component {}",
                accessor.kind, accessor.component_type
            )));
        }

        Ok(self
            .elements(index, 12)?
            .into_iter()
            .map(|b| {
                let f = |o: usize| f32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]]);
                Vec3::new(f(0), f(4), f(8))
            })
            .collect())
    }

    fn read_indices(&self, index: usize) -> Result<Vec<u32>, MeshError> {
        let accessor = self.accessor(index)?;
        if accessor.kind != "SCALAR" {
            return Err(MeshError::Unsupported(format!("indices of type {}", accessor.kind)));
        }

        let size = match accessor.component_type {
            COMPONENT_U8 => 1,
            COMPONENT_U16 => 2,
            COMPONENT_U32 => 4,
            other => return Err(MeshError::Unsupported(format!("index component {}", other))),
        };

        Ok(self
            .elements(index, size)?
            .into_iter()
            .map(|b| match size {
                1 => b[0] as u32,
                2 => u16::from_le_bytes([b[0], b[1]]) as u32,
                _ => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Assemble a GLB container from a glTF JSON document and BIN payload
    pub(crate) fn encode_glb(document: &Value, bin: &[u8]) -> Vec<u8> {
        let mut json = serde_json::to_vec(document).unwrap();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
        out
    }

    /// One indexed triangle (u16 indices) under a single node
    pub(crate) fn triangle_glb(node: Value) -> Vec<u8> {
        let mut bin = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }

        let document = json!({
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [node],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6}
            ],
            "buffers": [{"byteLength": 44}]
        });
        encode_glb(&document, &bin)
    }

    fn edit_document(bytes: &[u8], edit: impl FnOnce(&mut Value)) -> Vec<u8> {
        let (json_chunk, bin) = split_chunks(bytes).unwrap();
        let mut document: Value = serde_json::from_slice(json_chunk).unwrap();
        edit(&mut document);
        encode_glb(&document, bin.unwrap_or(&[]))
    }

    #[test]
    fn test_parse_indexed_triangle() {
        let mesh = parse_glb(&triangle_glb(json!({"mesh": 0}))).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.vertices[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_node_transform_applied() {
        let mesh = parse_glb(&triangle_glb(json!({
            "mesh": 0,
            "translation": [0.0, 0.0, 5.0],
            "scale": [2.0, 2.0, 2.0]
        })))
        .unwrap();
        assert_eq!(mesh.vertices[1], [2.0, 0.0, 5.0]);
    }

    #[test]
    fn test_child_node_inherits_transform() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["nodes"] = json!([
                {"children": [1], "translation": [1.0, 0.0, 0.0]},
                {"mesh": 0, "translation": [0.0, 1.0, 0.0]}
            ]);
        });

        let mesh = parse_glb(&bytes).unwrap();
        assert_eq!(mesh.vertices[0], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = triangle_glb(json!({"mesh": 0}));
        bytes[0] = b'X';
        assert!(matches!(parse_glb(&bytes), Err(MeshError::InvalidContainer(_))));
        assert!(matches!(parse_glb(&[]), Err(MeshError::InvalidContainer(_))));
    }

    #[test]
    fn test_non_triangle_mode_unsupported() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["meshes"][0]["primitives"][0]["mode"] = json!(1);
        });

        assert!(matches!(parse_glb(&bytes), Err(MeshError::Unsupported(_))));
    }

    #[test]
    fn test_overflowing_buffer_view_offset_rejected() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["bufferViews"][0]["byteOffset"] = json!(u64::MAX);
        });

        assert!(matches!(parse_glb(&bytes), Err(MeshError::InvalidContainer(_))));
    }

    #[test]
    fn test_accessor_count_beyond_view_rejected() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["accessors"][0]["count"] = json!(u64::MAX / 2);
        });

        assert!(matches!(parse_glb(&bytes), Err(MeshError::InvalidContainer(_))));
    }

    #[test]
    fn test_zero_stride_counts_as_tightly_packed() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["bufferViews"][0]["byteStride"] = json!(0);
            document["accessors"][0]["count"] = json!(4);
        });

        // Four tightly packed VEC3 floats need 48 bytes; the view has 36
        assert!(matches!(parse_glb(&bytes), Err(MeshError::InvalidContainer(_))));
    }

    #[test]
    fn test_overflowing_accessor_offset_rejected() {
        let bytes = edit_document(&triangle_glb(json!({"mesh": 0})), |document| {
            document["accessors"][1]["byteOffset"] = json!(u64::MAX);
        });

        assert!(matches!(parse_glb(&bytes), Err(MeshError::InvalidContainer(_))));
    }

    #[test]
    fn test_scene_without_meshes_is_empty() {
        let bytes = encode_glb(&json!({"asset": {"version": "2.0"}, "nodes": [{}]}), &[]);
        assert!(matches!(parse_glb(&bytes), Err(MeshError::Empty)));
    }
}
