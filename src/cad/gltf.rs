//! glTF 2.0 and GLB: mesh extraction, node tree and summaries

use super::mesh::{Body, Vec3};
use super::viewer::{NodeKind, TreeNode};
use crate::error::{Error, Result};
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const GLB_MAGIC: u32 = 0x4654_6C67;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Triangles; other primitive modes are skipped
const MODE_TRIANGLES: u64 = 4;

/// Upper bound on values materialized for an accessor with no bufferView
const MAX_ZERO_VALUES: usize = 1 << 24;

/// Column-major 4x4 matrix
type Mat4 = [f64; 16];

const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

fn mat_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let mut out = [0.0; 3];
    for (row, o) in out.iter_mut().enumerate() {
        *o = m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row];
    }
    out
}

fn floats(value: Option<&Value>) -> Option<Vec<f64>> {
    value?.as_array()?.iter().map(Value::as_f64).collect()
}

/// Local transform from `matrix` or translation, rotation and scale
fn node_matrix(node: &Value) -> Mat4 {
    if let Some(m) = floats(node.get("matrix")).filter(|m| m.len() == 16) {
        let mut out = [0.0; 16];
        out.copy_from_slice(&m);
        return out;
    }
    let t = floats(node.get("translation")).unwrap_or_else(|| vec![0.0; 3]);
    let r = floats(node.get("rotation")).unwrap_or_else(|| vec![0.0, 0.0, 0.0, 1.0]);
    let s = floats(node.get("scale")).unwrap_or_else(|| vec![1.0; 3]);
    if t.len() != 3 || r.len() != 4 || s.len() != 3 {
        return IDENTITY;
    }
    let (x, y, z, w) = (r[0], r[1], r[2], r[3]);
    let rot = [
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y + z * w),
        2.0 * (x * z - y * w),
        2.0 * (x * y - z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z + x * w),
        2.0 * (x * z + y * w),
        2.0 * (y * z - x * w),
        1.0 - 2.0 * (x * x + y * y),
    ];
    [
        rot[0] * s[0],
        rot[1] * s[0],
        rot[2] * s[0],
        0.0,
        rot[3] * s[1],
        rot[4] * s[1],
        rot[5] * s[1],
        0.0,
        rot[6] * s[2],
        rot[7] * s[2],
        rot[8] * s[2],
        0.0,
        t[0],
        t[1],
        t[2],
        1.0,
    ]
}

fn index_of(value: &Value) -> Option<usize> {
    value.as_u64().map(|i| i as usize)
}

/// A parsed glTF document with its binary sources
pub struct Gltf {
    doc: Value,
    base: PathBuf,
    bin: Option<Vec<u8>>,
}

impl Gltf {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if data.starts_with(b"glTF") {
            Self::from_glb(&data, base)
        } else {
            Self::from_json(&String::from_utf8_lossy(&data), base)
        }
    }

    pub fn from_json(text: &str, base: PathBuf) -> Result<Self> {
        Ok(Self {
            doc: serde_json::from_str(text)?,
            base,
            bin: None,
        })
    }

    pub fn from_glb(data: &[u8], base: PathBuf) -> Result<Self> {
        let word = |at: usize| -> Result<u32> {
            data.get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| Error::Parse("truncated GLB".to_string()))
        };
        if word(0)? != GLB_MAGIC {
            return Err(Error::Parse("not a GLB file".to_string()));
        }
        let total = (word(8)? as usize).min(data.len());

        let mut doc = None;
        let mut bin = None;
        let mut pos = 12;
        while pos + 8 <= total {
            let length = word(pos)? as usize;
            let kind = word(pos + 4)?;
            let chunk = data
                .get(pos + 8..pos + 8 + length)
                .ok_or_else(|| Error::Parse("GLB chunk exceeds file".to_string()))?;
            match kind {
                CHUNK_JSON => doc = Some(serde_json::from_slice::<Value>(chunk)?),
                CHUNK_BIN => bin = Some(chunk.to_vec()),
                other => debug!("skipping GLB chunk {:#x}", other),
            }
            pos += 8 + length;
        }
        Ok(Self {
            doc: doc.ok_or_else(|| Error::Parse("GLB has no JSON chunk".to_string()))?,
            base,
            bin,
        })
    }

    fn list(&self, key: &str) -> &[Value] {
        self.doc
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn node_name(&self, index: usize) -> String {
        self.list("nodes")
            .get(index)
            .and_then(|n| n.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", index))
    }

    fn children(node: &Value) -> Vec<usize> {
        node.get("children")
            .and_then(Value::as_array)
            .map(|c| c.iter().filter_map(index_of).collect())
            .unwrap_or_default()
    }

    /// Nodes of the default scene, or every node nobody parents
    fn root_nodes(&self) -> Vec<usize> {
        let scene = self
            .doc
            .get("scene")
            .and_then(index_of)
            .unwrap_or(0);
        if let Some(nodes) = self
            .list("scenes")
            .get(scene)
            .and_then(|s| s.get("nodes"))
            .and_then(Value::as_array)
        {
            return nodes.iter().filter_map(index_of).collect();
        }
        let parented: HashSet<usize> = self.list("nodes").iter().flat_map(Self::children).collect();
        (0..self.list("nodes").len())
            .filter(|i| !parented.contains(i))
            .collect()
    }

    // ===== Buffers =====

    fn load_buffers(&self) -> Result<Vec<Vec<u8>>> {
        self.list("buffers")
            .iter()
            .enumerate()
            .map(|(i, buffer)| match buffer.get("uri").and_then(Value::as_str) {
                Some(uri) if uri.starts_with("data:") => {
                    let payload = uri.split_once(',').map(|(_, p)| p).unwrap_or_default();
                    base64::engine::general_purpose::STANDARD
                        .decode(payload)
                        .map_err(|e| Error::Parse(format!("buffer {}: {}", i, e)))
                }
                Some(uri) => Ok(std::fs::read(self.base.join(uri))?),
                None => self
                    .bin
                    .clone()
                    .ok_or_else(|| Error::Parse(format!("buffer {} has no data", i))),
            })
            .collect()
    }

    /// Accessor contents as flat f64 values and the component count per element
    fn read_accessor(&self, buffers: &[Vec<u8>], index: usize) -> Result<(Vec<f64>, usize)> {
        let accessor = self
            .list("accessors")
            .get(index)
            .ok_or_else(|| Error::Parse(format!("accessor {} missing", index)))?;
        let count = accessor.get("count").and_then(index_of).unwrap_or(0);
        let components = match accessor.get("type").and_then(Value::as_str) {
            Some("SCALAR") => 1,
            Some("VEC2") => 2,
            Some("VEC3") => 3,
            Some("VEC4") | Some("MAT2") => 4,
            Some("MAT3") => 9,
            Some("MAT4") => 16,
            other => return Err(Error::Parse(format!("accessor type {:?}", other))),
        };
        let component_type = accessor.get("componentType").and_then(Value::as_u64).unwrap_or(0);
        let size = match component_type {
            5120 | 5121 => 1,
            5122 | 5123 => 2,
            5125 | 5126 => 4,
            other => return Err(Error::Parse(format!("component type {}", other))),
        };

        let overflow = || Error::Parse(format!("accessor {} count {} overflows", index, count));
        let total = count.checked_mul(components).ok_or_else(overflow)?;

        let Some(view_index) = accessor.get("bufferView").and_then(index_of) else {
            // No view means all zeros
            if total > MAX_ZERO_VALUES {
                return Err(overflow());
            }
            return Ok((vec![0.0; total], components));
        };
        let view = self
            .list("bufferViews")
            .get(view_index)
            .ok_or_else(|| Error::Parse(format!("bufferView {} missing", view_index)))?;
        let buffer = view
            .get("buffer")
            .and_then(index_of)
            .and_then(|b| buffers.get(b))
            .ok_or_else(|| Error::Parse(format!("bufferView {} has no buffer", view_index)))?;
        let offset = view
            .get("byteOffset")
            .and_then(index_of)
            .unwrap_or(0)
            .checked_add(accessor.get("byteOffset").and_then(index_of).unwrap_or(0))
            .ok_or_else(overflow)?;
        let element_len = size * components;
        let stride = view
            .get("byteStride")
            .and_then(index_of)
            .filter(|s| *s > 0)
            .unwrap_or(element_len);
        if count > 0 {
            let end = (count - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(offset))
                .and_then(|n| n.checked_add(element_len))
                .ok_or_else(overflow)?;
            if end > buffer.len() {
                return Err(Error::Parse(format!(
                    "accessor {} needs {} bytes, buffer has {}",
                    index,
                    end,
                    buffer.len()
                )));
            }
        }

        let mut values = Vec::with_capacity(total);
        for element in 0..count {
            for c in 0..components {
                let at = offset + element * stride + c * size;
                let b = buffer
                    .get(at..at + size)
                    .ok_or_else(|| Error::Parse(format!("accessor {} exceeds buffer", index)))?;
                values.push(match component_type {
                    5120 => f64::from(b[0] as i8),
                    5121 => f64::from(b[0]),
                    5122 => f64::from(i16::from_le_bytes([b[0], b[1]])),
                    5123 => f64::from(u16::from_le_bytes([b[0], b[1]])),
                    5125 => f64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                    _ => f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                });
            }
        }
        Ok((values, components))
    }

    // ===== Meshes =====

    /// One body per triangle primitive, in world coordinates
    pub fn bodies(&self) -> Result<Vec<Body>> {
        let buffers = self.load_buffers()?;
        let mut bodies = Vec::new();
        let mut visited = HashSet::new();
        for root in self.root_nodes() {
            self.collect_bodies(&buffers, root, &IDENTITY, &mut visited, &mut bodies)?;
        }
        Ok(bodies)
    }

    fn collect_bodies(
        &self,
        buffers: &[Vec<u8>],
        index: usize,
        parent: &Mat4,
        visited: &mut HashSet<usize>,
        out: &mut Vec<Body>,
    ) -> Result<()> {
        if !visited.insert(index) {
            warn!("glTF node {} visited twice, skipping", index);
            return Ok(());
        }
        let Some(node) = self.list("nodes").get(index) else {
            return Ok(());
        };
        let world = mat_mul(parent, &node_matrix(node));

        if let Some(mesh_index) = node.get("mesh").and_then(index_of) {
            let mesh = self
                .list("meshes")
                .get(mesh_index)
                .ok_or_else(|| Error::Parse(format!("mesh {} missing", mesh_index)))?;
            let name = node
                .get("name")
                .or_else(|| mesh.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh_{}", mesh_index));
            let primitives = mesh
                .get("primitives")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (p, primitive) in primitives.iter().enumerate() {
                let mode = primitive.get("mode").and_then(Value::as_u64).unwrap_or(MODE_TRIANGLES);
                if mode != MODE_TRIANGLES {
                    debug!("skipping primitive {} of {} with mode {}", p, name, mode);
                    continue;
                }
                let body_name = if primitives.len() > 1 {
                    format!("{}_{}", name, p)
                } else {
                    name.clone()
                };
                out.push(self.primitive_body(buffers, primitive, &world, &body_name)?);
            }
        }

        for child in Self::children(node) {
            self.collect_bodies(buffers, child, &world, visited, out)?;
        }
        Ok(())
    }

    fn primitive_body(
        &self,
        buffers: &[Vec<u8>],
        primitive: &Value,
        world: &Mat4,
        name: &str,
    ) -> Result<Body> {
        let position = primitive
            .pointer("/attributes/POSITION")
            .and_then(index_of)
            .ok_or_else(|| Error::Parse(format!("{}: primitive has no POSITION", name)))?;
        let (positions, components) = self.read_accessor(buffers, position)?;
        if components != 3 {
            return Err(Error::Parse(format!("{}: POSITION is not VEC3", name)));
        }

        let mut body = Body::new(name);
        body.vertices = positions
            .chunks_exact(3)
            .map(|p| transform_point(world, [p[0], p[1], p[2]]))
            .collect();
        let indices: Vec<u32> = match primitive.get("indices").and_then(index_of) {
            Some(accessor) => self
                .read_accessor(buffers, accessor)?
                .0
                .into_iter()
                .map(|i| i as u32)
                .collect(),
            None => (0..body.vertices.len() as u32).collect(),
        };
        body.faces = indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect();
        body.retain_valid_faces();
        Ok(body)
    }

    // ===== Structure =====

    /// Node hierarchy under a root named after the file
    pub fn tree(&self, root_name: &str) -> TreeNode {
        let mut visited = HashSet::new();
        let children = self
            .root_nodes()
            .into_iter()
            .filter_map(|i| self.tree_node(i, &mut visited))
            .collect();
        TreeNode::new(root_name, NodeKind::Assembly, children)
    }

    fn tree_node(&self, index: usize, visited: &mut HashSet<usize>) -> Option<TreeNode> {
        if !visited.insert(index) {
            return None;
        }
        let node = self.list("nodes").get(index)?;
        let children: Vec<TreeNode> = Self::children(node)
            .into_iter()
            .filter_map(|c| self.tree_node(c, visited))
            .collect();
        let kind = if !children.is_empty() {
            NodeKind::Assembly
        } else if node.get("mesh").is_some() {
            NodeKind::Part
        } else {
            NodeKind::Shape
        };
        Some(TreeNode::new(&self.node_name(index), kind, children))
    }

    pub fn info(&self) -> GltfInfo {
        let asset = self.doc.get("asset");
        let text = |key: &str| asset.and_then(|a| a.get(key)).and_then(Value::as_str).map(str::to_string);
        GltfInfo {
            scene_count: self.list("scenes").len(),
            node_count: self.list("nodes").len(),
            mesh_count: self.list("meshes").len(),
            material_count: self.list("materials").len(),
            animation_count: self.list("animations").len(),
            texture_count: self.list("textures").len(),
            buffer_count: self.list("buffers").len(),
            generator: text("generator"),
            version: text("version"),
        }
    }

    pub fn read(&self) -> GltfContents {
        let name_of = |v: &Value| v.get("name").and_then(Value::as_str).map(str::to_string);
        let scenes = self
            .list("scenes")
            .iter()
            .map(|scene| {
                let mut visited = HashSet::new();
                GltfScene {
                    name: name_of(scene),
                    nodes: scene
                        .get("nodes")
                        .and_then(Value::as_array)
                        .map(|nodes| {
                            nodes
                                .iter()
                                .filter_map(index_of)
                                .filter_map(|n| self.scene_node(n, &mut visited))
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();
        let meshes = self
            .list("meshes")
            .iter()
            .map(|mesh| GltfMesh {
                name: name_of(mesh),
                primitives: mesh
                    .get("primitives")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
            })
            .collect();
        let materials = self
            .list("materials")
            .iter()
            .map(|m| GltfMaterial { name: name_of(m) })
            .collect();
        GltfContents {
            scenes,
            meshes,
            materials,
        }
    }

    fn scene_node(&self, index: usize, visited: &mut HashSet<usize>) -> Option<GltfNode> {
        if !visited.insert(index) {
            return None;
        }
        let node = self.list("nodes").get(index)?;
        Some(GltfNode {
            name: node.get("name").and_then(Value::as_str).map(str::to_string),
            mesh: node.get("mesh").and_then(index_of),
            children: Self::children(node)
                .into_iter()
                .filter_map(|c| self.scene_node(c, visited))
                .collect(),
        })
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.list("scenes").is_empty() {
            issues.push("No scenes defined".to_string());
        }
        if self.list("nodes").is_empty() {
            issues.push("No nodes defined".to_string());
        }
        if let Some(version) = self.doc.pointer("/asset/version").and_then(Value::as_str) {
            if version != "2.0" {
                issues.push(format!("Unexpected glTF version: {}", version));
            }
        }
        issues
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfInfo {
    pub scene_count: usize,
    pub node_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub animation_count: usize,
    pub texture_count: usize,
    pub buffer_count: usize,
    pub generator: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfNode {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GltfNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfScene {
    pub name: Option<String>,
    pub nodes: Vec<GltfNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfMesh {
    pub name: Option<String>,
    pub primitives: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfMaterial {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfContents {
    pub scenes: Vec<GltfScene>,
    pub meshes: Vec<GltfMesh>,
    pub materials: Vec<GltfMaterial>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// One triangle mesh used by two nodes, the second offset by x=10
    pub(crate) fn triangle_gltf() -> String {
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bin)
        );
        json!({
            "asset": {"version": "2.0", "generator": "hand"},
            "scene": 0,
            "scenes": [{"name": "Scene", "nodes": [0]}],
            "nodes": [
                {"name": "frame", "children": [1, 2]},
                {"name": "left", "mesh": 0},
                {"name": "right", "mesh": 0, "translation": [10.0, 0.0, 0.0]}
            ],
            "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
            "materials": [{"name": "steel"}],
            "buffers": [{"byteLength": bin.len(), "uri": uri}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_bodies_follow_node_transforms() {
        let gltf = Gltf::from_json(&triangle_gltf(), PathBuf::new()).unwrap();
        let bodies = gltf.bodies().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].name, "left");
        assert_eq!(bodies[1].vertices[1], [11.0, 0.0, 0.0]);
        assert_eq!(bodies[1].faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_tree_and_summaries() {
        let gltf = Gltf::from_json(&triangle_gltf(), PathBuf::new()).unwrap();
        let tree = gltf.tree("model");
        assert_eq!(tree.children.len(), 1);
        let frame = &tree.children[0];
        assert_eq!(frame.kind, NodeKind::Assembly);
        assert_eq!(frame.children[1].name, "right");
        assert_eq!(frame.children[1].kind, NodeKind::Part);

        let info = gltf.info();
        assert_eq!(info.node_count, 3);
        assert_eq!(info.generator.as_deref(), Some("hand"));
        assert!(gltf.validate().is_empty());

        let contents = gltf.read();
        assert_eq!(contents.scenes[0].nodes[0].children.len(), 2);
        assert_eq!(contents.meshes[0].primitives, 1);
    }

    #[test]
    fn test_accessor_count_beyond_data_is_rejected() {
        let doc = |accessor: Value| {
            json!({
                "asset": {"version": "2.0"},
                "scenes": [{"nodes": [0]}],
                "nodes": [{"mesh": 0}],
                "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
                "buffers": [{"byteLength": 36, "uri": format!(
                    "data:application/octet-stream;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode([0u8; 36])
                )}],
                "bufferViews": [{"buffer": 0, "byteLength": 36}],
                "accessors": [accessor]
            })
            .to_string()
        };

        let huge = json!({"componentType": 5126, "count": 4611686018427387904u64, "type": "VEC3"});
        let gltf = Gltf::from_json(&doc(huge), PathBuf::new()).unwrap();
        assert!(matches!(gltf.bodies(), Err(Error::Parse(_))));

        let large = json!({"componentType": 5126, "count": 1_000_000_000u64, "type": "VEC3"});
        let gltf = Gltf::from_json(&doc(large), PathBuf::new()).unwrap();
        assert!(matches!(gltf.bodies(), Err(Error::Parse(_))));

        let viewed = json!({"bufferView": 0, "componentType": 5126, "count": 1_000_000_000u64, "type": "VEC3"});
        let gltf = Gltf::from_json(&doc(viewed), PathBuf::new()).unwrap();
        assert!(matches!(gltf.bodies(), Err(Error::Parse(_))));

        let fits = json!({"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"});
        let gltf = Gltf::from_json(&doc(fits), PathBuf::new()).unwrap();
        assert!(gltf.bodies().is_ok());
    }

    #[test]
    fn test_glb_container() {
        let json_text = json!({
            "asset": {"version": "1.0"},
            "nodes": [{"name": "empty"}]
        })
        .to_string();
        let mut json_chunk = json_text.into_bytes();
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }
        let mut glb = Vec::new();
        glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&((12 + 8 + json_chunk.len()) as u32).to_le_bytes());
        glb.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json_chunk);

        let gltf = Gltf::from_glb(&glb, PathBuf::new()).unwrap();
        let issues = gltf.validate();
        assert!(issues.contains(&"No scenes defined".to_string()));
        assert!(issues.contains(&"Unexpected glTF version: 1.0".to_string()));
        assert_eq!(gltf.tree("x").children[0].kind, NodeKind::Shape);
        assert!(Gltf::from_glb(b"nope", PathBuf::new()).is_err());
    }
}
