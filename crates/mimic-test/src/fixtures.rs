//! Character model fixtures
//!
//! Builds small glTF documents in memory. `to_gltf` emits the JSON form,
//! where clips cannot be read because there is no embedded buffer;
//! `to_glb` packs keyframes into the BIN chunk so clips survive loading.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{json, Value};

use mimic_asset::MemorySource;

const COMPONENT_F32: u32 = 5126;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

#[derive(Debug, Clone)]
struct NodeSpec {
    name: String,
    parent: Option<usize>,
    mesh: Option<usize>,
    rotation: Option<[f32; 4]>,
}

#[derive(Debug, Clone)]
struct MeshSpec {
    morphs: Vec<String>,
    material: Option<usize>,
}

#[derive(Debug, Clone)]
struct ClipSpec {
    name: String,
    node: usize,
    times: Vec<f32>,
    /// Rotation keys, xyzw
    rotations: Vec<[f32; 4]>,
}

/// Rotation about X by `angle` radians, xyzw
fn x_rotation(angle: f32) -> [f32; 4] {
    let half = angle * 0.5;
    [half.sin(), 0.0, 0.0, half.cos()]
}

/// In-memory glTF model builder. Node indices are returned by each adder.
#[derive(Debug, Clone, Default)]
pub struct ModelFixture {
    nodes: Vec<NodeSpec>,
    meshes: Vec<MeshSpec>,
    materials: Vec<(String, [f32; 4])>,
    joints: Vec<usize>,
    clips: Vec<ClipSpec>,
}

impl ModelFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rigged head: jaw bone, face morphs (mouth, lips, blink) and a clothed body
    ///
    /// ```text
    /// Avatar
    /// ├── Head (bone)
    /// │   └── Jaw (bone)
    /// ├── Face  [mouthOpen, lipsPart, eyeBlink_L, eyeBlink_R]
    /// └── Body
    /// ```
    pub fn talking_head() -> Self {
        let mut model = Self::new();
        let avatar = model.group("Avatar", None);
        let head = model.bone("Head", Some(avatar));
        model.bone("Jaw", Some(head));
        model.mesh(
            "Face",
            Some(avatar),
            &["mouthOpen", "lipsPart", "eyeBlink_L", "eyeBlink_R"],
            Some(("Skin", [0.9, 0.75, 0.65, 1.0])),
        );
        model.mesh("Body", Some(avatar), &[], Some(("Cloth", [0.2, 0.3, 0.6, 1.0])));
        model
    }

    /// `talking_head` plus a looping head nod on the Head bone
    pub fn nodding_head() -> Self {
        let mut model = Self::talking_head();
        model.nod("Nod", 1, 1.0, 0.2);
        model
    }

    /// No rig and no morphs: nothing to animate
    pub fn statue() -> Self {
        let mut model = Self::new();
        let root = model.group("Statue", None);
        model.mesh("Marble", Some(root), &[], None);
        model
    }

    pub fn group(&mut self, name: &str, parent: Option<usize>) -> usize {
        self.push_node(name, parent, None)
    }

    /// A node listed as a skin joint
    pub fn bone(&mut self, name: &str, parent: Option<usize>) -> usize {
        let index = self.push_node(name, parent, None);
        self.joints.push(index);
        index
    }

    /// A mesh node with named morph targets and an optional declared material
    pub fn mesh(
        &mut self,
        name: &str,
        parent: Option<usize>,
        morphs: &[&str],
        material: Option<(&str, [f32; 4])>,
    ) -> usize {
        let material = material.map(|(name, color)| {
            self.materials.push((name.to_string(), color));
            self.materials.len() - 1
        });
        self.meshes.push(MeshSpec {
            morphs: morphs.iter().map(|m| m.to_string()).collect(),
            material,
        });
        let mesh = self.meshes.len() - 1;
        self.push_node(name, parent, Some(mesh))
    }

    /// Give `node` a rest rotation about X
    pub fn tilt(&mut self, node: usize, angle: f32) -> &mut Self {
        if let Some(spec) = self.nodes.get_mut(node) {
            spec.rotation = Some(x_rotation(angle));
        }
        self
    }

    /// Rotation clip on `node`: rest, `angle` at half `period`, rest again
    pub fn nod(&mut self, name: &str, node: usize, period: f32, angle: f32) -> &mut Self {
        self.clips.push(ClipSpec {
            name: name.to_string(),
            node,
            times: vec![0.0, period * 0.5, period],
            rotations: vec![x_rotation(0.0), x_rotation(angle), x_rotation(0.0)],
        });
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    fn push_node(&mut self, name: &str, parent: Option<usize>, mesh: Option<usize>) -> usize {
        self.nodes.push(NodeSpec {
            name: name.to_string(),
            parent,
            mesh,
            rotation: None,
        });
        self.nodes.len() - 1
    }

    /// glTF JSON document. Clips reference an external buffer and are not loadable.
    pub fn to_gltf(&self) -> Bytes {
        let (doc, _) = self.document(Some("clips.bin"));
        Bytes::from(doc.to_string())
    }

    /// Binary glTF with clip keyframes in the BIN chunk
    pub fn to_glb(&self) -> Bytes {
        let (doc, bin) = self.document(None);
        let mut json = doc.to_string().into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let mut body = BytesMut::new();
        body.put_u32_le(json.len() as u32);
        body.put_u32_le(CHUNK_JSON);
        body.put_slice(&json);
        if !bin.is_empty() {
            body.put_u32_le(bin.len() as u32);
            body.put_u32_le(CHUNK_BIN);
            body.put_slice(&bin);
        }

        let mut out = BytesMut::with_capacity(12 + body.len());
        out.put_u32_le(GLB_MAGIC);
        out.put_u32_le(GLB_VERSION);
        out.put_u32_le((12 + body.len()) as u32);
        out.put_slice(&body);
        out.freeze()
    }

    /// Store both encodings in `source` under `<stem>.gltf` and `<stem>.glb`
    pub fn install(&self, source: &MemorySource, stem: &str) {
        source.insert(format!("{stem}.gltf"), self.to_gltf());
        source.insert(format!("{stem}.glb"), self.to_glb());
    }

    fn document(&self, buffer_uri: Option<&str>) -> (Value, Bytes) {
        let nodes: Vec<Value> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let children: Vec<usize> = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.parent == Some(index))
                    .map(|(i, _)| i)
                    .collect();
                let mut node = json!({ "name": spec.name });
                if !children.is_empty() {
                    node["children"] = json!(children);
                }
                if let Some(mesh) = spec.mesh {
                    node["mesh"] = json!(mesh);
                }
                if let Some(rotation) = spec.rotation {
                    node["rotation"] = json!(rotation);
                }
                node
            })
            .collect();

        let roots: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| i)
            .collect();

        let meshes: Vec<Value> = self
            .meshes
            .iter()
            .map(|mesh| {
                let mut primitive = json!({
                    "targets": mesh.morphs.iter().map(|_| json!({})).collect::<Vec<_>>(),
                });
                if let Some(material) = mesh.material {
                    primitive["material"] = json!(material);
                }
                json!({
                    "primitives": [primitive],
                    "extras": { "targetNames": mesh.morphs },
                })
            })
            .collect();

        let materials: Vec<Value> = self
            .materials
            .iter()
            .map(|(name, color)| {
                json!({ "name": name, "pbrMetallicRoughness": { "baseColorFactor": color } })
            })
            .collect();

        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "mimic-test" },
            "scene": 0,
            "scenes": [{ "nodes": roots }],
            "nodes": nodes,
            "meshes": meshes,
            "materials": materials,
        });
        if !self.joints.is_empty() {
            doc["skins"] = json!([{ "joints": self.joints }]);
        }

        let bin = self.encode_clips(&mut doc, buffer_uri);
        (doc, bin)
    }

    /// Write accessors, views and animations into `doc`; returns the buffer bytes
    fn encode_clips(&self, doc: &mut Value, buffer_uri: Option<&str>) -> Bytes {
        if self.clips.is_empty() {
            return Bytes::new();
        }

        let mut bin = BytesMut::new();
        let mut views = Vec::new();
        let mut accessors = Vec::new();
        let mut animations = Vec::new();

        let mut push_accessor = |bin: &mut BytesMut, values: &[f32], kind: &str, count: usize| {
            let offset = bin.len();
            for v in values {
                bin.put_f32_le(*v);
            }
            views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": values.len() * 4 }));
            accessors.push(json!({
                "bufferView": views.len() - 1,
                "componentType": COMPONENT_F32,
                "count": count,
                "type": kind,
            }));
            accessors.len() - 1
        };

        for clip in &self.clips {
            let keys = clip.times.len();
            let input = push_accessor(&mut bin, &clip.times, "SCALAR", keys);
            let flat: Vec<f32> = clip.rotations.iter().flatten().copied().collect();
            let output = push_accessor(&mut bin, &flat, "VEC4", keys);
            animations.push(json!({
                "name": clip.name,
                "channels": [{ "sampler": 0, "target": { "node": clip.node, "path": "rotation" } }],
                "samplers": [{ "input": input, "output": output, "interpolation": "LINEAR" }],
            }));
        }

        let mut buffer = json!({ "byteLength": bin.len() });
        if let Some(uri) = buffer_uri {
            buffer["uri"] = json!(uri);
        }
        doc["buffers"] = json!([buffer]);
        doc["bufferViews"] = json!(views);
        doc["accessors"] = json!(accessors);
        doc["animations"] = json!(animations);
        bin.freeze()
    }
}
