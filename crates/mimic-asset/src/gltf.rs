//! glTF 2.0 document builder
//!
//! Only the parts of glTF the avatar needs are read: the node hierarchy with
//! local TRS, skins (to tell bones apart), mesh morph target names, material
//! names and colours, and animations when binary buffer data is embedded.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use mimic_core::{MimicError, MimicResult, NodeId};
use mimic_scene::{
    AnimationClip, ChannelValues, ClipChannel, Color, Interpolation, Material, MeshData,
    MorphChannel, Node, NodeKind, Quat, Scene, Transform, Vec3,
};

use crate::ModelData;

const COMPONENT_F32: u32 = 5126;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: AssetInfo,
    #[serde(default)]
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<SceneDef>,
    #[serde(default)]
    nodes: Vec<NodeDef>,
    #[serde(default)]
    meshes: Vec<MeshDef>,
    #[serde(default)]
    materials: Vec<MaterialDef>,
    #[serde(default)]
    skins: Vec<SkinDef>,
    #[serde(default)]
    animations: Vec<AnimationDef>,
    #[serde(default)]
    accessors: Vec<AccessorDef>,
    #[serde(default)]
    buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    buffers: Vec<BufferDef>,
}

#[derive(Debug, Deserialize)]
struct AssetInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct SceneDef {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct NodeDef {
    name: Option<String>,
    #[serde(default)]
    children: Vec<usize>,
    mesh: Option<usize>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
    matrix: Option<[f32; 16]>,
}

#[derive(Debug, Deserialize)]
struct MeshDef {
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<PrimitiveDef>,
    #[serde(default)]
    weights: Vec<f32>,
    extras: Option<MeshExtras>,
}

#[derive(Debug, Deserialize)]
struct PrimitiveDef {
    material: Option<usize>,
    #[serde(default)]
    targets: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeshExtras {
    #[serde(default)]
    target_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialDef {
    name: Option<String>,
    pbr_metallic_roughness: Option<PbrDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PbrDef {
    base_color_factor: Option<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    #[serde(default)]
    joints: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct AnimationDef {
    name: Option<String>,
    #[serde(default)]
    channels: Vec<ChannelDef>,
    #[serde(default)]
    samplers: Vec<SamplerDef>,
}

#[derive(Debug, Deserialize)]
struct ChannelDef {
    sampler: usize,
    target: TargetDef,
}

#[derive(Debug, Deserialize)]
struct TargetDef {
    node: Option<usize>,
    path: String,
}

#[derive(Debug, Deserialize)]
struct SamplerDef {
    input: usize,
    output: usize,
    interpolation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessorDef {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewDef {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferDef {
    byte_length: usize,
    uri: Option<String>,
}

/// Build a model from a glTF JSON document and optional embedded binary buffer
pub fn build_model(path: &str, json: &[u8], bin: Option<&[u8]>) -> MimicResult<ModelData> {
    let doc: Document = serde_json::from_slice(json).map_err(|e| parse_failure(path, e))?;
    if !doc.asset.version.starts_with('2') {
        return Err(parse_failure(
            path,
            format!("unsupported glTF version {}", doc.asset.version),
        ));
    }

    let mut builder = Builder {
        path,
        doc: &doc,
        scene: Scene::with_root(Node::group(model_name(path))),
        ids: HashMap::new(),
    };
    builder.build_nodes()?;

    let clips = if doc.animations.is_empty() {
        Vec::new()
    } else {
        match buffer_data(&doc, bin) {
            Some(data) => builder.build_clips(data)?,
            None => {
                tracing::warn!(
                    path,
                    animations = doc.animations.len(),
                    "animations skipped: no embedded buffer data"
                );
                Vec::new()
            }
        }
    };

    tracing::debug!(
        path,
        nodes = builder.scene.len(),
        clips = clips.len(),
        "glTF model built"
    );
    Ok(ModelData {
        scene: builder.scene,
        clips,
    })
}

fn parse_failure(path: &str, reason: impl std::fmt::Display) -> MimicError {
    MimicError::AssetParseFailure {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// File stem of the asset path
fn model_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string()
}

/// The single embedded buffer, if the document has one
fn buffer_data<'a>(doc: &Document, bin: Option<&'a [u8]>) -> Option<&'a [u8]> {
    match doc.buffers.first() {
        Some(buffer) if buffer.uri.is_none() => bin.filter(|data| data.len() >= buffer.byte_length),
        _ => None,
    }
}

struct Builder<'a> {
    path: &'a str,
    doc: &'a Document,
    scene: Scene,
    /// glTF node index -> scene id
    ids: HashMap<usize, NodeId>,
}

impl<'a> Builder<'a> {
    fn build_nodes(&mut self) -> MimicResult<()> {
        let doc = self.doc;
        let bones: HashSet<usize> = doc.skins.iter().flat_map(|s| s.joints.iter().copied()).collect();

        let roots = match doc.scenes.get(doc.scene.unwrap_or(0)) {
            Some(scene) => scene.nodes.clone(),
            None => {
                // No scene list: every node nobody claims as a child
                let children: HashSet<usize> =
                    doc.nodes.iter().flat_map(|n| n.children.iter().copied()).collect();
                (0..doc.nodes.len()).filter(|i| !children.contains(i)).collect()
            }
        };

        let root = self.scene.root();
        let mut stack: Vec<(usize, NodeId)> = roots.into_iter().rev().map(|i| (i, root)).collect();
        while let Some((index, parent)) = stack.pop() {
            if self.ids.contains_key(&index) {
                return Err(parse_failure(
                    self.path,
                    format!("node {index} appears twice in the hierarchy"),
                ));
            }
            let def = doc
                .nodes
                .get(index)
                .ok_or_else(|| parse_failure(self.path, format!("node index {index} out of range")))?;

            let node = self.node(index, def, bones.contains(&index))?;
            let id = self.scene.insert(parent, node)?;
            self.ids.insert(index, id);
            stack.extend(def.children.iter().rev().map(|child| (*child, id)));
        }
        Ok(())
    }

    fn node(&self, index: usize, def: &NodeDef, is_bone: bool) -> MimicResult<Node> {
        let name = def.name.clone().unwrap_or_else(|| format!("node_{index}"));
        let kind = if is_bone {
            NodeKind::Bone
        } else if let Some(mesh) = def.mesh {
            NodeKind::Mesh(self.mesh(mesh)?)
        } else {
            NodeKind::Group
        };
        Ok(Node::new(name, kind).with_transform(transform(def)))
    }

    fn mesh(&self, index: usize) -> MimicResult<MeshData> {
        let def = self
            .doc
            .meshes
            .get(index)
            .ok_or_else(|| parse_failure(self.path, format!("mesh index {index} out of range")))?;
        let first = def.primitives.first();

        let names = def
            .extras
            .as_ref()
            .map(|e| e.target_names.as_slice())
            .unwrap_or_default();
        let count = first.map_or(0, |p| p.targets.len());
        let morph_channels = (0..count)
            .map(|i| MorphChannel {
                name: names.get(i).cloned().unwrap_or_else(|| format!("target_{i}")),
                weight: def.weights.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0),
            })
            .collect();

        let material = first.and_then(|p| p.material).map(|m| self.material(m));
        if count > 0 && names.is_empty() {
            tracing::debug!(path = self.path, mesh = ?def.name, "morph targets without names");
        }

        Ok(MeshData {
            morph_channels,
            declared_material: material.as_ref().map(|m| m.name.clone()),
            material,
            cast_shadow: false,
            receive_shadow: false,
        })
    }

    fn material(&self, index: usize) -> Material {
        let def = self.doc.materials.get(index);
        let name = def
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| format!("material_{index}"));
        let color = def
            .and_then(|m| m.pbr_metallic_roughness.as_ref())
            .and_then(|p| p.base_color_factor)
            .map_or(Color::WHITE, |[r, g, b, _]| Color::rgb(r, g, b));
        Material::new(name, color, 30.0)
    }

    fn build_clips(&self, data: &[u8]) -> MimicResult<Vec<AnimationClip>> {
        let mut clips = Vec::with_capacity(self.doc.animations.len());
        for (index, anim) in self.doc.animations.iter().enumerate() {
            let mut channels = Vec::new();
            for channel in &anim.channels {
                let Some(node) = channel.target.node.and_then(|n| self.ids.get(&n).copied()) else {
                    continue;
                };
                let sampler = anim.samplers.get(channel.sampler).ok_or_else(|| {
                    parse_failure(self.path, format!("sampler {} out of range", channel.sampler))
                })?;
                if let Some(decoded) = self.channel(node, &channel.target.path, sampler, data)? {
                    channels.push(decoded);
                }
            }
            let name = anim.name.clone().unwrap_or_else(|| format!("clip_{index}"));
            clips.push(AnimationClip::new(name, channels));
        }
        Ok(clips)
    }

    fn channel(
        &self,
        node: NodeId,
        target: &str,
        sampler: &SamplerDef,
        data: &[u8],
    ) -> MimicResult<Option<ClipChannel>> {
        let times = self.read_floats(sampler.input, data)?;
        let mut output = self.read_floats(sampler.output, data)?;
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] < w[0]) {
            return Err(parse_failure(
                self.path,
                format!("sampler input {} is not finite and ascending", sampler.input),
            ));
        }

        let interpolation = match sampler.interpolation.as_deref() {
            Some("STEP") => Interpolation::Step,
            Some("CUBICSPLINE") => {
                // Keep the keyframe values, drop the tangents
                output = cubic_values(&output, times.len());
                Interpolation::Linear
            }
            _ => Interpolation::Linear,
        };

        let values = match target {
            "translation" => ChannelValues::Translation(output.chunks_exact(3).map(vec3).collect()),
            "scale" => ChannelValues::Scale(output.chunks_exact(3).map(vec3).collect()),
            "rotation" => ChannelValues::Rotation(
                output
                    .chunks_exact(4)
                    .map(|q| Quat::from_xyzw([q[0], q[1], q[2], q[3]]))
                    .collect(),
            ),
            "weights" if !times.is_empty() => ChannelValues::Weights {
                per_key: output.len() / times.len(),
                values: output,
            },
            other => {
                tracing::debug!(path = self.path, target = other, "unsupported animation target");
                return Ok(None);
            }
        };

        Ok(Some(ClipChannel {
            node,
            interpolation,
            times,
            values,
        }))
    }

    fn read_floats(&self, accessor: usize, data: &[u8]) -> MimicResult<Vec<f32>> {
        let acc = self
            .doc
            .accessors
            .get(accessor)
            .ok_or_else(|| parse_failure(self.path, format!("accessor {accessor} out of range")))?;
        if acc.component_type != COMPONENT_F32 {
            return Err(parse_failure(
                self.path,
                format!("accessor {accessor}: component type {} not supported", acc.component_type),
            ));
        }
        let components = match acc.kind.as_str() {
            "SCALAR" => 1,
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            other => {
                return Err(parse_failure(
                    self.path,
                    format!("accessor {accessor}: type {other} not supported"),
                ))
            }
        };
        let view = acc
            .buffer_view
            .and_then(|v| self.doc.buffer_views.get(v))
            .ok_or_else(|| parse_failure(self.path, format!("accessor {accessor} has no buffer view")))?;
        if view.buffer != 0 {
            return Err(parse_failure(self.path, "only the embedded buffer is supported"));
        }

        let element = components * 4;
        let stride = view.byte_stride.unwrap_or(element);
        if stride < element {
            return Err(parse_failure(
                self.path,
                format!("accessor {accessor}: stride {stride} shorter than element {element}"),
            ));
        }
        let overflow =
            || parse_failure(self.path, format!("accessor {accessor} range overflows"));
        let start = view
            .byte_offset
            .checked_add(acc.byte_offset)
            .ok_or_else(overflow)?;
        let end = view
            .byte_offset
            .checked_add(view.byte_length)
            .ok_or_else(overflow)?;
        let needed = match acc.count {
            0 => Some(start),
            count => (count - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(start))
                .and_then(|last| last.checked_add(element)),
        }
        .ok_or_else(overflow)?;
        if needed > end || end > data.len() {
            return Err(parse_failure(
                self.path,
                format!("accessor {accessor} reads past its buffer view"),
            ));
        }

        // count is bounded by the view length once the range check passes
        let mut out = Vec::with_capacity(acc.count * components);
        for i in 0..acc.count {
            let base = start + i * stride;
            for c in 0..components {
                let at = base + c * 4;
                out.push(f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]));
            }
        }
        Ok(out)
    }
}

fn vec3(v: &[f32]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Cubic-spline outputs are (in-tangent, value, out-tangent) per key
fn cubic_values(output: &[f32], keys: usize) -> Vec<f32> {
    if keys == 0 || output.len() % (keys * 3) != 0 {
        return output.to_vec();
    }
    let width = output.len() / (keys * 3);
    output
        .chunks_exact(width * 3)
        .flat_map(|key| key[width..width * 2].iter().copied())
        .collect()
}

fn transform(def: &NodeDef) -> Transform {
    if let Some(m) = def.matrix {
        return decompose(&m);
    }
    Transform {
        translation: def.translation.map_or(Vec3::ZERO, Vec3::from_array),
        rotation: def.rotation.map_or(Quat::IDENTITY, Quat::from_xyzw),
        scale: def.scale.map_or(Vec3::ONE, Vec3::from_array),
    }
}

/// Split a column-major TRS matrix (no shear) into its parts
fn decompose(m: &[f32; 16]) -> Transform {
    let translation = Vec3::new(m[12], m[13], m[14]);
    let sx = Vec3::new(m[0], m[1], m[2]).length();
    let sy = Vec3::new(m[4], m[5], m[6]).length();
    let sz = Vec3::new(m[8], m[9], m[10]).length();
    let safe = |s: f32| if s > f32::EPSILON { s } else { 1.0 };
    let (ix, iy, iz) = (1.0 / safe(sx), 1.0 / safe(sy), 1.0 / safe(sz));

    // Rotation matrix r[row][col]
    let r = [
        [m[0] * ix, m[4] * iy, m[8] * iz],
        [m[1] * ix, m[5] * iy, m[9] * iz],
        [m[2] * ix, m[6] * iy, m[10] * iz],
    ];
    let trace = r[0][0] + r[1][1] + r[2][2];
    let q = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        Quat {
            w: 0.25 * s,
            x: (r[2][1] - r[1][2]) / s,
            y: (r[0][2] - r[2][0]) / s,
            z: (r[1][0] - r[0][1]) / s,
        }
    } else if r[0][0] > r[1][1] && r[0][0] > r[2][2] {
        let s = (1.0 + r[0][0] - r[1][1] - r[2][2]).sqrt() * 2.0;
        Quat {
            w: (r[2][1] - r[1][2]) / s,
            x: 0.25 * s,
            y: (r[0][1] + r[1][0]) / s,
            z: (r[0][2] + r[2][0]) / s,
        }
    } else if r[1][1] > r[2][2] {
        let s = (1.0 + r[1][1] - r[0][0] - r[2][2]).sqrt() * 2.0;
        Quat {
            w: (r[0][2] - r[2][0]) / s,
            x: (r[0][1] + r[1][0]) / s,
            y: 0.25 * s,
            z: (r[1][2] + r[2][1]) / s,
        }
    } else {
        let s = (1.0 + r[2][2] - r[0][0] - r[1][1]).sqrt() * 2.0;
        Quat {
            w: (r[1][0] - r[0][1]) / s,
            x: (r[0][2] + r[2][0]) / s,
            y: (r[1][2] + r[2][1]) / s,
            z: 0.25 * s,
        }
    };

    Transform {
        translation,
        rotation: q.normalize(),
        scale: Vec3::new(sx, sy, sz),
    }
}
