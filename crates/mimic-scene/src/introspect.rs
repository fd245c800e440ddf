//! Skeleton introspection - find what the lip-sync driver can move
//!
//! Runs once per attached asset. Matching is by case-insensitive name
//! substrings, which covers the common rig conventions ("Jaw", "mandible",
//! "mouthOpen", "lipsPart", "eyeBlink_L", ...).

use mimic_core::{MimicError, NodeId};

use crate::{Axis, ClipMask, NodeKind, Scene};

/// Something the driver writes every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationTarget {
    /// Rotate a bone about `axis`; `scale` multiplies the driven angle
    Bone { node: NodeId, axis: Axis, scale: f32 },
    /// Drive the weight of a mesh's morph channel
    MorphChannel { node: NodeId, channel: usize },
}

impl AnimationTarget {
    pub fn node(&self) -> NodeId {
        match self {
            AnimationTarget::Bone { node, .. } | AnimationTarget::MorphChannel { node, .. } => *node,
        }
    }
}

/// Something the blink scheduler closes and opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkTarget {
    /// Morph channel driven to 1 while closed
    Morph { node: NodeId, channel: usize },
    /// Eyelid mesh made visible while closed
    Eyelid { node: NodeId },
}

impl BlinkTarget {
    pub fn node(&self) -> NodeId {
        match self {
            BlinkTarget::Morph { node, .. } | BlinkTarget::Eyelid { node } => *node,
        }
    }
}

/// Everything found in one walk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Introspection {
    pub targets: Vec<AnimationTarget>,
    pub blink_targets: Vec<BlinkTarget>,
}

impl Introspection {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.blink_targets.is_empty()
    }

    /// What procedural animation owns, masked from clip playback. Bones
    /// and eyelids claim their transform, morph targets only their channel.
    pub fn clip_mask(&self) -> ClipMask {
        let mut mask = ClipMask::default();
        for target in &self.targets {
            match *target {
                AnimationTarget::Bone { node, .. } => mask.mask_transform(node),
                AnimationTarget::MorphChannel { node, channel } => mask.mask_morph(node, channel),
            }
        }
        for target in &self.blink_targets {
            match *target {
                BlinkTarget::Morph { node, channel } => mask.mask_morph(node, channel),
                BlinkTarget::Eyelid { node } => mask.mask_transform(node),
            }
        }
        mask
    }
}

/// Name-based target discovery
#[derive(Debug, Clone)]
pub struct SkeletonIntrospector {
    pub bone_keywords: Vec<String>,
    pub morph_keywords: Vec<String>,
    pub blink_keywords: Vec<String>,
    pub eyelid_keywords: Vec<String>,
}

impl Default for SkeletonIntrospector {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            bone_keywords: words(&["jaw", "mouth", "mandible"]),
            morph_keywords: words(&["mouth", "lip", "jaw"]),
            blink_keywords: words(&["blink", "eyelid"]),
            eyelid_keywords: words(&["eyelid"]),
        }
    }
}

fn matches_any(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k.as_str()))
}

impl SkeletonIntrospector {
    /// Walk the subtree under `root` once and collect every target
    pub fn introspect(&self, scene: &Scene, root: NodeId) -> Introspection {
        let mut found = Introspection::default();
        let mut jaw_found = false;

        scene.visit(root, |id, node| match &node.kind {
            NodeKind::Bone => {
                if !jaw_found && matches_any(&node.name, &self.bone_keywords) {
                    jaw_found = true;
                    found.targets.push(AnimationTarget::Bone {
                        node: id,
                        axis: Axis::X,
                        scale: 1.0,
                    });
                }
            }
            NodeKind::Mesh(mesh) => {
                for (channel, morph) in mesh.morph_channels.iter().enumerate() {
                    if matches_any(&morph.name, &self.blink_keywords) {
                        found.blink_targets.push(BlinkTarget::Morph { node: id, channel });
                    } else if matches_any(&morph.name, &self.morph_keywords) {
                        found
                            .targets
                            .push(AnimationTarget::MorphChannel { node: id, channel });
                    }
                }
                if matches_any(&node.name, &self.eyelid_keywords) {
                    found.blink_targets.push(BlinkTarget::Eyelid { node: id });
                }
            }
            NodeKind::Group | NodeKind::Light(_) => {}
        });

        if found.targets.is_empty() {
            tracing::warn!(root = %root, error = %MimicError::NoAnimatableTargetsFound, "lip-sync disabled for this asset");
        } else {
            tracing::debug!(
                root = %root,
                targets = found.targets.len(),
                blink_targets = found.blink_targets.len(),
                "animation targets resolved"
            );
        }
        found
    }

    /// Lip-sync targets only
    pub fn resolve(&self, scene: &Scene, root: NodeId) -> Vec<AnimationTarget> {
        self.introspect(scene, root).targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeshData, Node};

    fn rig() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let model = scene.insert(scene.root(), Node::group("model")).unwrap();
        let head = scene.insert(model, Node::new("Head", NodeKind::Bone)).unwrap();
        scene.insert(head, Node::new("Jaw_Bone", NodeKind::Bone)).unwrap();
        scene.insert(head, Node::new("MouthCorner", NodeKind::Bone)).unwrap();
        scene
            .insert(
                model,
                Node::new(
                    "FaceMesh",
                    NodeKind::Mesh(MeshData::with_morphs([
                        "mouthOpen",
                        "browUp",
                        "LipsPucker",
                        "eyeBlink_L",
                    ])),
                ),
            )
            .unwrap();
        scene
            .insert(model, Node::new("Eyelid_L", NodeKind::Mesh(MeshData::default())).hidden())
            .unwrap();
        (scene, model)
    }

    #[test]
    fn test_first_jaw_bone_only() {
        let (scene, model) = rig();
        let targets = SkeletonIntrospector::default().resolve(&scene, model);

        let bones: Vec<_> = targets
            .iter()
            .filter(|t| matches!(t, AnimationTarget::Bone { .. }))
            .collect();
        assert_eq!(bones.len(), 1);
        let jaw = scene.find_by_name(model, "Jaw_Bone").unwrap();
        assert_eq!(
            bones[0],
            &AnimationTarget::Bone {
                node: jaw,
                axis: Axis::X,
                scale: 1.0
            }
        );
    }

    #[test]
    fn test_all_matching_morph_channels() {
        let (scene, model) = rig();
        let face = scene.find_by_name(model, "FaceMesh").unwrap();
        let found = SkeletonIntrospector::default().introspect(&scene, model);

        let morphs: Vec<_> = found
            .targets
            .iter()
            .filter_map(|t| match t {
                AnimationTarget::MorphChannel { node, channel } => Some((*node, *channel)),
                _ => None,
            })
            .collect();
        assert_eq!(morphs, vec![(face, 0), (face, 2)]);
    }

    #[test]
    fn test_blink_targets() {
        let (scene, model) = rig();
        let face = scene.find_by_name(model, "FaceMesh").unwrap();
        let lid = scene.find_by_name(model, "Eyelid_L").unwrap();
        let found = SkeletonIntrospector::default().introspect(&scene, model);

        assert_eq!(
            found.blink_targets,
            vec![
                BlinkTarget::Morph {
                    node: face,
                    channel: 3
                },
                BlinkTarget::Eyelid { node: lid }
            ]
        );
        let mask = found.clip_mask();
        assert!(mask.masks_morph(face, 3));
        assert!(!mask.masks_transform(face));
        assert!(!mask.masks_morph(face, 1));
        assert!(mask.masks_transform(lid));
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.insert(root, Node::new("Spine", NodeKind::Bone)).unwrap();
        scene
            .insert(root, Node::new("Body", NodeKind::Mesh(MeshData::with_morphs(["fat"]))))
            .unwrap();

        let found = SkeletonIntrospector::default().introspect(&scene, root);
        assert!(found.is_empty());
    }
}
