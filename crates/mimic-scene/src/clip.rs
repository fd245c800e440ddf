//! Keyframed animation clips and the mixer that plays them
//!
//! Clips animate node transforms and morph weights. The mixer advances every
//! playing clip by real elapsed time and writes sampled values into the scene,
//! except where the mask hands a transform or morph channel to procedural
//! animation.

use std::collections::HashSet;
use std::time::Duration;

use mimic_core::NodeId;

use crate::{Quat, Scene, Vec3};

/// Keyframe interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

/// Keyframe values of one channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
    /// Morph weights, `per_key` values per keyframe
    Weights { per_key: usize, values: Vec<f32> },
}

impl ChannelValues {
    fn key_count(&self) -> usize {
        match self {
            ChannelValues::Translation(v) | ChannelValues::Scale(v) => v.len(),
            ChannelValues::Rotation(v) => v.len(),
            ChannelValues::Weights { per_key, values } => {
                if *per_key == 0 {
                    0
                } else {
                    values.len() / per_key
                }
            }
        }
    }
}

/// One sampled channel value
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Translation(Vec3),
    Rotation(Quat),
    Scale(Vec3),
    Weights(Vec<f32>),
}

/// Animation of one property of one node
#[derive(Debug, Clone, PartialEq)]
pub struct ClipChannel {
    pub node: NodeId,
    pub interpolation: Interpolation,
    /// Keyframe times in seconds, ascending
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl ClipChannel {
    /// Number of usable keyframes
    pub fn key_count(&self) -> usize {
        self.times.len().min(self.values.key_count())
    }

    /// Sample at `t` seconds. `None` for a channel without keyframes.
    pub fn sample(&self, t: f32) -> Option<Sample> {
        let count = self.key_count();
        if count == 0 {
            return None;
        }
        let times = &self.times[..count];

        let (i0, i1, alpha) = if count == 1 || t <= times[0] {
            (0, 0, 0.0)
        } else if t >= times[count - 1] {
            (count - 1, count - 1, 0.0)
        } else {
            // Clamped so unordered or NaN keys still index in range
            let i1 = times.partition_point(|key| *key <= t).clamp(1, count - 1);
            let i0 = i1 - 1;
            let span = times[i1] - times[i0];
            let alpha = if span > 0.0 { (t - times[i0]) / span } else { 0.0 };
            match self.interpolation {
                Interpolation::Linear => (i0, i1, alpha),
                Interpolation::Step => (i0, i0, 0.0),
            }
        };

        let sample = match &self.values {
            ChannelValues::Translation(v) => Sample::Translation(v[i0].lerp(&v[i1], alpha)),
            ChannelValues::Scale(v) => Sample::Scale(v[i0].lerp(&v[i1], alpha)),
            ChannelValues::Rotation(v) => Sample::Rotation(v[i0].slerp(&v[i1], alpha)),
            ChannelValues::Weights { per_key, values } => {
                let a = &values[i0 * per_key..(i0 + 1) * per_key];
                let b = &values[i1 * per_key..(i1 + 1) * per_key];
                Sample::Weights(a.iter().zip(b).map(|(a, b)| a + (b - a) * alpha).collect())
            }
        };
        Some(sample)
    }
}

/// Named set of channels
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds; the last keyframe time over all channels
    pub duration: f32,
    pub channels: Vec<ClipChannel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<ClipChannel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    /// Retarget onto other node ids; channels whose node has no mapping are dropped
    pub fn remap<F>(&self, mut map: F) -> AnimationClip
    where
        F: FnMut(NodeId) -> Option<NodeId>,
    {
        let channels = self
            .channels
            .iter()
            .filter_map(|channel| {
                map(channel.node).map(|node| ClipChannel {
                    node,
                    ..channel.clone()
                })
            })
            .collect();
        AnimationClip {
            name: self.name.clone(),
            duration: self.duration,
            channels,
        }
    }
}

/// What clip playback must leave alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipMask {
    transforms: HashSet<NodeId>,
    morphs: HashSet<(NodeId, usize)>,
}

impl ClipMask {
    pub fn mask_transform(&mut self, node: NodeId) {
        self.transforms.insert(node);
    }

    pub fn mask_morph(&mut self, node: NodeId, channel: usize) {
        self.morphs.insert((node, channel));
    }

    pub fn masks_transform(&self, node: NodeId) -> bool {
        self.transforms.contains(&node)
    }

    pub fn masks_morph(&self, node: NodeId, channel: usize) -> bool {
        self.morphs.contains(&(node, channel))
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.morphs.is_empty()
    }
}

/// Playback state of one clip
#[derive(Debug, Clone)]
pub struct ClipAction {
    pub clip: AnimationClip,
    /// Playhead in seconds
    pub time: f32,
    pub looping: bool,
}

/// Plays clips against a scene
#[derive(Debug, Clone, Default)]
pub struct ClipMixer {
    actions: Vec<ClipAction>,
    mask: ClipMask,
    playing: bool,
}

impl ClipMixer {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        Self {
            actions: clips
                .into_iter()
                .map(|clip| ClipAction {
                    clip,
                    time: 0.0,
                    looping: true,
                })
                .collect(),
            mask: ClipMask::default(),
            playing: false,
        }
    }

    /// Start every clip, looping
    pub fn play_all(&mut self) {
        for action in &mut self.actions {
            action.looping = true;
        }
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn clip_count(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    pub fn set_mask(&mut self, mask: ClipMask) {
        self.mask = mask;
    }

    pub fn mask(&self) -> &ClipMask {
        &self.mask
    }

    /// Advance all clips by `dt` and write samples into the scene.
    ///
    /// Clips apply in order, so later clips win on shared nodes. Returns the
    /// number of channel writes.
    pub fn advance(&mut self, dt: Duration, scene: &mut Scene) -> usize {
        if !self.playing {
            return 0;
        }

        let step = dt.as_secs_f32();
        let mut writes = 0;
        for action in &mut self.actions {
            let duration = action.clip.duration;
            action.time += step;
            if duration > 0.0 {
                action.time = if action.looping {
                    action.time.rem_euclid(duration)
                } else {
                    action.time.min(duration)
                };
            }

            for channel in &action.clip.channels {
                let Some(sample) = channel.sample(action.time) else {
                    continue;
                };
                if apply(scene, channel.node, sample, &self.mask) {
                    writes += 1;
                }
            }
        }
        writes
    }
}

fn apply(scene: &mut Scene, id: NodeId, sample: Sample, mask: &ClipMask) -> bool {
    if mask.masks_transform(id) && !matches!(sample, Sample::Weights(_)) {
        return false;
    }
    let Some(node) = scene.get_mut(id) else {
        return false;
    };
    match sample {
        Sample::Translation(v) => node.transform.translation = v,
        Sample::Rotation(q) => node.transform.rotation = q,
        Sample::Scale(v) => node.transform.scale = v,
        Sample::Weights(weights) => {
            let Some(mesh) = node.mesh_mut() else {
                return false;
            };
            let mut written = false;
            for (index, (channel, weight)) in mesh.morph_channels.iter_mut().zip(weights).enumerate() {
                if !mask.masks_morph(id, index) {
                    channel.weight = weight.clamp(0.0, 1.0);
                    written = true;
                }
            }
            return written;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Axis, MeshData, Node, NodeKind};

    fn translation_clip(node: NodeId) -> AnimationClip {
        AnimationClip::new(
            "bob",
            vec![ClipChannel {
                node,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 1.0, 2.0],
                values: ChannelValues::Translation(vec![
                    Vec3::ZERO,
                    Vec3::new(0.0, 1.0, 0.0),
                    Vec3::ZERO,
                ]),
            }],
        )
    }

    #[test]
    fn test_linear_and_step_sampling() {
        let mut channel = translation_clip(NodeId::new(0, 0)).channels.remove(0);

        assert_eq!(
            channel.sample(0.5),
            Some(Sample::Translation(Vec3::new(0.0, 0.5, 0.0)))
        );
        assert_eq!(channel.sample(-1.0), Some(Sample::Translation(Vec3::ZERO)));
        assert_eq!(channel.sample(9.0), Some(Sample::Translation(Vec3::ZERO)));

        channel.interpolation = Interpolation::Step;
        assert_eq!(channel.sample(0.9), Some(Sample::Translation(Vec3::ZERO)));
    }

    #[test]
    fn test_rotation_channel_slerps() {
        let channel = ClipChannel {
            node: NodeId::new(0, 0),
            interpolation: Interpolation::Linear,
            times: vec![0.0, 1.0],
            values: ChannelValues::Rotation(vec![
                Quat::IDENTITY,
                Quat::from_axis_angle(Axis::Y, 1.0),
            ]),
        };
        let Some(Sample::Rotation(q)) = channel.sample(0.5) else {
            panic!("expected rotation");
        };
        assert!((Quat::IDENTITY.angle_to(&q) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_mixer_loops_and_writes() {
        let mut scene = Scene::new();
        let node = scene.insert(scene.root(), Node::group("hips")).unwrap();
        let mut mixer = ClipMixer::new(vec![translation_clip(node)]);

        // Not playing yet
        assert_eq!(mixer.advance(Duration::from_millis(500), &mut scene), 0);

        mixer.play_all();
        assert_eq!(mixer.advance(Duration::from_millis(500), &mut scene), 1);
        let y = scene.get(node).unwrap().transform.translation.y;
        assert!((y - 0.5).abs() < 1e-5);

        // 0.5 + 2.0 wraps to 0.5
        mixer.advance(Duration::from_secs(2), &mut scene);
        assert!((mixer.actions()[0].time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_masked_nodes_untouched() {
        let mut scene = Scene::new();
        let jaw = scene.insert(scene.root(), Node::new("jaw", NodeKind::Bone)).unwrap();
        let mut mixer = ClipMixer::new(vec![translation_clip(jaw)]);
        mixer.play_all();
        let mut mask = ClipMask::default();
        mask.mask_transform(jaw);
        mixer.set_mask(mask);

        assert_eq!(mixer.advance(Duration::from_millis(500), &mut scene), 0);
        assert_eq!(scene.get(jaw).unwrap().transform.translation, Vec3::ZERO);
        assert!(mixer.mask().masks_transform(jaw));
    }

    #[test]
    fn test_masked_morph_leaves_sibling_channels_to_clip() {
        let mut scene = Scene::new();
        let face = scene
            .insert(
                scene.root(),
                Node::new("face", NodeKind::Mesh(MeshData::with_morphs(["mouthOpen", "smile"]))),
            )
            .unwrap();
        let clip = AnimationClip::new(
            "emote",
            vec![ClipChannel {
                node: face,
                interpolation: Interpolation::Step,
                times: vec![0.0, 1.0],
                values: ChannelValues::Weights {
                    per_key: 2,
                    values: vec![0.9, 0.8, 0.9, 0.8],
                },
            }],
        );
        let mut mixer = ClipMixer::new(vec![clip]);
        mixer.play_all();
        let mut mask = ClipMask::default();
        mask.mask_morph(face, 0);
        mixer.set_mask(mask);

        assert_eq!(mixer.advance(Duration::from_millis(250), &mut scene), 1);
        let mesh = scene.get(face).unwrap().mesh().unwrap();
        assert_eq!(mesh.morph_channels[0].weight, 0.0);
        assert!((mesh.morph_channels[1].weight - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_unordered_keys_sample_without_panicking() {
        let channel = ClipChannel {
            node: NodeId::new(0, 0),
            interpolation: Interpolation::Linear,
            times: vec![f32::NAN, 1.0],
            values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::ONE]),
        };
        assert!(channel.sample(0.5).is_some());

        let backwards = ClipChannel {
            times: vec![2.0, 1.0, 0.5],
            values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::ONE, Vec3::ZERO]),
            ..channel.clone()
        };
        assert!(backwards.sample(3.0).is_some());
        assert!(backwards.sample(1.5).is_some());

        let mut scene = Scene::new();
        let node = scene.insert(scene.root(), Node::group("hips")).unwrap();
        let mut mixer = ClipMixer::new(vec![AnimationClip::new(
            "broken",
            vec![ClipChannel { node, ..channel }],
        )]);
        mixer.play_all();
        assert_eq!(mixer.advance(Duration::from_millis(500), &mut scene), 1);
    }

    #[test]
    fn test_weight_channel() {
        let mut scene = Scene::new();
        let face = scene
            .insert(
                scene.root(),
                Node::new("face", NodeKind::Mesh(MeshData::with_morphs(["smile", "frown"]))),
            )
            .unwrap();
        let clip = AnimationClip::new(
            "emote",
            vec![ClipChannel {
                node: face,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 1.0],
                values: ChannelValues::Weights {
                    per_key: 2,
                    values: vec![0.0, 1.0, 1.0, 0.0],
                },
            }],
        );
        let mut mixer = ClipMixer::new(vec![clip]);
        mixer.play_all();
        mixer.advance(Duration::from_millis(250), &mut scene);

        let mesh = scene.get(face).unwrap().mesh().unwrap();
        assert!((mesh.morph_channels[0].weight - 0.25).abs() < 1e-5);
        assert!((mesh.morph_channels[1].weight - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_remap_drops_unmapped() {
        let clip = translation_clip(NodeId::new(4, 0));
        let target = NodeId::new(9, 1);

        let mapped = clip.remap(|_| Some(target));
        assert_eq!(mapped.channels[0].node, target);
        assert_eq!(mapped.duration, 2.0);

        assert!(clip.remap(|_| None).channels.is_empty());
    }
}
