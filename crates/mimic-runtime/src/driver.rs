//! Animation driver - speech activity to mouth pose, once per frame
//!
//! ```text
//!  activity ─┬─> jaw bones      rest ⊗ axis_angle(current)
//!            └─> mouth morphs   current × multiplier
//!  clips    ───> mixer.advance(real dt)           (driven channels masked)
//!  quiet    ───> idle sway on the model root
//!  render   ───> exactly once
//! ```
//!
//! Smoothing is per frame: `current += (target - current) * smoothing`.
//! With a factor in (0, 1] the value approaches a constant target
//! monotonically and never overshoots.

use std::time::Duration;

use mimic_core::{MediaTime, MimicError, MimicResult, NodeId, SpeechActivity};
use mimic_scene::{face_light, AnimationTarget, Axis, Camera, ClipMixer, Quat, Scene};
use mimic_time::{FrameClock, FrameLimiter};

use crate::{BlinkScheduler, RenderTarget};

/// Animation driver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Jaw rotation in radians at full activity
    pub rotation_scale: f32,
    /// Per-frame smoothing factor, in (0, 1]
    pub smoothing: f32,
    /// Morph weight multipliers keyed by channel-name substring
    pub morph_weights: Vec<(String, f32)>,
    /// Activity below this counts as quiet
    pub idle_threshold: f32,
    /// Quiet time before idle sway fades in
    pub idle_delay: Duration,
    /// Per-frame smoothing of the idle blend
    pub idle_smoothing: f32,
    /// Clamp on the clip delta after a stall or suspend
    pub max_frame_delta: Duration,
    /// Render rate cap; `None` renders every opportunity
    pub max_fps: Option<f64>,
    /// Period of frame opportunities
    pub frame_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rotation_scale: 0.35,
            smoothing: 0.3,
            morph_weights: Vec::new(),
            idle_threshold: 0.1,
            idle_delay: Duration::from_millis(1_500),
            idle_smoothing: 0.05,
            max_frame_delta: Duration::from_millis(100),
            max_fps: Some(60.0),
            frame_interval: Duration::from_micros(8_333),
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> MimicResult<()> {
        let unit = |name: &str, v: f32| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(MimicError::InvalidConfig(format!("{name} {v} outside (0, 1]")))
            }
        };
        unit("smoothing", self.smoothing)?;
        unit("idle_smoothing", self.idle_smoothing)?;

        if !self.rotation_scale.is_finite() || self.rotation_scale < 0.0 {
            return Err(MimicError::InvalidConfig(format!(
                "rotation_scale {} must be a non-negative angle",
                self.rotation_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.idle_threshold) {
            return Err(MimicError::InvalidConfig(format!(
                "idle_threshold {} outside [0, 1]",
                self.idle_threshold
            )));
        }
        if let Some((name, w)) = self
            .morph_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(MimicError::InvalidConfig(format!(
                "morph weight for '{name}' is {w}"
            )));
        }
        if self.max_frame_delta.is_zero() || self.frame_interval.is_zero() {
            return Err(MimicError::InvalidConfig(
                "frame timing must be positive".into(),
            ));
        }
        if self.max_fps.is_some_and(|fps| !fps.is_finite() || fps <= 0.0) {
            return Err(MimicError::InvalidConfig(format!(
                "max_fps {:?} must be positive",
                self.max_fps
            )));
        }
        Ok(())
    }

    /// Multiplier for a morph channel; first matching substring wins
    pub fn morph_weight(&self, channel_name: &str) -> f32 {
        let lower = channel_name.to_ascii_lowercase();
        self.morph_weights
            .iter()
            .find(|(key, _)| lower.contains(&key.to_ascii_lowercase()))
            .map_or(1.0, |(_, w)| *w)
    }
}

/// One exponential smoothing step
#[inline]
pub fn smooth(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No asset attached
    Idle,
    /// Driving an attached asset
    Ready,
    TornDown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub executed_frames: u64,
    pub skipped_frames: u64,
    pub bone_writes: u64,
    pub morph_writes: u64,
    pub clip_writes: u64,
    pub sway_writes: u64,
    pub render_errors: u64,
}

impl DriverStats {
    /// Writes to animation targets
    pub fn pose_writes(&self) -> u64 {
        self.bone_writes + self.morph_writes
    }
}

#[derive(Debug, Clone)]
struct DrivenBone {
    node: NodeId,
    axis: Axis,
    scale: f32,
    current: f32,
}

#[derive(Debug, Clone)]
struct DrivenMorph {
    node: NodeId,
    channel: usize,
    multiplier: f32,
    current: f32,
}

/// Per-frame procedural animation
#[derive(Debug)]
pub struct AnimationDriver {
    config: DriverConfig,
    state: DriverState,
    limiter: FrameLimiter,
    frame_clock: FrameClock,
    bones: Vec<DrivenBone>,
    morphs: Vec<DrivenMorph>,
    model_root: Option<NodeId>,
    front_light: Option<NodeId>,
    epoch: Option<MediaTime>,
    quiet_since: Option<MediaTime>,
    idle_blend: f32,
    stats: DriverStats,
}

impl AnimationDriver {
    pub fn new(config: DriverConfig) -> Self {
        let limiter = FrameLimiter::new(config.max_fps);
        let frame_clock = FrameClock::new(config.max_frame_delta);
        Self {
            config,
            state: DriverState::Idle,
            limiter,
            frame_clock,
            bones: Vec::new(),
            morphs: Vec::new(),
            model_root: None,
            front_light: None,
            epoch: None,
            quiet_since: None,
            idle_blend: 0.0,
            stats: DriverStats::default(),
        }
    }

    /// Take over the targets of a newly attached model.
    ///
    /// Replaces any previous targets. Adds the face light on first use.
    pub fn attach(
        &mut self,
        scene: &mut Scene,
        model_root: NodeId,
        targets: &[AnimationTarget],
    ) -> MimicResult<()> {
        if self.state == DriverState::TornDown {
            return Err(MimicError::SessionTornDown);
        }

        if !self.front_light.is_some_and(|light| scene.contains(light)) {
            self.front_light = Some(scene.insert(scene.root(), face_light())?);
        }

        self.bones.clear();
        self.morphs.clear();
        for target in targets {
            match *target {
                AnimationTarget::Bone { node, axis, scale } => self.bones.push(DrivenBone {
                    node,
                    axis,
                    scale,
                    current: 0.0,
                }),
                AnimationTarget::MorphChannel { node, channel } => {
                    let multiplier = scene
                        .get(node)
                        .and_then(|n| n.mesh())
                        .and_then(|mesh| mesh.morph_channels.get(channel))
                        .map_or(1.0, |c| self.config.morph_weight(&c.name));
                    self.morphs.push(DrivenMorph {
                        node,
                        channel,
                        multiplier,
                        current: 0.0,
                    });
                }
            }
        }

        self.model_root = Some(model_root);
        self.frame_clock.reset();
        self.quiet_since = None;
        self.idle_blend = 0.0;
        self.state = DriverState::Ready;
        tracing::info!(
            bones = self.bones.len(),
            morphs = self.morphs.len(),
            "driver attached"
        );
        Ok(())
    }

    /// One frame opportunity. Returns whether the frame executed.
    #[allow(clippy::too_many_arguments)]
    pub fn frame(
        &mut self,
        now: MediaTime,
        activity: SpeechActivity,
        blink: &BlinkScheduler,
        scene: &mut Scene,
        mixer: Option<&mut ClipMixer>,
        camera: &Camera,
        renderer: &mut dyn RenderTarget,
    ) -> bool {
        if self.state == DriverState::TornDown {
            return false;
        }
        if !self.limiter.ready(now) {
            self.stats.skipped_frames += 1;
            return false;
        }
        self.stats.executed_frames += 1;

        let dt = self.frame_clock.delta(now);
        let epoch = *self.epoch.get_or_insert(now);
        let value = activity.value;

        self.drive_bones(value, scene);
        self.drive_morphs(value, blink, scene);

        if let Some(mixer) = mixer {
            self.stats.clip_writes += mixer.advance(dt, scene) as u64;
        }

        self.update_idle(now, value);
        self.sway((now - epoch).as_secs_f32(), scene);

        if let Err(e) = renderer.render(scene, camera) {
            self.stats.render_errors += 1;
            tracing::warn!(error = %e, "render failed, frame dropped");
        }
        true
    }

    fn drive_bones(&mut self, value: f32, scene: &mut Scene) {
        let target = value * self.config.rotation_scale;
        for bone in &mut self.bones {
            bone.current = smooth(bone.current, target, self.config.smoothing);
            let Some(node) = scene.get_mut(bone.node) else {
                continue;
            };
            node.transform.rotation =
                node.rest.rotation * Quat::from_axis_angle(bone.axis, bone.current * bone.scale);
            self.stats.bone_writes += 1;
        }
    }

    fn drive_morphs(&mut self, value: f32, blink: &BlinkScheduler, scene: &mut Scene) {
        for morph in &mut self.morphs {
            if blink.owns(morph.node, morph.channel) {
                continue;
            }
            morph.current = smooth(morph.current, value * morph.multiplier, self.config.smoothing);
            if scene.set_morph_weight(morph.node, morph.channel, morph.current) {
                self.stats.morph_writes += 1;
            }
        }
    }

    fn update_idle(&mut self, now: MediaTime, value: f32) {
        if value < self.config.idle_threshold {
            let since = *self.quiet_since.get_or_insert(now);
            let target = if now - since >= self.config.idle_delay {
                1.0
            } else {
                0.0
            };
            self.idle_blend = smooth(self.idle_blend, target, self.config.idle_smoothing);
        } else {
            self.quiet_since = None;
            self.idle_blend = smooth(self.idle_blend, 0.0, self.config.idle_smoothing);
        }
    }

    /// Idle head motion on the model root. A model without targets is left alone.
    fn sway(&mut self, t: f32, scene: &mut Scene) {
        if self.bones.is_empty() && self.morphs.is_empty() {
            return;
        }
        let Some(root) = self.model_root.and_then(|id| scene.get_mut(id)) else {
            return;
        };
        let yaw = (0.5 * t).sin() * 0.05 * self.idle_blend;
        let pitch = (0.65 * t).sin() * 0.03 * self.idle_blend;
        root.transform.rotation = root.rest.rotation
            * Quat::from_axis_angle(Axis::Y, yaw)
            * Quat::from_axis_angle(Axis::X, pitch);
        self.stats.sway_writes += 1;
    }

    /// Stop driving and remove the face light. Safe to call repeatedly.
    pub fn teardown(&mut self, scene: &mut Scene) {
        if self.state == DriverState::TornDown {
            return;
        }
        if let Some(light) = self.front_light.take() {
            let _ = scene.detach(light);
        }
        self.bones.clear();
        self.morphs.clear();
        self.model_root = None;
        self.state = DriverState::TornDown;
        tracing::info!(
            frames = self.stats.executed_frames,
            skipped = self.stats.skipped_frames,
            "driver torn down"
        );
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Smoothed angle of the first driven bone
    pub fn jaw_angle(&self) -> Option<f32> {
        self.bones.first().map(|b| b.current)
    }

    pub fn idle_blend(&self) -> f32 {
        self.idle_blend
    }

    pub fn target_count(&self) -> usize {
        self.bones.len() + self.morphs.len()
    }

    pub fn front_light(&self) -> Option<NodeId> {
        self.front_light
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlinkConfig, HeadlessRenderer};
    use mimic_scene::{MeshData, Node, NodeKind, SkeletonIntrospector, Viewport};
    use proptest::prelude::*;

    const STEP: Duration = Duration::from_millis(20);

    struct Rig {
        scene: Scene,
        root: NodeId,
        jaw: NodeId,
        head: NodeId,
        targets: Vec<AnimationTarget>,
    }

    fn rig() -> Rig {
        let mut scene = Scene::new();
        let root = scene.insert(scene.root(), Node::group("avatar")).unwrap();
        let jaw = scene.insert(root, Node::new("Jaw", NodeKind::Bone)).unwrap();
        let head = scene
            .insert(
                root,
                Node::new("Head", NodeKind::Mesh(MeshData::with_morphs(["mouthOpen", "lipsPart"]))),
            )
            .unwrap();
        let targets = SkeletonIntrospector::default().resolve(&scene, root);
        Rig {
            scene,
            root,
            jaw,
            head,
            targets,
        }
    }

    struct Harness {
        driver: AnimationDriver,
        blink: BlinkScheduler,
        renderer: HeadlessRenderer,
        camera: Camera,
        now: MediaTime,
    }

    impl Harness {
        fn new(config: DriverConfig) -> Self {
            Self {
                driver: AnimationDriver::new(config),
                blink: BlinkScheduler::new(BlinkConfig::default()),
                renderer: HeadlessRenderer::new(),
                camera: Camera::for_viewport(Viewport::default()),
                now: MediaTime::ZERO,
            }
        }

        fn frame(&mut self, scene: &mut Scene, value: f32) -> bool {
            self.now = self.now + STEP;
            self.driver.frame(
                self.now,
                SpeechActivity::new(value, value > 0.0),
                &self.blink,
                scene,
                None,
                &self.camera,
                &mut self.renderer,
            )
        }
    }

    #[test]
    fn test_attach_adds_light_and_targets() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        let before = rig.scene.len();

        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();
        assert_eq!(h.driver.state(), DriverState::Ready);
        assert_eq!(h.driver.target_count(), 3);
        assert_eq!(rig.scene.len(), before + 1);

        // Re-attaching keeps a single light
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();
        assert_eq!(rig.scene.len(), before + 1);
    }

    #[test]
    fn test_jaw_follows_activity() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

        for _ in 0..60 {
            h.frame(&mut rig.scene, 1.0);
        }
        let angle = h.driver.jaw_angle().unwrap();
        assert!((angle - 0.35).abs() < 1e-3);

        let jaw = rig.scene.get(rig.jaw).unwrap();
        assert!((jaw.rest.rotation.angle_to(&jaw.transform.rotation) - angle).abs() < 1e-3);

        let mouth = &rig.scene.get(rig.head).unwrap().mesh().unwrap().morph_channels[0];
        assert!(mouth.weight > 0.99);
    }

    #[test]
    fn test_activity_sequence_closes_distance_each_step() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

        for value in [0.0f32, 0.5, 1.0, 0.5, 0.0] {
            let target = value * 0.35;
            let before = h.driver.jaw_angle().unwrap();
            h.frame(&mut rig.scene, value);
            let after = h.driver.jaw_angle().unwrap();
            if before != target {
                assert!((after - target).abs() < (before - target).abs());
            }
        }
    }

    #[test]
    fn test_morph_multiplier() {
        let mut rig = rig();
        let config = DriverConfig {
            morph_weights: vec![("lips".into(), 0.5)],
            ..Default::default()
        };
        let mut h = Harness::new(config);
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

        for _ in 0..80 {
            h.frame(&mut rig.scene, 1.0);
        }
        let channels = &rig.scene.get(rig.head).unwrap().mesh().unwrap().morph_channels;
        assert!(channels[0].weight > 0.99);
        assert!((channels[1].weight - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_no_targets_no_pose_writes() {
        let mut scene = Scene::new();
        let root = scene.insert(scene.root(), Node::group("statue")).unwrap();
        let arm = scene.insert(root, Node::new("Arm", NodeKind::Bone)).unwrap();
        let targets = SkeletonIntrospector::default().resolve(&scene, root);
        assert!(targets.is_empty());

        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut scene, root, &targets).unwrap();
        let pose_before = (scene.get(root).unwrap().transform, scene.get(arm).unwrap().transform);

        for i in 0..200 {
            h.frame(&mut scene, if i % 2 == 0 { 1.0 } else { 0.0 });
        }
        let pose_after = (scene.get(root).unwrap().transform, scene.get(arm).unwrap().transform);

        assert_eq!(h.driver.stats().pose_writes(), 0);
        assert_eq!(h.driver.stats().sway_writes, 0);
        assert_eq!(pose_before, pose_after);
        assert_eq!(h.renderer.probe().frames(), 200);
    }

    #[test]
    fn test_rate_cap_skips_frames() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

        let camera = h.camera.clone();
        let mut now = MediaTime::ZERO;
        for _ in 0..120 {
            h.driver.frame(
                now,
                SpeechActivity::SILENT,
                &h.blink,
                &mut rig.scene,
                None,
                &camera,
                &mut h.renderer,
            );
            now = now + Duration::from_micros(8_333);
        }
        assert_eq!(h.driver.stats().executed_frames, 60);
        assert_eq!(h.driver.stats().skipped_frames, 60);
        assert_eq!(h.renderer.probe().frames(), 60);
    }

    #[test]
    fn test_idle_sway_fades_in_when_quiet() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

        // 1 s of quiet: still before the idle delay
        for _ in 0..50 {
            h.frame(&mut rig.scene, 0.0);
        }
        assert_eq!(h.driver.idle_blend(), 0.0);

        for _ in 0..150 {
            h.frame(&mut rig.scene, 0.0);
        }
        assert!(h.driver.idle_blend() > 0.9);

        // Speaking pulls it back toward zero
        let quiet_blend = h.driver.idle_blend();
        h.frame(&mut rig.scene, 0.8);
        assert!(h.driver.idle_blend() < quiet_blend);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut rig = rig();
        let mut h = Harness::new(DriverConfig::default());
        h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();
        let light = h.driver.front_light().unwrap();

        h.driver.teardown(&mut rig.scene);
        h.driver.teardown(&mut rig.scene);

        assert_eq!(h.driver.state(), DriverState::TornDown);
        assert!(!rig.scene.contains(light));
        assert!(!h.frame(&mut rig.scene, 1.0));
        assert!(matches!(
            h.driver.attach(&mut rig.scene, rig.root, &rig.targets),
            Err(MimicError::SessionTornDown)
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(DriverConfig::default().validate().is_ok());
        for smoothing in [0.0, -0.1, 1.5, f32::NAN] {
            let config = DriverConfig {
                smoothing,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "smoothing {smoothing}");
        }
        let weights = DriverConfig {
            morph_weights: vec![("mouth".into(), -1.0)],
            ..Default::default()
        };
        assert!(weights.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_smoothing_never_overshoots(
            activity in 0.0f32..=1.0,
            start in 0.0f32..=0.35,
            factor in 0.01f32..=1.0,
        ) {
            let target = activity * 0.35;
            let mut current = start;
            for _ in 0..100 {
                let next = smooth(current, target, factor);
                prop_assert!((next - target).abs() <= (current - target).abs() + 1e-6);
                if current <= target {
                    prop_assert!(next <= target + 1e-6 && next >= current - 1e-6);
                } else {
                    prop_assert!(next >= target - 1e-6 && next <= current + 1e-6);
                }
                current = next;
            }
        }

        #[test]
        fn prop_driven_jaw_converges(activity in 0.0f32..=1.0) {
            let mut rig = rig();
            let mut h = Harness::new(DriverConfig::default());
            h.driver.attach(&mut rig.scene, rig.root, &rig.targets).unwrap();

            let target = activity * 0.35;
            let mut previous = 0.0f32;
            for _ in 0..30 {
                h.frame(&mut rig.scene, activity);
                let angle = h.driver.jaw_angle().unwrap();
                prop_assert!(angle >= previous - 1e-6);
                prop_assert!(angle <= target + 1e-6);
                previous = angle;
            }
        }
    }
}
