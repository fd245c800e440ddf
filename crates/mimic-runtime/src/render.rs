//! Render targets
//!
//! The session renders through `RenderTarget` exactly once per executed
//! frame. `HeadlessRenderer` draws nothing; it records what it was asked to
//! draw so tests and the terminal demo can observe the animation.

use std::sync::Arc;

use parking_lot::Mutex;

use mimic_core::{MimicError, MimicResult};
use mimic_scene::{Camera, NodeKind, Scene, Viewport};

/// Something that can draw the scene
pub trait RenderTarget: Send {
    /// Prepare the surface. Failure aborts session start.
    fn init(&mut self, viewport: Viewport) -> MimicResult<()>;

    fn render(&mut self, scene: &Scene, camera: &Camera) -> MimicResult<()>;

    fn resize(&mut self, viewport: Viewport);
}

/// What the headless renderer has seen so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderLog {
    pub frames: u64,
    pub viewport: Option<Viewport>,
    pub camera_aspect: f32,
    /// Angle of the first jaw-named bone away from its rest pose
    pub last_jaw: Option<f32>,
    /// Largest mouth-ish morph weight in the last frame
    pub last_mouth_weight: Option<f32>,
    pub visible_nodes: usize,
}

/// Renderer without a surface
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    log: Arc<Mutex<RenderLog>>,
    fail_init: Option<String>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose `init` fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_init: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Shared view of the log, usable after the renderer moved into a session
    pub fn probe(&self) -> RenderProbe {
        RenderProbe {
            log: Arc::clone(&self.log),
        }
    }
}

impl RenderTarget for HeadlessRenderer {
    fn init(&mut self, viewport: Viewport) -> MimicResult<()> {
        if let Some(reason) = &self.fail_init {
            return Err(MimicError::SceneInit(reason.clone()));
        }
        self.log.lock().viewport = Some(viewport);
        Ok(())
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> MimicResult<()> {
        let mut jaw = None;
        let mut mouth: Option<f32> = None;
        let mut visible = 0;

        scene.visit(scene.root(), |_, node| {
            if node.visible {
                visible += 1;
            }
            let name = node.name.to_ascii_lowercase();
            match &node.kind {
                NodeKind::Bone if jaw.is_none() && name.contains("jaw") => {
                    jaw = Some(node.rest.rotation.angle_to(&node.transform.rotation));
                }
                NodeKind::Mesh(mesh) => {
                    for channel in &mesh.morph_channels {
                        let lower = channel.name.to_ascii_lowercase();
                        if lower.contains("mouth") || lower.contains("jaw") || lower.contains("lip") {
                            mouth = Some(mouth.map_or(channel.weight, |m| m.max(channel.weight)));
                        }
                    }
                }
                _ => {}
            }
        });

        let mut log = self.log.lock();
        log.frames += 1;
        log.camera_aspect = camera.aspect;
        log.last_jaw = jaw;
        log.last_mouth_weight = mouth;
        log.visible_nodes = visible;
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        self.log.lock().viewport = Some(viewport);
    }
}

/// Read side of a `HeadlessRenderer`
#[derive(Debug, Clone)]
pub struct RenderProbe {
    log: Arc<Mutex<RenderLog>>,
}

impl RenderProbe {
    pub fn snapshot(&self) -> RenderLog {
        self.log.lock().clone()
    }

    pub fn frames(&self) -> u64 {
        self.log.lock().frames
    }

    pub fn last_jaw(&self) -> Option<f32> {
        self.log.lock().last_jaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_scene::{Axis, MeshData, Node, Quat};

    #[test]
    fn test_records_jaw_and_mouth() {
        let mut scene = Scene::new();
        let jaw = scene.insert(scene.root(), Node::new("Jaw", NodeKind::Bone)).unwrap();
        let head = scene
            .insert(
                scene.root(),
                Node::new("Head", NodeKind::Mesh(MeshData::with_morphs(["mouthOpen", "smile"]))),
            )
            .unwrap();
        scene.get_mut(jaw).unwrap().transform.rotation = Quat::from_axis_angle(Axis::X, 0.2);
        scene.set_morph_weight(head, 0, 0.4);
        scene.set_morph_weight(head, 1, 0.9);

        let mut renderer = HeadlessRenderer::new();
        let probe = renderer.probe();
        renderer.init(Viewport::default()).unwrap();
        renderer
            .render(&scene, &Camera::for_viewport(Viewport::default()))
            .unwrap();

        let log = probe.snapshot();
        assert_eq!(log.frames, 1);
        assert!((log.last_jaw.unwrap() - 0.2).abs() < 1e-4);
        assert_eq!(log.last_mouth_weight, Some(0.4));
        assert_eq!(log.visible_nodes, 3);
    }

    #[test]
    fn test_failing_init() {
        let mut renderer = HeadlessRenderer::failing("no GPU");
        let err = renderer.init(Viewport::default()).unwrap_err();
        assert!(matches!(err, MimicError::SceneInit(_)));
    }
}
