//! Loaded assets and their scene attachment

use mimic_core::{AssetId, MimicResult, NodeId};
use mimic_scene::{
    AnimationClip, AnimationTarget, BlinkTarget, ClipMixer, Introspection, MaterialPolicy,
    MaterialSet, NodeKind, Scene, SkeletonIntrospector, Transform, Vec3,
};

use crate::{Candidate, LoadReport, ModelData};

/// Attachment options
#[derive(Debug, Clone)]
pub struct AttachOptions {
    pub policy: MaterialPolicy,
    /// Transform given to the model root
    pub placement: Transform,
    pub introspector: SkeletonIntrospector,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            policy: MaterialPolicy::default(),
            placement: Transform::from_translation(Vec3::new(0.0, -1.0, 0.0))
                .with_scale(Vec3::splat(0.5)),
            introspector: SkeletonIntrospector::default(),
        }
    }
}

/// A model that loaded successfully but is not in the scene yet
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub id: AssetId,
    /// The candidate that succeeded
    pub candidate: Candidate,
    pub model: ModelData,
    pub report: LoadReport,
}

impl LoadedAsset {
    pub(crate) fn new(id: AssetId, candidate: Candidate, model: ModelData, report: LoadReport) -> Self {
        Self {
            id,
            candidate,
            model,
            report,
        }
    }

    /// Attach under the scene root with default placement
    pub fn attach(
        self,
        scene: &mut Scene,
        materials: &MaterialSet,
        policy: MaterialPolicy,
    ) -> MimicResult<AssetHandle> {
        let options = AttachOptions {
            policy,
            ..Default::default()
        };
        self.attach_with(scene, materials, &options)
    }

    /// Graft the model into `scene`, dress its meshes, start its clips and
    /// resolve animation targets
    pub fn attach_with(
        self,
        scene: &mut Scene,
        materials: &MaterialSet,
        options: &AttachOptions,
    ) -> MimicResult<AssetHandle> {
        let model = self.model;
        let graft = scene.graft(scene.root(), &model.scene, model.scene.root())?;
        let root = graft.root;

        if let Some(node) = scene.get_mut(root) {
            node.transform = options.placement;
            node.rest = options.placement;
        }

        let meshes: Vec<NodeId> = scene
            .depth_first(root)
            .into_iter()
            .filter(|id| matches!(scene.get(*id).map(|n| &n.kind), Some(NodeKind::Mesh(_))))
            .collect();
        for id in &meshes {
            let Some(node) = scene.get_mut(*id) else {
                continue;
            };
            let fallback = materials.for_mesh(&node.name).clone();
            let Some(mesh) = node.mesh_mut() else {
                continue;
            };
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            if options.policy == MaterialPolicy::Override || mesh.material.is_none() {
                mesh.material = Some(fallback);
            }
        }

        let clips: Vec<AnimationClip> = model
            .clips
            .iter()
            .map(|clip| clip.remap(|id| graft.map(id)))
            .collect();

        let introspection = options.introspector.introspect(scene, root);

        let mixer = if clips.is_empty() {
            None
        } else {
            let mut mixer = ClipMixer::new(clips);
            mixer.set_mask(introspection.clip_mask());
            mixer.play_all();
            Some(mixer)
        };

        tracing::info!(
            asset = %self.id,
            path = %self.candidate.path,
            nodes = graft.len(),
            meshes = meshes.len(),
            clips = mixer.as_ref().map_or(0, ClipMixer::clip_count),
            targets = introspection.targets.len(),
            "asset attached"
        );

        Ok(AssetHandle {
            id: self.id,
            candidate: self.candidate,
            root,
            mixer,
            introspection,
            released: false,
        })
    }
}

/// An asset attached to the scene. Exactly one is current per session.
#[derive(Debug)]
pub struct AssetHandle {
    id: AssetId,
    candidate: Candidate,
    root: NodeId,
    mixer: Option<ClipMixer>,
    introspection: Introspection,
    released: bool,
}

impl AssetHandle {
    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn targets(&self) -> &[AnimationTarget] {
        &self.introspection.targets
    }

    pub fn blink_targets(&self) -> &[BlinkTarget] {
        &self.introspection.blink_targets
    }

    pub fn introspection(&self) -> &Introspection {
        &self.introspection
    }

    pub fn mixer_mut(&mut self) -> Option<&mut ClipMixer> {
        self.mixer.as_mut()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Detach the subtree and stop the mixer. Returns the nodes removed;
    /// zero on every call after the first.
    pub fn release(&mut self, scene: &mut Scene) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        if let Some(mixer) = &mut self.mixer {
            mixer.stop();
        }
        let removed = scene.detach(self.root).unwrap_or(0);
        tracing::info!(asset = %self.id, removed, "asset released");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetLoader, LoaderConfig, MemorySource};
    use mimic_scene::Node;

    const RIG: &str = r#"{
        "asset": { "version": "2.0" },
        "nodes": [
            { "name": "Root", "children": [1, 2, 3] },
            { "name": "Jaw" },
            { "name": "HeadMesh", "mesh": 0 },
            { "name": "Shirt", "mesh": 1 }
        ],
        "skins": [{ "joints": [1] }],
        "meshes": [
            { "primitives": [{ "targets": [{}] }], "extras": { "targetNames": ["mouthOpen"] } },
            { "primitives": [{ "material": 0 }] }
        ],
        "materials": [{ "name": "Denim" }]
    }"#;

    async fn loaded() -> LoadedAsset {
        let source = MemorySource::new();
        source.insert("rig.gltf", RIG);
        AssetLoader::new(source, LoaderConfig::single_pass())
            .load(&[crate::Candidate::new("rig.gltf")])
            .await
            .unwrap()
    }

    fn material_of(scene: &Scene, root: NodeId, name: &str) -> String {
        let id = scene.find_by_name(root, name).unwrap();
        scene.get(id).unwrap().mesh().unwrap().material.as_ref().unwrap().name.clone()
    }

    #[tokio::test]
    async fn test_attach_keeps_declared_materials() {
        let mut scene = Scene::new();
        let handle = loaded()
            .await
            .attach(&mut scene, &MaterialSet::default(), MaterialPolicy::KeepDeclared)
            .unwrap();

        assert_eq!(material_of(&scene, handle.root(), "HeadMesh"), "head");
        assert_eq!(material_of(&scene, handle.root(), "Shirt"), "Denim");
        assert_eq!(handle.targets().len(), 2);

        let shirt = scene.find_by_name(handle.root(), "Shirt").unwrap();
        let mesh = scene.get(shirt).unwrap().mesh().unwrap();
        assert!(mesh.cast_shadow && mesh.receive_shadow);

        let placed = scene.get(handle.root()).unwrap().transform;
        assert_eq!(placed.scale, Vec3::splat(0.5));
    }

    #[tokio::test]
    async fn test_attach_override_policy() {
        let mut scene = Scene::new();
        let handle = loaded()
            .await
            .attach(&mut scene, &MaterialSet::default(), MaterialPolicy::Override)
            .unwrap();
        assert_eq!(material_of(&scene, handle.root(), "Shirt"), "body");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let mut scene = Scene::new();
        scene.insert(scene.root(), Node::group("light")).unwrap();
        let mut handle = loaded()
            .await
            .attach(&mut scene, &MaterialSet::default(), MaterialPolicy::default())
            .unwrap();
        let jaw = scene.find_by_name(handle.root(), "Jaw").unwrap();

        assert_eq!(handle.release(&mut scene), 5);
        assert_eq!(handle.release(&mut scene), 0);
        assert!(handle.is_released());
        assert!(scene.get(jaw).is_none());
        assert_eq!(scene.len(), 2);
    }
}
