//! Default light rig

use mimic_core::{MimicResult, NodeId};

use crate::{Color, Light, LightKind, Node, NodeKind, Scene, Transform, Vec3};

fn light(name: &str, kind: LightKind, intensity: f32, cast_shadow: bool, position: Vec3) -> Node {
    Node::new(
        name,
        NodeKind::Light(Light {
            kind,
            color: Color::WHITE,
            intensity,
            cast_shadow,
        }),
    )
    .with_transform(Transform::from_translation(position))
}

/// Add ambient, key and fill lights under the scene root
pub fn add_default_lighting(scene: &mut Scene) -> MimicResult<Vec<NodeId>> {
    let root = scene.root();
    let rig = [
        light("ambient", LightKind::Ambient, 0.8, false, Vec3::ZERO),
        light("key", LightKind::Directional, 1.0, true, Vec3::new(1.0, 1.0, 1.0)),
        light("front", LightKind::Directional, 1.2, false, Vec3::new(0.0, 0.0, 2.0)),
        light("fill", LightKind::Directional, 0.5, false, Vec3::new(-1.0, 0.5, 1.0)),
    ];
    rig.into_iter().map(|node| scene.insert(root, node)).collect()
}

/// Extra face light owned by the animation driver
pub fn face_light() -> Node {
    light(
        "driver-front",
        LightKind::Directional,
        1.0,
        false,
        Vec3::new(0.0, 0.0, 2.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rig() {
        let mut scene = Scene::new();
        let lights = add_default_lighting(&mut scene).unwrap();

        assert_eq!(lights.len(), 4);
        let shadow_casters = lights
            .iter()
            .filter(|id| {
                matches!(
                    scene.get(**id).map(|n| &n.kind),
                    Some(NodeKind::Light(Light { cast_shadow: true, .. }))
                )
            })
            .count();
        assert_eq!(shadow_casters, 1);
    }
}
