//! Scene graph arena
//!
//! Nodes live in a slot vector addressed by `NodeId`. Freeing a node bumps its
//! slot generation, so ids held past a detach resolve to `None` instead of to
//! whatever node reuses the slot.

use std::collections::HashMap;

use mimic_core::{MimicError, MimicResult, NodeId};

use crate::{Color, Material, Transform};

/// Named morph target weight on a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MorphChannel {
    pub name: String,
    /// Blend weight [0.0 - 1.0]
    pub weight: f32,
}

impl MorphChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 0.0,
        }
    }
}

/// Mesh payload
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub morph_channels: Vec<MorphChannel>,
    /// Material the asset declared for this mesh, by name
    pub declared_material: Option<String>,
    /// Material currently applied
    pub material: Option<Material>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshData {
    pub fn with_morphs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            morph_channels: names.into_iter().map(MorphChannel::new).collect(),
            ..Default::default()
        }
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.morph_channels.iter().position(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Ambient,
    Directional,
}

/// Light payload
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
}

/// What a node is
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Bone,
    Mesh(MeshData),
    Light(Light),
}

/// A scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Current local transform
    pub transform: Transform,
    /// Transform as loaded; procedural motion is applied on top of this
    pub rest: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            rest: Transform::IDENTITY,
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    /// Set both the current and the rest transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self.rest = transform;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Result of copying a subtree into a scene
#[derive(Debug, Clone)]
pub struct Graft {
    /// Root of the copy
    pub root: NodeId,
    remap: HashMap<NodeId, NodeId>,
}

impl Graft {
    /// Where a source node ended up
    pub fn map(&self, source: NodeId) -> Option<NodeId> {
        self.remap.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.remap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remap.is_empty()
    }
}

/// Scene graph
#[derive(Debug, Clone)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Empty scene with a root group named "scene"
    pub fn new() -> Self {
        Self::with_root(Node::group("scene"))
    }

    /// Empty scene with a custom root node
    pub fn with_root(root: Node) -> Self {
        let mut scene = Scene {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::new(0, 0),
            live: 0,
        };
        scene.root = scene.alloc(root);
        scene
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    /// Add `node` as the last child of `parent`
    pub fn insert(&mut self, parent: NodeId, node: Node) -> MimicResult<NodeId> {
        if !self.contains(parent) {
            return Err(MimicError::StaleNode(parent));
        }
        let id = self.alloc(node);
        self.link(parent, id);
        Ok(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    /// Children of a node (empty for stale ids)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[][..], |node| node.children.as_slice())
    }

    /// Remove a node and its whole subtree. Returns the number of nodes freed.
    ///
    /// The root cannot be detached.
    pub fn detach(&mut self, id: NodeId) -> MimicResult<usize> {
        if !self.contains(id) {
            return Err(MimicError::StaleNode(id));
        }
        if id == self.root {
            tracing::debug!("refusing to detach the scene root");
            return Ok(0);
        }

        if let Some(parent) = self.parent(id) {
            if let Some(parent_node) = self.get_mut(parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }

        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.free_slot(current) {
                stack.extend(node.children);
                freed += 1;
            }
        }
        Ok(freed)
    }

    /// Copy the subtree of `source` rooted at `source_root` under `parent`
    pub fn graft(&mut self, parent: NodeId, source: &Scene, source_root: NodeId) -> MimicResult<Graft> {
        if !self.contains(parent) {
            return Err(MimicError::StaleNode(parent));
        }
        if !source.contains(source_root) {
            return Err(MimicError::StaleNode(source_root));
        }

        let mut remap = HashMap::new();
        let mut stack = vec![(source_root, parent)];
        let mut root = None;
        while let Some((src, dst_parent)) = stack.pop() {
            let Some(node) = source.get(src) else {
                continue;
            };
            let mut copy = node.clone();
            copy.parent = None;
            copy.children = Vec::new();

            let id = self.alloc(copy);
            self.link(dst_parent, id);
            remap.insert(src, id);
            root.get_or_insert(id);

            // Reverse so children keep their order once popped
            for child in node.children.iter().rev() {
                stack.push((*child, id));
            }
        }

        let root = root.ok_or(MimicError::StaleNode(source_root))?;
        Ok(Graft { root, remap })
    }

    /// Subtree ids in depth-first pre-order
    pub fn depth_first(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.visit(root, |id, _| order.push(id));
        order
    }

    /// Visit each node of a subtree once, depth-first pre-order
    pub fn visit<F>(&self, root: NodeId, mut f: F)
    where
        F: FnMut(NodeId, &Node),
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                f(id, node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// First node in the subtree with exactly this name
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.depth_first(root)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|node| node.name == name))
    }

    /// All live nodes
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeId::new(index as u32, slot.generation), node))
        })
    }

    /// Write a morph channel weight. Returns false for stale ids or unknown channels.
    pub fn set_morph_weight(&mut self, id: NodeId, channel: usize, weight: f32) -> bool {
        match self
            .get_mut(id)
            .and_then(|node| node.mesh_mut())
            .and_then(|mesh| mesh.morph_channels.get_mut(channel))
        {
            Some(slot) => {
                slot.weight = weight.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId::new(index, 0)
            }
        }
    }

    fn free_slot(&mut self, id: NodeId) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.live -= 1;
        Some(node)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }
}
