//! Scene graph owned by a loaded model.
//!
//! A [`SceneTree`] is an arena of [`SceneNode`]s addressed by [`NodeId`].
//! Nodes reference their children by id, so the whole hierarchy is owned by
//! the tree and can be moved around as one value. Geometry and material
//! resources are shared through `Rc` because several nodes of one model may
//! use the same mesh or material; the backend sees each of them once.
//!
//! All traversals go through [`SceneTree::walk`], an iterative depth-first
//! walk with a visited guard. Malformed arenas (a node linked under two
//! parents, cycles, dangling ids) are tolerated: every reachable node is
//! yielded exactly once and anomalies are logged.

use std::{
    collections::HashSet,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{Matrix4, Point3, SquareMatrix};
use log::warn;

use crate::data_structures::{bounds::BoundingBox, instance::Instance};

pub type NodeId = usize;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

/// Vertex data of one drawable primitive.
///
/// The local bounding box is computed once on construction.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    bounds: BoundingBox,
}

impl Geometry {
    pub fn new(
        name: impl Into<String>,
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        indices: Vec<u32>,
    ) -> Self {
        let bounds = BoundingBox::from_points(positions.iter().map(|&p| Point3::from(p)));
        Self {
            id: GeometryId(next_resource_id()),
            name: name.into(),
            positions,
            normals,
            indices,
            bounds,
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }
}

/// Surface description of a primitive. Textures are referenced by URI only;
/// decoding and uploading them is up to the backend.
#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    pub base_colour: [f32; 4],
    pub texture: Option<String>,
}

impl Material {
    pub fn new(name: impl Into<String>, base_colour: [f32; 4]) -> Self {
        Self {
            id: MaterialId(next_resource_id()),
            name: name.into(),
            base_colour,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }
}

/// Geometry plus the materials applied to it. More than one material means
/// the geometry is drawn in groups, one per material.
#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub geometry: Rc<Geometry>,
    pub materials: Vec<Rc<Material>>,
}

#[derive(Debug, Default)]
pub struct SceneNode {
    pub name: Option<String>,
    pub local: Instance,
    pub mesh: Option<MeshAttachment>,
    pub children: Vec<NodeId>,
}

impl SceneNode {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, geometry: Rc<Geometry>, materials: Vec<Rc<Material>>) -> Self {
        self.mesh = Some(MeshAttachment {
            geometry,
            materials,
        });
        self
    }

    pub fn with_transform(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }
}

#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node that is not linked anywhere yet.
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_root(&mut self, node: SceneNode) -> NodeId {
        let id = self.add_node(node);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> NodeId {
        let id = self.add_node(node);
        if !self.link(parent, id) {
            warn!("Parent node {} does not exist, adding node {} as a root.", parent, id);
            self.roots.push(id);
        }
        id
    }

    /// Links an existing node below `parent`. Returns `false` if `parent` is unknown.
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.nodes.get_mut(parent) {
            Some(node) => {
                node.children.push(child);
                true
            }
            None => false,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: self
                .roots
                .iter()
                .rev()
                .map(|&root| (root, Matrix4::identity()))
                .collect(),
            visited: HashSet::with_capacity(self.nodes.len()),
        }
    }

    /// Bounds of all reachable geometry in model space.
    pub fn bounding_box(&self) -> BoundingBox {
        self.walk()
            .filter_map(|(_, node, world)| {
                node.mesh
                    .as_ref()
                    .map(|mesh| mesh.geometry.bounds().transformed(&world))
            })
            .fold(BoundingBox::empty(), |acc, bounds| acc.union(&bounds))
    }
}

/// Depth-first, pre-order walk over the reachable nodes of a [`SceneTree`].
///
/// Yields each node together with its world matrix (the product of all
/// ancestor local transforms and its own).
pub struct Walk<'a> {
    tree: &'a SceneTree,
    stack: Vec<(NodeId, Matrix4<f32>)>,
    visited: HashSet<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (NodeId, &'a SceneNode, Matrix4<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, parent_world)) = self.stack.pop() {
            if !self.visited.insert(id) {
                warn!("Scene node {} is reachable more than once, visiting it only once.", id);
                continue;
            }
            let Some(node) = self.tree.nodes.get(id) else {
                warn!("Scene node {} is referenced but does not exist.", id);
                continue;
            };
            let world = parent_world * node.local.to_matrix();
            self.stack
                .extend(node.children.iter().rev().map(|&child| (child, world)));
            return Some((id, node, world));
        }
        None
    }
}
