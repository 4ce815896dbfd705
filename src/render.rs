//! Frame composition.
//!
//! Every tick the viewer flattens the installed model into a [`RenderFrame`]:
//! one [`DrawCall`] per mesh-carrying node with its world matrix already
//! multiplied by the model placement, plus the camera uniform and the clear
//! colour. Backends only ever see borrowed data, so nothing they keep can
//! extend the lifetime of a disposed model.

use std::rc::Rc;

use crate::{
    camera::{CameraRig, CameraUniform},
    data_structures::{
        instance::InstanceRaw,
        scene_graph::{Geometry, Material, NodeId},
    },
    lifecycle::{ModelHandle, ModelId},
};

/// One geometry drawn with its materials at one world transform.
pub struct DrawCall<'a> {
    pub model: ModelId,
    pub node: NodeId,
    pub geometry: &'a Geometry,
    pub materials: &'a [Rc<Material>],
    pub instance: InstanceRaw,
}

pub struct RenderFrame<'a> {
    pub draws: Vec<DrawCall<'a>>,
    pub camera: CameraUniform,
    pub clear_colour: wgpu::Color,
}

impl<'a> RenderFrame<'a> {
    /// Builds the frame for `model` (or an empty scene) seen through `rig`.
    pub fn compose(model: Option<&'a ModelHandle>, rig: &CameraRig, clear_colour: wgpu::Color) -> Self {
        let draws = match model {
            Some(model) => {
                let root = model.root_matrix();
                model
                    .scene()
                    .walk()
                    .filter_map(|(node, scene_node, world)| {
                        scene_node.mesh.as_ref().map(|mesh| DrawCall {
                            model: model.id(),
                            node,
                            geometry: mesh.geometry.as_ref(),
                            materials: &mesh.materials,
                            instance: InstanceRaw::from_matrix(&(root * world)),
                        })
                    })
                    .collect()
            }
            None => Vec::new(),
        };
        Self {
            draws,
            camera: *rig.uniform(),
            clear_colour,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }
}
