//! glTF 2.0 (`.gltf` / `.glb`) import into a [`SceneTree`].

use std::{collections::HashMap, rc::Rc};

use anyhow::Context;
use cgmath::{Quaternion, Vector3};
use gltf::animation::util::ReadOutputs;

use crate::{
    data_structures::{
        animation::{AnimationClip, Channel, Interpolation, Keyframes},
        instance::Instance,
        scene_graph::{Geometry, Material, MeshAttachment, NodeId, SceneNode, SceneTree},
    },
    resources::{
        LoadedAsset,
        fetch::{load_binary, resolve_relative},
    },
};

pub async fn parse_gltf(bytes: &[u8], location: &str) -> anyhow::Result<LoadedAsset> {
    let gltf::Gltf { document, mut blob } = gltf::Gltf::from_slice(bytes)
        .with_context(|| format!("{} is not a valid glTF asset", location))?;

    // Load buffers
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .take()
                .with_context(|| format!("{} references a missing GLB binary chunk", location))?,
            gltf::buffer::Source::Uri(uri) => load_binary(&resolve_relative(location, uri)).await?,
        };
        if data.len() < buffer.length() {
            anyhow::bail!(
                "buffer {} of {} holds {} bytes but declares {}",
                buffer.index(),
                location,
                data.len(),
                buffer.length()
            );
        }
        buffers.push(data);
    }

    let mut converter = Converter {
        buffers: &buffers,
        location,
        scene: SceneTree::new(),
        materials: HashMap::new(),
        geometries: HashMap::new(),
        node_ids: HashMap::new(),
    };

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                converter.convert_node(node, None);
            }
        }
        None => log::warn!("{} contains no scene, the model will be empty.", location),
    }

    let clips = read_animations(&document, &buffers, &converter.node_ids, location);

    Ok(LoadedAsset {
        scene: converter.scene,
        clips,
    })
}

struct Converter<'a> {
    buffers: &'a [Vec<u8>],
    location: &'a str,
    scene: SceneTree,
    materials: HashMap<Option<usize>, Rc<Material>>,
    geometries: HashMap<(usize, usize), Rc<Geometry>>,
    node_ids: HashMap<usize, NodeId>,
}

impl Converter<'_> {
    fn convert_node(&mut self, node: gltf::Node<'_>, parent: Option<NodeId>) {
        if self.node_ids.contains_key(&node.index()) {
            log::warn!(
                "glTF node {} in {} has more than one parent, keeping the first.",
                node.index(),
                self.location
            );
            return;
        }
        let (translation, rotation, scale) = node.transform().decomposed();
        let mut scene_node = SceneNode {
            name: node.name().map(str::to_string),
            local: Instance {
                position: translation.into(),
                rotation: rotation.into(),
                scale: scale.into(),
            },
            ..Default::default()
        };

        let mut attachments: Vec<MeshAttachment> = node
            .mesh()
            .map(|mesh| {
                mesh.primitives()
                    .map(|primitive| self.convert_primitive(&mesh, primitive))
                    .collect()
            })
            .unwrap_or_default();
        // a single primitive sits on the node, several become child nodes
        if attachments.len() == 1 {
            scene_node.mesh = attachments.pop();
        }

        let id = match parent {
            Some(parent) => self.scene.add_child(parent, scene_node),
            None => self.scene.add_root(scene_node),
        };
        self.node_ids.insert(node.index(), id);

        for (idx, attachment) in attachments.into_iter().enumerate() {
            let child = SceneNode {
                name: Some(format!("{}#{}", node.name().unwrap_or("primitive"), idx)),
                mesh: Some(attachment),
                ..Default::default()
            };
            self.scene.add_child(id, child);
        }

        for child in node.children() {
            self.convert_node(child, Some(id));
        }
    }

    fn convert_primitive(
        &mut self,
        mesh: &gltf::Mesh<'_>,
        primitive: gltf::Primitive<'_>,
    ) -> MeshAttachment {
        let key = (mesh.index(), primitive.index());
        let geometry = match self.geometries.get(&key) {
            Some(geometry) => geometry.clone(),
            None => {
                let buffers = self.buffers;
                let reader =
                    primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .map(|positions| positions.collect())
                    .unwrap_or_default();
                let normals: Vec<[f32; 3]> = reader
                    .read_normals()
                    .map(|normals| normals.collect())
                    .unwrap_or_default();
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|indices| indices.into_u32().collect())
                    .unwrap_or_default();
                let name = format!("{}/{}", mesh.name().unwrap_or("mesh"), primitive.index());
                let geometry = Rc::new(Geometry::new(name, positions, normals, indices));
                self.geometries.insert(key, geometry.clone());
                geometry
            }
        };
        let material = self.material(primitive.material());
        MeshAttachment {
            geometry,
            materials: vec![material],
        }
    }

    fn material(&mut self, material: gltf::Material<'_>) -> Rc<Material> {
        let location = self.location;
        self.materials
            .entry(material.index())
            .or_insert_with(|| {
                let pbr = material.pbr_metallic_roughness();
                let converted = Material::new(
                    material.name().unwrap_or("default"),
                    pbr.base_color_factor(),
                );
                let converted = match pbr
                    .base_color_texture()
                    .map(|info| info.texture().source().source())
                {
                    Some(gltf::image::Source::Uri { uri, .. }) => {
                        converted.with_texture(resolve_relative(location, uri))
                    }
                    Some(gltf::image::Source::View { view, .. }) => {
                        converted.with_texture(format!("{}#bufferView{}", location, view.index()))
                    }
                    None => converted,
                };
                Rc::new(converted)
            })
            .clone()
    }
}

fn read_animations(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    node_ids: &HashMap<usize, NodeId>,
    location: &str,
) -> Vec<AnimationClip> {
    let mut clips = Vec::new();
    for animation in document.animations() {
        let mut channels = Vec::new();
        for channel in animation.channels() {
            let target = channel.target().node().index();
            let Some(&node) = node_ids.get(&target) else {
                log::warn!(
                    "Animation channel {} in {} targets node {} outside the scene.",
                    channel.index(),
                    location,
                    target
                );
                continue;
            };
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let timestamps: Vec<f32> = reader
                .read_inputs()
                .map(|inputs| inputs.collect())
                .unwrap_or_default();
            let (cubic, interpolation) = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => (false, Interpolation::Step),
                gltf::animation::Interpolation::Linear => (false, Interpolation::Linear),
                gltf::animation::Interpolation::CubicSpline => (true, Interpolation::Linear),
            };
            let keyframes = match reader.read_outputs() {
                Some(ReadOutputs::Translations(translations)) => {
                    Keyframes::Translation(spline_values(translations.map(Vector3::from), cubic))
                }
                Some(ReadOutputs::Rotations(rotations)) => Keyframes::Rotation(spline_values(
                    rotations.into_f32().map(Quaternion::from),
                    cubic,
                )),
                Some(ReadOutputs::Scales(scales)) => {
                    Keyframes::Scale(spline_values(scales.map(Vector3::from), cubic))
                }
                Some(ReadOutputs::MorphTargetWeights(_)) | None => Keyframes::Other,
            };
            channels.push(Channel {
                node,
                keyframes,
                timestamps,
                interpolation,
            });
        }
        if !channels.is_empty() {
            clips.push(AnimationClip::new(
                animation.name().unwrap_or("Default"),
                channels,
            ));
        }
    }
    clips
}

// cubic-spline samplers store (in-tangent, value, out-tangent) per keyframe
fn spline_values<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}
