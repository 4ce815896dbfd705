//! Wavefront OBJ/MTL import into a [`SceneTree`].

use std::{
    io::{BufReader, Cursor},
    rc::Rc,
};

use crate::{
    data_structures::scene_graph::{Geometry, Material, SceneNode, SceneTree},
    resources::{
        LoadedAsset,
        fetch::{load_string, resolve_relative},
    },
};

/**
 * Parses an OBJ document. Referenced material libraries are fetched relative
 * to `location`; a missing library only costs the materials, not the model.
 *
 * OBJ has no scene hierarchy or animation: every object becomes a child of a
 * single root node.
 */
pub async fn parse_obj(text: &str, location: &str) -> anyhow::Result<LoadedAsset> {
    let mut obj_reader = BufReader::new(Cursor::new(text));
    let base = location.to_string();

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        move |p| {
            let path = resolve_relative(&base, &p);
            async move {
                match load_string(&path).await {
                    Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                    Err(e) => {
                        log::warn!("Material library {} could not be loaded: {:#}", path, e);
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await?;

    let materials: Vec<Rc<Material>> = match obj_materials {
        Ok(materials) => materials
            .into_iter()
            .map(|m| {
                let diffuse = m.diffuse.unwrap_or([1.0, 1.0, 1.0]);
                let material = Material::new(
                    m.name,
                    [diffuse[0], diffuse[1], diffuse[2], m.dissolve.unwrap_or(1.0)],
                );
                let material = match m.diffuse_texture {
                    Some(texture) => material.with_texture(resolve_relative(location, &texture)),
                    None => material,
                };
                Rc::new(material)
            })
            .collect(),
        Err(e) => {
            log::warn!("Materials of {} are unavailable ({}), using a default material.", location, e);
            Vec::new()
        }
    };

    let mut scene = SceneTree::new();
    let root_name = location
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(location)
        .to_string();
    let root = scene.add_root(SceneNode::named(root_name));
    // only created when an object lacks a usable material
    let mut fallback: Option<Rc<Material>> = None;

    for model in models {
        let mesh = model.mesh;
        let positions = mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let normals = mesh
            .normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect();
        let geometry = Rc::new(Geometry::new(&model.name, positions, normals, mesh.indices));
        let material = match mesh.material_id.and_then(|idx| materials.get(idx)) {
            Some(material) => material.clone(),
            None => fallback
                .get_or_insert_with(|| Rc::new(Material::new("default", [1.0, 1.0, 1.0, 1.0])))
                .clone(),
        };
        scene.add_child(root, SceneNode::named(model.name).with_mesh(geometry, vec![material]));
    }

    Ok(LoadedAsset {
        scene,
        clips: Vec::new(),
    })
}
