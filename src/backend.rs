//! The rendering backend seam.
//!
//! The viewer does not draw anything itself. It tells a [`RenderBackend`]
//! which models exist, which resources to release and what to draw each
//! frame. A GPU implementation uploads geometry in `add_model` and frees it in
//! the `dispose_*` calls; the [`HeadlessBackend`] shipped here only keeps
//! books, which is what tests and server-side hosts need.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use wgpu::Color;

use crate::{
    data_structures::{
        instance::InstanceRaw,
        scene_graph::{Geometry, GeometryId, Material, MaterialId, SceneTree},
    },
    lifecycle::ModelId,
    render::RenderFrame,
};

pub trait RenderBackend {
    /// A model was installed. Upload whatever the scene needs.
    fn add_model(&mut self, id: ModelId, scene: &SceneTree);

    /// The model leaves the render graph. Its resources are disposed right after.
    fn remove_model(&mut self, id: ModelId);

    /// Releases the GPU buffers of `geometry`. Called exactly once per geometry.
    fn dispose_geometry(&mut self, geometry: &Geometry);

    /// Releases `material` and its textures. Called exactly once per material.
    fn dispose_material(&mut self, material: &Material);

    fn set_clear_colour(&mut self, colour: Color);

    /// The drawing surface changed size, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// The host region's CSS-style dimensions changed (`width` / `height` attributes).
    fn apply_dimensions(&mut self, _width: &str, _height: &str) {}

    fn render(&mut self, frame: &RenderFrame<'_>);

    /// Releases the surface and everything else the backend still owns.
    fn dispose(&mut self);
}

/// Bookkeeping of a [`HeadlessBackend`].
#[derive(Clone, Debug, Default)]
pub struct BackendStats {
    pub models: Vec<ModelId>,
    pub live_geometries: HashSet<GeometryId>,
    pub live_materials: HashSet<MaterialId>,
    pub geometry_disposals: HashMap<GeometryId, usize>,
    pub material_disposals: HashMap<MaterialId, usize>,
    pub frames_rendered: usize,
    /// World transforms of the draw calls of the last rendered frame.
    pub last_instances: Vec<InstanceRaw>,
    pub clear_colour: Option<Color>,
    pub size: Option<(u32, u32)>,
    pub dimensions: Option<(String, String)>,
    pub dispose_calls: usize,
}

impl BackendStats {
    pub fn is_disposed(&self) -> bool {
        self.dispose_calls > 0
    }

    pub fn geometry_disposals(&self, id: GeometryId) -> usize {
        self.geometry_disposals.get(&id).copied().unwrap_or(0)
    }

    pub fn material_disposals(&self, id: MaterialId) -> usize {
        self.material_disposals.get(&id).copied().unwrap_or(0)
    }

    pub fn total_geometry_disposals(&self) -> usize {
        self.geometry_disposals.values().sum()
    }

    pub fn total_material_disposals(&self) -> usize {
        self.material_disposals.values().sum()
    }
}

/// A backend that draws nothing and records every call.
///
/// The stats are shared, so a host can keep a reader after handing the
/// backend itself to the viewer.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    stats: Rc<RefCell<BackendStats>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Rc<RefCell<BackendStats>> {
        self.stats.clone()
    }

    fn check_alive(&self, call: &str) {
        if self.stats.borrow().is_disposed() {
            log::warn!("{} called on a disposed backend", call);
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn add_model(&mut self, id: ModelId, scene: &SceneTree) {
        self.check_alive("add_model");
        let mut stats = self.stats.borrow_mut();
        stats.models.push(id);
        for (_, node, _) in scene.walk() {
            if let Some(mesh) = node.mesh.as_ref() {
                stats.live_geometries.insert(mesh.geometry.id());
                stats
                    .live_materials
                    .extend(mesh.materials.iter().map(|material| material.id()));
            }
        }
    }

    fn remove_model(&mut self, id: ModelId) {
        let mut stats = self.stats.borrow_mut();
        let before = stats.models.len();
        stats.models.retain(|model| *model != id);
        if stats.models.len() == before {
            log::warn!("remove_model: {} was never added", id);
        }
    }

    fn dispose_geometry(&mut self, geometry: &Geometry) {
        let mut stats = self.stats.borrow_mut();
        stats.live_geometries.remove(&geometry.id());
        let count = stats.geometry_disposals.entry(geometry.id()).or_insert(0);
        *count += 1;
        if *count > 1 {
            log::error!("Geometry {:?} ({}) disposed {} times", geometry.id(), geometry.name, count);
        }
    }

    fn dispose_material(&mut self, material: &Material) {
        let mut stats = self.stats.borrow_mut();
        stats.live_materials.remove(&material.id());
        let count = stats.material_disposals.entry(material.id()).or_insert(0);
        *count += 1;
        if *count > 1 {
            log::error!("Material {:?} ({}) disposed {} times", material.id(), material.name, count);
        }
    }

    fn set_clear_colour(&mut self, colour: Color) {
        self.stats.borrow_mut().clear_colour = Some(colour);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.stats.borrow_mut().size = Some((width, height));
    }

    fn apply_dimensions(&mut self, width: &str, height: &str) {
        self.stats.borrow_mut().dimensions = Some((width.to_string(), height.to_string()));
    }

    fn render(&mut self, frame: &RenderFrame<'_>) {
        self.check_alive("render");
        let mut stats = self.stats.borrow_mut();
        stats.frames_rendered += 1;
        stats.last_instances = frame.draws.iter().map(|draw| draw.instance).collect();
        stats.clear_colour = Some(frame.clear_colour);
    }

    fn dispose(&mut self) {
        let mut stats = self.stats.borrow_mut();
        if stats.is_disposed() {
            log::warn!("Backend disposed twice");
        }
        stats.dispose_calls += 1;
    }
}
