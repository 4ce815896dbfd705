//! Ownership of the installed model and its backend resources.
//!
//! The [`ResourceManager`] holds at most one [`ModelHandle`]. Installing a new
//! handle first removes the old one from the backend and disposes every
//! geometry and material of its scene graph, then adds the new one, applies
//! the configured scale and frames the camera. Disposal walks the scene with
//! [`SceneTree::walk`] and deduplicates resources by id, so shared meshes and
//! materials are released exactly once and cyclic or malformed graphs can't
//! cause a double dispose.
//!
//! # Key types
//!
//! - [`ModelHandle`] is a loaded model: scene graph, animation player and placement
//! - [`ResourceManager`] owns the active handle and the [`RenderBackend`]
//! - [`ModelInfo`] is the plain-data description sent to listeners

use std::{
    collections::HashSet,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{Matrix4, Rad, Vector3, Zero};
use instant::Duration;

use crate::{
    backend::RenderBackend,
    camera::{self, CameraRig, Framing},
    data_structures::{
        animation::AnimationPlayer,
        bounds::BoundingBox,
        scene_graph::SceneTree,
    },
    loading::{LoadRequest, RequestId},
    resources::LoadedAsset,
};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Placement of the model root in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
    /// Accumulated rotation around the Y axis, in radians.
    pub rotation_y: f32,
    pub scale: f32,
    /// Bounding-box center of the scaled model; the model is shifted by its negation.
    pub center_offset: Vector3<f32>,
}

impl ModelTransform {
    /// `R_y(rotation) * T(-center_offset) * S(scale)`: the model is scaled,
    /// centered on the origin and then spun in place.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_y(Rad(self.rotation_y))
            * Matrix4::from_translation(-self.center_offset)
            * Matrix4::from_scale(self.scale)
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            rotation_y: 0.0,
            scale: 1.0,
            center_offset: Vector3::zero(),
        }
    }
}

/// Description of an installed model, carried by the `model-loaded` event.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub id: ModelId,
    pub url: String,
    pub request: RequestId,
    pub nodes: usize,
    pub animations: Vec<String>,
    /// Model-space bounds, before scaling and centering.
    pub bounds: BoundingBox,
    pub framing: Framing,
}

/// A loaded model. Exclusively owned by the [`ResourceManager`] once installed.
#[derive(Debug)]
pub struct ModelHandle {
    id: ModelId,
    url: String,
    request: RequestId,
    scene: SceneTree,
    player: Option<AnimationPlayer>,
    transform: ModelTransform,
    bounds: BoundingBox,
}

impl ModelHandle {
    pub fn new(request: &LoadRequest, asset: LoadedAsset) -> Self {
        let LoadedAsset { scene, clips } = asset;
        let bounds = scene.bounding_box();
        Self {
            id: ModelId::next(),
            url: request.url.clone(),
            request: request.id,
            scene,
            player: AnimationPlayer::new(clips),
            transform: ModelTransform::default(),
            bounds,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scene(&self) -> &SceneTree {
        &self.scene
    }

    pub fn player(&self) -> Option<&AnimationPlayer> {
        self.player.as_ref()
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn root_matrix(&self) -> Matrix4<f32> {
        self.transform.to_matrix()
    }

    pub fn rotate_y(&mut self, delta: f32) {
        if delta.is_finite() {
            self.transform.rotation_y += delta;
        }
    }

    /// Advances the animation player, if any.
    pub fn advance(&mut self, dt: Duration) {
        if let Some(player) = self.player.as_mut() {
            player.advance(dt, &mut self.scene);
        }
    }

    /// Frames the model at its current scale.
    pub fn framing(&self, fovy: Rad<f32>) -> Framing {
        let scaled = self
            .bounds
            .transformed(&Matrix4::from_scale(self.transform.scale));
        camera::frame(&scaled, fovy)
    }

    /// Applies `scale` and re-centers the model. Returns the framing for the new size.
    pub fn set_scale(&mut self, scale: f32, fovy: Rad<f32>) -> Framing {
        self.transform.scale = scale;
        let framing = self.framing(fovy);
        self.transform.center_offset = framing.center_offset;
        framing
    }

    pub fn info(&self, framing: Framing) -> ModelInfo {
        ModelInfo {
            id: self.id,
            url: self.url.clone(),
            request: self.request,
            nodes: self.scene.walk().count(),
            animations: self
                .player
                .as_ref()
                .map(AnimationPlayer::clip_names)
                .unwrap_or_default(),
            bounds: self.bounds,
            framing,
        }
    }
}

/// What disposing one handle released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub nodes: usize,
    pub geometries: usize,
    pub materials: usize,
}

#[derive(Default)]
pub struct ResourceManager {
    active: Option<ModelHandle>,
    backend: Option<Box<dyn RenderBackend>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the manager a fresh backend. A previous backend is torn down first.
    pub fn attach_backend(&mut self, backend: Box<dyn RenderBackend>) {
        if self.backend.is_some() {
            log::warn!("Replacing a live render backend, tearing the old one down first.");
            self.teardown_all();
        }
        self.backend = Some(backend);
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_mut(&mut self) -> Option<&mut (dyn RenderBackend + 'static)> {
        self.backend.as_deref_mut()
    }

    pub fn active(&self) -> Option<&ModelHandle> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ModelHandle> {
        self.active.as_mut()
    }

    /// Borrows the active model and the backend at the same time.
    pub fn parts_mut(&mut self) -> (Option<&mut ModelHandle>, Option<&mut (dyn RenderBackend + 'static)>) {
        (self.active.as_mut(), self.backend.as_deref_mut())
    }

    /**
     * Replaces the active model with `handle`.
     *
     * The previous handle is removed and fully disposed before the new one is
     * added. The new model is scaled by `scale` and centered, and `rig` is
     * moved to frame it. Returns the applied framing, or `None` if there is
     * no backend to install into (the handle is dropped).
     */
    pub fn install(&mut self, mut handle: ModelHandle, scale: f32, rig: &mut CameraRig) -> Option<Framing> {
        let Some(backend) = self.backend.as_deref_mut() else {
            log::warn!(
                "No render backend attached, dropping {} loaded from {}.",
                handle.id(),
                handle.url()
            );
            return None;
        };
        if let Some(previous) = self.active.take() {
            dispose_handle(backend, previous);
        }

        let framing = handle.set_scale(scale, rig.projection.fovy);
        backend.add_model(handle.id(), handle.scene());
        rig.apply(&framing);
        log::info!(
            "Installed {} from {} ({} nodes, camera distance {:.3})",
            handle.id(),
            handle.url(),
            handle.scene().len(),
            framing.distance
        );
        self.active = Some(handle);
        Some(framing)
    }

    /// Removes and disposes the active model, if any.
    pub fn uninstall(&mut self) -> Option<DisposalReport> {
        let handle = self.active.take()?;
        match self.backend.as_deref_mut() {
            Some(backend) => Some(dispose_handle(backend, handle)),
            None => {
                log::warn!("{} outlived its backend, nothing left to dispose.", handle.id());
                None
            }
        }
    }

    /// Disposes the active model and the backend. Safe to call repeatedly.
    pub fn teardown_all(&mut self) {
        self.uninstall();
        if let Some(mut backend) = self.backend.take() {
            backend.dispose();
            log::info!("Render backend disposed");
        }
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("active", &self.active.as_ref().map(ModelHandle::id))
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

// consumes the handle so nothing can reach the disposed resources afterwards
fn dispose_handle(backend: &mut dyn RenderBackend, handle: ModelHandle) -> DisposalReport {
    backend.remove_model(handle.id());

    let mut report = DisposalReport::default();
    let mut geometries = HashSet::new();
    let mut materials = HashSet::new();
    for (_, node, _) in handle.scene().walk() {
        report.nodes += 1;
        let Some(mesh) = node.mesh.as_ref() else {
            continue;
        };
        if geometries.insert(mesh.geometry.id()) {
            backend.dispose_geometry(&mesh.geometry);
            report.geometries += 1;
        }
        for material in &mesh.materials {
            if materials.insert(material.id()) {
                backend.dispose_material(material);
                report.materials += 1;
            }
        }
    }
    log::info!(
        "Disposed {}: {} nodes, {} geometries, {} materials",
        handle.id(),
        report.nodes,
        report.geometries,
        report.materials
    );
    report
}
