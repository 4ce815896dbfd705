#![allow(dead_code)]

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use cgmath::Vector3;
use flow_viewer::{
    ModelViewer, ViewConfig, ViewerEvent,
    backend::{BackendStats, HeadlessBackend},
    data_structures::{
        animation::{AnimationClip, Channel, Interpolation, Keyframes},
        instance::Instance,
        scene_graph::{Geometry, GeometryId, Material, MaterialId, SceneNode, SceneTree},
    },
    loading::LoadProgress,
    platform::PumpedPlatform,
    resources::{AssetLoader, LoadedAsset, ProgressFn},
};
use futures::{channel::oneshot, future::LocalBoxFuture};

type Reply = oneshot::Sender<anyhow::Result<LoadedAsset>>;

/// Loads whose results are handed in by the test, in any order.
#[derive(Clone, Default)]
pub struct LoadScript {
    pending: Rc<RefCell<Vec<(String, Reply)>>>,
}

impl LoadScript {
    pub fn pending_urls(&self) -> Vec<String> {
        self.pending
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Completes the oldest pending load of `url`.
    pub fn resolve(&self, url: &str, result: anyhow::Result<LoadedAsset>) {
        let mut pending = self.pending.borrow_mut();
        let index = pending
            .iter()
            .position(|(pending_url, _)| pending_url == url)
            .unwrap_or_else(|| panic!("no pending load for {}", url));
        let (_, reply) = pending.remove(index);
        assert!(reply.send(result).is_ok(), "load of {} was abandoned", url);
    }
}

pub struct ScriptedLoader {
    script: LoadScript,
}

impl ScriptedLoader {
    pub fn new() -> (Self, LoadScript) {
        let script = LoadScript::default();
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }
}

impl AssetLoader for ScriptedLoader {
    fn load(&self, url: &str, progress: ProgressFn) -> LocalBoxFuture<'static, anyhow::Result<LoadedAsset>> {
        let (reply, result) = oneshot::channel();
        self.script
            .pending
            .borrow_mut()
            .push((url.to_string(), reply));
        progress(LoadProgress {
            loaded: 0,
            total: None,
        });
        Box::pin(async move {
            result
                .await
                .unwrap_or_else(|_| Err(anyhow::anyhow!("load abandoned")))
        })
    }
}

/// A viewer wired to a scripted loader, a pumped platform and a headless backend.
pub struct Harness {
    pub viewer: ModelViewer,
    pub platform: PumpedPlatform,
    pub loads: LoadScript,
    pub stats: Rc<RefCell<BackendStats>>,
    pub events: Rc<RefCell<Vec<ViewerEvent>>>,
}

impl Harness {
    pub fn new(attributes: &[(&str, &str)]) -> Self {
        let (loader, loads) = ScriptedLoader::new();
        let platform = PumpedPlatform::new();
        let config = ViewConfig::from_attributes(attributes.iter().copied());
        let viewer = ModelViewer::new(config, loader, platform.clone());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        viewer.add_event_listener(move |event: &ViewerEvent| sink.borrow_mut().push(event.clone()));
        Self {
            viewer,
            platform,
            loads,
            stats: Rc::new(RefCell::new(BackendStats::default())),
            events,
        }
    }

    pub fn attached(attributes: &[(&str, &str)]) -> Self {
        let mut harness = Self::new(attributes);
        harness.attach();
        harness
    }

    /// Attaches a fresh headless backend and keeps its stats.
    pub fn attach(&mut self) {
        let backend = HeadlessBackend::new();
        self.stats = backend.stats();
        self.viewer.attach(Box::new(backend));
    }

    /// Completes a pending load and lets the viewer process the result.
    pub fn complete(&self, url: &str, result: anyhow::Result<LoadedAsset>) {
        self.loads.resolve(url, result);
        self.platform.run_until_stalled();
    }

    pub fn loaded_urls(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ViewerEvent::ModelLoaded(info) => Some(info.url.clone()),
                ViewerEvent::ModelError(_) => None,
            })
            .collect()
    }

    pub fn error_urls(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ViewerEvent::ModelError(failure) => Some(failure.url.clone()),
                ViewerEvent::ModelLoaded(_) => None,
            })
            .collect()
    }
}

/// Eight corners of an axis-aligned box, indexed as twelve triangles.
pub fn box_geometry(name: &str, min: [f32; 3], max: [f32; 3]) -> Rc<Geometry> {
    let mut positions = Vec::new();
    for &z in &[min[2], max[2]] {
        for &y in &[min[1], max[1]] {
            for &x in &[min[0], max[0]] {
                positions.push([x, y, z]);
            }
        }
    }
    let indices = vec![
        0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5, 0, 4, 5, 0, 5, 1, 2, 3, 7, 2, 7, 6, 0, 2, 6, 0, 6, 4, 1,
        5, 7, 1, 7, 3,
    ];
    Rc::new(Geometry::new(name, positions, Vec::new(), indices))
}

pub fn material(name: &str) -> Rc<Material> {
    Rc::new(Material::new(name, [1.0, 1.0, 1.0, 1.0]))
}

/// A single cube of edge `size` centered at the origin.
pub fn cube_asset(size: f32) -> LoadedAsset {
    let half = size / 2.0;
    let mut scene = SceneTree::new();
    scene.add_root(SceneNode::named("cube").with_mesh(
        box_geometry("cube", [-half; 3], [half; 3]),
        vec![material("cube")],
    ));
    LoadedAsset {
        scene,
        clips: Vec::new(),
    }
}

/// Weak references to everything a test asset owns.
#[derive(Default)]
pub struct Tracked {
    pub geometries: Vec<Weak<Geometry>>,
    pub materials: Vec<Weak<Material>>,
    pub geometry_ids: Vec<GeometryId>,
    pub material_ids: Vec<MaterialId>,
}

impl Tracked {
    pub fn all_dropped(&self) -> bool {
        self.geometries.iter().all(|g| g.upgrade().is_none())
            && self.materials.iter().all(|m| m.upgrade().is_none())
    }

    pub fn all_alive(&self) -> bool {
        self.geometries.iter().all(|g| g.upgrade().is_some())
            && self.materials.iter().all(|m| m.upgrade().is_some())
    }
}

/**
 * A root with `parts` mesh children. Every child has its own geometry; the
 * children alternate between two materials and the last one carries both.
 */
pub fn tracked_asset(parts: usize) -> (LoadedAsset, Tracked) {
    let mut tracked = Tracked::default();
    let mut scene = SceneTree::new();
    let root = scene.add_root(SceneNode::named("root"));
    let materials = [material("even"), material("odd")];
    for material in &materials {
        tracked.materials.push(Rc::downgrade(material));
        tracked.material_ids.push(material.id());
    }
    for part in 0..parts {
        let offset = part as f32 * 2.0;
        let geometry = box_geometry(
            &format!("part{}", part),
            [offset, 0.0, 0.0],
            [offset + 1.0, 1.0, 1.0],
        );
        tracked.geometries.push(Rc::downgrade(&geometry));
        tracked.geometry_ids.push(geometry.id());
        let assigned = if part + 1 == parts {
            materials.to_vec()
        } else {
            vec![materials[part % 2].clone()]
        };
        scene.add_child(root, SceneNode::named(format!("part{}", part)).with_mesh(geometry, assigned));
    }
    (
        LoadedAsset {
            scene,
            clips: Vec::new(),
        },
        tracked,
    )
}

/// A unit cube on a node that slides from x = 0 to x = 2 over one second.
pub fn sliding_asset() -> LoadedAsset {
    let mut scene = SceneTree::new();
    let node = scene.add_root(
        SceneNode::named("slider")
            .with_mesh(box_geometry("slider", [-0.5; 3], [0.5; 3]), vec![material("slider")])
            .with_transform(Instance::new()),
    );
    let clip = AnimationClip::new(
        "slide",
        vec![Channel {
            node,
            keyframes: Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)]),
            timestamps: vec![0.0, 1.0],
            interpolation: Interpolation::Linear,
        }],
    );
    LoadedAsset {
        scene,
        clips: vec![clip],
    }
}

/// Assembles a binary glTF container from its JSON and BIN chunks.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
