use std::rc::Rc;

use approx::assert_relative_eq;
use cgmath::{Point3, Transform};
use flow_viewer::{
    backend::HeadlessBackend,
    camera::CameraRig,
    data_structures::scene_graph::{SceneNode, SceneTree},
    lifecycle::{DisposalReport, ModelHandle, ResourceManager},
    loading::LoadCoordinator,
    resources::LoadedAsset,
};

use crate::common::test_utils::{Harness, box_geometry, cube_asset, material, tracked_asset};

mod common;

fn handle(coordinator: &mut LoadCoordinator, url: &str, asset: LoadedAsset) -> ModelHandle {
    ModelHandle::new(&coordinator.issue(url), asset)
}

#[test]
fn each_install_disposes_the_previous_model_exactly_once() {
    let backend = HeadlessBackend::new();
    let stats = backend.stats();
    let mut resources = ResourceManager::new();
    resources.attach_backend(Box::new(backend));
    let mut rig = CameraRig::new();
    let mut coordinator = LoadCoordinator::new();

    let (first, first_tracked) = tracked_asset(3);
    let (second, second_tracked) = tracked_asset(2);
    let (third, third_tracked) = tracked_asset(4);

    resources.install(handle(&mut coordinator, "1.glb", first), 1.0, &mut rig);
    assert!(first_tracked.all_alive());

    resources.install(handle(&mut coordinator, "2.glb", second), 1.0, &mut rig);
    assert!(first_tracked.all_dropped());
    assert!(second_tracked.all_alive());
    {
        let stats = stats.borrow();
        for id in &first_tracked.geometry_ids {
            assert_eq!(stats.geometry_disposals(*id), 1);
        }
        for id in &first_tracked.material_ids {
            assert_eq!(stats.material_disposals(*id), 1);
        }
        assert_eq!(stats.models.len(), 1);
    }

    resources.install(handle(&mut coordinator, "3.glb", third), 1.0, &mut rig);
    assert!(second_tracked.all_dropped());
    assert!(third_tracked.all_alive());

    let stats = stats.borrow();
    assert_eq!(stats.total_geometry_disposals(), 3 + 2);
    assert_eq!(stats.total_material_disposals(), 2 + 2);
    assert_eq!(stats.live_geometries.len(), 4);
    assert_eq!(stats.live_materials.len(), 2);
    assert_eq!(stats.models, vec![resources.active().unwrap().id()]);
}

#[test]
fn shared_resources_are_released_once() {
    let mut resources = ResourceManager::new();
    let backend = HeadlessBackend::new();
    let stats = backend.stats();
    resources.attach_backend(Box::new(backend));
    let mut coordinator = LoadCoordinator::new();

    let geometry = box_geometry("shared", [0.0; 3], [1.0; 3]);
    let paint = material("paint");
    let mut scene = SceneTree::new();
    let root = scene.add_root(SceneNode::named("root"));
    for name in ["a", "b", "c"] {
        scene.add_child(
            root,
            SceneNode::named(name).with_mesh(geometry.clone(), vec![paint.clone(), paint.clone()]),
        );
    }
    let (geometry_id, material_id) = (geometry.id(), paint.id());
    let (weak_geometry, weak_material) = (Rc::downgrade(&geometry), Rc::downgrade(&paint));
    drop((geometry, paint));

    resources.install(
        handle(&mut coordinator, "shared.glb", LoadedAsset { scene, clips: Vec::new() }),
        1.0,
        &mut CameraRig::new(),
    );
    let report = resources.uninstall().unwrap();
    assert_eq!(
        report,
        DisposalReport {
            nodes: 4,
            geometries: 1,
            materials: 1
        }
    );
    let stats = stats.borrow();
    assert_eq!(stats.geometry_disposals(geometry_id), 1);
    assert_eq!(stats.material_disposals(material_id), 1);
    assert!(weak_geometry.upgrade().is_none());
    assert!(weak_material.upgrade().is_none());
}

#[test]
fn diamond_and_cyclic_graphs_dispose_once() {
    let mut scene = SceneTree::new();
    let root = scene.add_root(SceneNode::named("root"));
    let left = scene.add_child(root, SceneNode::named("left"));
    let right = scene.add_child(root, SceneNode::named("right"));
    let bottom = scene.add_child(
        left,
        SceneNode::named("bottom").with_mesh(box_geometry("bottom", [0.0; 3], [1.0; 3]), vec![material("bottom")]),
    );
    assert!(scene.link(right, bottom));
    // back edge
    assert!(scene.link(bottom, root));
    assert_eq!(scene.walk().count(), 4);

    let backend = HeadlessBackend::new();
    let stats = backend.stats();
    let mut resources = ResourceManager::new();
    resources.attach_backend(Box::new(backend));
    resources.install(
        handle(&mut LoadCoordinator::new(), "diamond.glb", LoadedAsset { scene, clips: Vec::new() }),
        1.0,
        &mut CameraRig::new(),
    );

    let report = resources.uninstall().unwrap();
    assert_eq!(report.nodes, 4);
    assert_eq!(report.geometries, 1);
    assert_eq!(stats.borrow().total_geometry_disposals(), 1);
    assert_eq!(stats.borrow().total_material_disposals(), 1);
}

#[test]
fn teardown_is_idempotent() {
    let backend = HeadlessBackend::new();
    let stats = backend.stats();
    let mut resources = ResourceManager::new();
    resources.attach_backend(Box::new(backend));
    let (asset, tracked) = tracked_asset(2);
    resources.install(handle(&mut LoadCoordinator::new(), "a.glb", asset), 1.0, &mut CameraRig::new());

    resources.teardown_all();
    resources.teardown_all();
    assert!(resources.uninstall().is_none());

    assert!(tracked.all_dropped());
    assert!(!resources.has_backend());
    let stats = stats.borrow();
    assert_eq!(stats.dispose_calls, 1);
    assert_eq!(stats.total_geometry_disposals(), 2);
    assert!(stats.models.is_empty());
}

#[test]
fn install_without_backend_drops_the_model() {
    let mut resources = ResourceManager::new();
    let (asset, tracked) = tracked_asset(2);
    let framing = resources.install(handle(&mut LoadCoordinator::new(), "a.glb", asset), 1.0, &mut CameraRig::new());
    assert!(framing.is_none());
    assert!(resources.active().is_none());
    assert!(tracked.all_dropped());
}

#[test]
fn installed_model_is_scaled_and_centered() {
    let mut resources = ResourceManager::new();
    resources.attach_backend(Box::new(HeadlessBackend::new()));
    let mut rig = CameraRig::new();
    let (asset, _) = tracked_asset(1);

    let framing = resources
        .install(handle(&mut LoadCoordinator::new(), "a.glb", asset), 2.0, &mut rig)
        .unwrap();
    let model = resources.active().unwrap();
    assert_eq!(model.transform().scale, 2.0);
    assert_eq!(model.bounds().center(), Point3::new(0.5, 0.5, 0.5));

    let center = model.root_matrix().transform_point(model.bounds().center());
    assert_relative_eq!(center.x, 0.0, epsilon = 1e-6);
    assert_relative_eq!(center.y, 0.0, epsilon = 1e-6);
    assert_relative_eq!(center.z, 0.0, epsilon = 1e-6);
    assert_relative_eq!(rig.camera.position.z, framing.distance);
}

#[test]
fn detach_disposes_everything_and_allows_reattach() {
    let mut harness = Harness::attached(&[("model-url", "a.glb")]);
    let (asset, tracked) = tracked_asset(3);
    harness.complete("a.glb", Ok(asset));
    let first_stats = harness.stats.clone();
    assert!(harness.viewer.is_rendering());

    harness.viewer.detach();
    assert!(!harness.viewer.is_attached());
    assert!(!harness.viewer.is_rendering());
    assert!(harness.viewer.model_info().is_none());
    assert!(tracked.all_dropped());
    {
        let stats = first_stats.borrow();
        assert_eq!(stats.dispose_calls, 1);
        assert!(stats.models.is_empty());
        assert!(stats.live_geometries.is_empty());
        assert!(stats.live_materials.is_empty());
    }

    harness.viewer.detach();
    assert_eq!(first_stats.borrow().dispose_calls, 1);

    harness.attach();
    assert!(harness.viewer.is_rendering());
    harness.complete("a.glb", Ok(cube_asset(1.0)));
    assert_eq!(harness.loaded_urls(), vec!["a.glb", "a.glb"]);
    assert_eq!(harness.stats.borrow().models.len(), 1);
    assert!(!harness.stats.borrow().is_disposed());
}

#[test]
fn second_attach_is_ignored() {
    let harness = Harness::attached(&[("background", "#ff0000")]);
    let intruder = HeadlessBackend::new();
    let intruder_stats = intruder.stats();
    harness.viewer.attach(Box::new(intruder));

    assert!(intruder_stats.borrow().clear_colour.is_none());
    assert!(!harness.stats.borrow().is_disposed());
    assert_eq!(harness.platform.frame_subscribers(), 1);
}

#[test]
fn dropping_the_viewer_stops_pending_work() {
    let Harness {
        viewer,
        platform,
        loads,
        events,
        ..
    } = Harness::attached(&[("model-url", "a.glb")]);
    drop(viewer);
    assert_eq!(platform.frame_subscribers(), 0);

    loads.resolve("a.glb", Ok(cube_asset(1.0)));
    platform.run_until_stalled();
    assert!(events.borrow().is_empty());
}

#[test]
fn dropping_an_attached_viewer_disposes_its_model() {
    let harness = Harness::attached(&[("model-url", "a.glb")]);
    let (asset, tracked) = tracked_asset(3);
    harness.complete("a.glb", Ok(asset));
    let Harness { viewer, platform, stats, .. } = harness;
    assert_eq!(stats.borrow().live_geometries.len(), 3);

    drop(viewer);
    assert_eq!(platform.frame_subscribers(), 0);
    assert!(tracked.all_dropped());
    let stats = stats.borrow();
    assert_eq!(stats.dispose_calls, 1);
    assert!(stats.models.is_empty());
    assert!(stats.live_geometries.is_empty());
    assert!(stats.live_materials.is_empty());
}

#[test]
fn element_hooks_drive_the_viewer() {
    let harness = Harness::new(&[]);
    let mut hooks = harness.viewer.hooks();
    let backend = HeadlessBackend::new();
    let stats = backend.stats();

    (hooks.attribute_changed)("model-url", Some("a.glb"));
    (hooks.attached)(Box::new(backend));
    assert!(harness.viewer.is_attached());
    assert_eq!(harness.loads.pending_urls(), vec!["a.glb"]);

    harness.complete("a.glb", Ok(cube_asset(1.0)));
    assert_eq!(stats.borrow().models.len(), 1);

    (hooks.detached)();
    assert!(!harness.viewer.is_attached());
    assert!(stats.borrow().is_disposed());
}
