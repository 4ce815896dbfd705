use std::{cell::Cell, rc::Rc, time::Duration};

use approx::assert_relative_eq;
use flow_viewer::{
    platform::{Platform, PumpedPlatform, TickHandle, TokioPlatform},
    render_loop::RenderLoop,
};
use instant::Instant;

use crate::common::test_utils::{Harness, cube_asset, sliding_asset};

mod common;

#[test]
fn ticks_before_attach_do_nothing() {
    let harness = Harness::new(&[("auto-rotate", "")]);
    assert_eq!(harness.platform.frame_subscribers(), 0);
    assert_eq!(harness.platform.fire_frame(Instant::now()), 0);

    harness.viewer.tick(Instant::now());
    assert_eq!(harness.viewer.frames(), 0);
    assert!(!harness.viewer.is_rendering());
}

#[test]
fn attached_viewer_renders_every_frame() {
    let harness = Harness::attached(&[]);
    assert_eq!(harness.platform.frame_subscribers(), 1);
    assert!(harness.viewer.is_rendering());

    let start = Instant::now();
    assert_eq!(harness.platform.fire_frame(start), 1);
    assert_eq!(harness.stats.borrow().frames_rendered, 1);
    assert!(harness.stats.borrow().last_instances.is_empty());

    harness.viewer.load("cube.glb");
    harness.complete("cube.glb", Ok(cube_asset(1.0)));
    harness.platform.fire_frame(start + Duration::from_millis(16));
    let stats = harness.stats.borrow();
    assert_eq!(stats.frames_rendered, 2);
    assert_eq!(stats.last_instances.len(), 1);
    assert_eq!(harness.viewer.frames(), 2);
}

#[test]
fn auto_rotate_advances_by_rotate_speed_per_frame() {
    let harness = Harness::attached(&[("model-url", "cube.glb"), ("auto-rotate", ""), ("rotate-speed", "0.1")]);
    harness.complete("cube.glb", Ok(cube_asset(1.0)));

    let start = Instant::now();
    for frame in 0..3 {
        harness.platform.fire_frame(start + Duration::from_millis(16 * frame));
    }
    assert_relative_eq!(harness.viewer.model_rotation().unwrap(), 0.3, epsilon = 1e-6);

    harness.viewer.attribute_changed("auto-rotate", None);
    harness.platform.fire_frame(start + Duration::from_millis(64));
    assert_relative_eq!(harness.viewer.model_rotation().unwrap(), 0.3, epsilon = 1e-6);
}

#[test]
fn auto_rotate_is_off_by_default() {
    let harness = Harness::attached(&[("model-url", "cube.glb")]);
    harness.complete("cube.glb", Ok(cube_asset(1.0)));
    harness.platform.fire_frame(Instant::now());
    assert_eq!(harness.viewer.model_rotation(), Some(0.0));
}

#[test]
fn animations_follow_wall_clock_time() {
    let harness = Harness::attached(&[("model-url", "slide.glb")]);
    harness.complete("slide.glb", Ok(sliding_asset()));
    assert_eq!(harness.viewer.model_info().unwrap().animations, vec!["slide"]);

    let start = Instant::now();
    harness.platform.fire_frame(start);
    assert_relative_eq!(harness.stats.borrow().last_instances[0].model[3][0], 0.0, epsilon = 1e-5);

    harness.platform.fire_frame(start + Duration::from_millis(500));
    assert_relative_eq!(harness.stats.borrow().last_instances[0].model[3][0], 1.0, epsilon = 1e-4);

    // the clip loops after one second
    harness.platform.fire_frame(start + Duration::from_millis(1250));
    assert_relative_eq!(harness.stats.borrow().last_instances[0].model[3][0], 0.5, epsilon = 1e-3);
}

#[test]
fn detach_stops_ticks() {
    let harness = Harness::attached(&[]);
    harness.platform.fire_frame(Instant::now());
    harness.viewer.detach();

    assert_eq!(harness.platform.frame_subscribers(), 0);
    assert_eq!(harness.platform.fire_frame(Instant::now()), 0);
    assert_eq!(harness.stats.borrow().frames_rendered, 1);
    assert!(!harness.viewer.is_rendering());
}

#[test]
fn background_is_used_as_clear_colour() {
    let harness = Harness::attached(&[("background", "#00ff00")]);
    harness.platform.fire_frame(Instant::now());
    let colour = harness.stats.borrow().clear_colour.unwrap();
    assert_eq!((colour.r, colour.g, colour.b, colour.a), (0.0, 1.0, 0.0, 1.0));
}

#[test]
fn tick_handle_cancels_once() {
    let cancelled = Rc::new(Cell::new(0));
    let counter = cancelled.clone();
    let handle = TickHandle::new().on_cancel(move || counter.set(counter.get() + 1));
    let liveness = handle.liveness();
    assert!(handle.is_active());

    drop(handle);
    assert!(!liveness.get());
    assert_eq!(cancelled.get(), 1);
}

#[test]
fn pumped_platform_skips_cancelled_subscribers() {
    let platform = PumpedPlatform::new();
    let ticks = Rc::new(Cell::new(0));
    let counter = ticks.clone();
    let handle = platform.request_frames(Box::new(move |_| counter.set(counter.get() + 1)));

    platform.fire_frame(Instant::now());
    platform.fire_frame(Instant::now());
    drop(handle);
    assert_eq!(platform.fire_frame(Instant::now()), 0);
    assert_eq!(ticks.get(), 2);
}

#[test]
fn frame_timing_measures_time_between_ticks() {
    let mut render_loop = RenderLoop::new();
    let start = Instant::now();

    assert_eq!(render_loop.begin_frame(start).dt, Duration::ZERO);
    assert_eq!(
        render_loop.begin_frame(start + Duration::from_millis(16)).dt,
        Duration::from_millis(16)
    );
    // a clock going backwards never yields a negative step
    assert_eq!(render_loop.begin_frame(start).dt, Duration::ZERO);
    assert_eq!(render_loop.frames(), 3);

    render_loop.start(TickHandle::new());
    assert!(render_loop.is_running());
    assert_eq!(render_loop.begin_frame(start + Duration::from_secs(5)).dt, Duration::ZERO);
    render_loop.stop();
    assert!(!render_loop.is_running());
}

#[tokio::test]
async fn tokio_platform_stops_ticking_when_cancelled() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let platform = TokioPlatform::with_frame_interval(Duration::from_millis(1));
            let ticks = Rc::new(Cell::new(0));
            let counter = ticks.clone();
            let handle = platform.request_frames(Box::new(move |_| counter.set(counter.get() + 1)));

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert!(ticks.get() > 0);

            drop(handle);
            let after_cancel = ticks.get();
            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(ticks.get(), after_cancel);
        })
        .await;
}
