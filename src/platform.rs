//! Scheduling seam between the viewer and its host.
//!
//! The viewer never blocks and never spawns threads. All it needs from the
//! host is a way to run model loads to completion on the current thread and a
//! display-synchronised tick. Both are provided by a [`Platform`]:
//!
//! - [`TokioPlatform`] for native hosts (requires a [`tokio::task::LocalSet`])
//! - [`PumpedPlatform`] for hosts with their own event loop, which pump
//!   futures and frames explicitly (the winit host, tests)
//! - `web::BrowserPlatform` for the web (`requestAnimationFrame`)
//!
//! Frame callbacks are owned by a [`TickHandle`]. Dropping the handle is the
//! only way to stop them and guarantees that no further tick is delivered.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use futures::{
    executor::{LocalPool, LocalSpawner},
    future::LocalBoxFuture,
    task::LocalSpawnExt,
};
use instant::Instant;

pub type FrameCallback = Box<dyn FnMut(Instant)>;

pub trait Platform {
    /// Runs `future` to completion on the viewer's thread.
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);

    /// Calls `callback` once per display refresh until the returned handle is dropped.
    fn request_frames(&self, callback: FrameCallback) -> TickHandle;
}

/// Cancellable periodic task. Ticks stop for good once the handle is dropped.
pub struct TickHandle {
    alive: Rc<Cell<bool>>,
    on_cancel: Option<Box<dyn FnOnce()>>,
}

impl TickHandle {
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
            on_cancel: None,
        }
    }

    /// Registers platform clean-up that runs when the handle is dropped.
    pub fn on_cancel(mut self, cancel: impl FnOnce() + 'static) -> Self {
        self.on_cancel = Some(Box::new(cancel));
        self
    }

    /// Shared flag that turns `false` on cancellation. Schedulers check it
    /// before every callback invocation.
    pub fn liveness(&self) -> Rc<Cell<bool>> {
        self.alive.clone()
    }

    pub fn is_active(&self) -> bool {
        self.alive.get()
    }
}

impl Default for TickHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.alive.set(false);
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHandle")
            .field("alive", &self.alive.get())
            .finish()
    }
}

/// Native platform on top of tokio's single-threaded task set.
///
/// Both methods call [`tokio::task::spawn_local`] and therefore have to be
/// used from within a [`tokio::task::LocalSet`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug)]
pub struct TokioPlatform {
    frame_interval: instant::Duration,
}

#[cfg(not(target_arch = "wasm32"))]
impl TokioPlatform {
    /// Ticks at roughly 60 Hz.
    pub fn new() -> Self {
        Self::with_frame_interval(instant::Duration::from_millis(16))
    }

    pub fn with_frame_interval(frame_interval: instant::Duration) -> Self {
        Self { frame_interval }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for TokioPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Platform for TokioPlatform {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(future);
    }

    fn request_frames(&self, mut callback: FrameCallback) -> TickHandle {
        let handle = TickHandle::new();
        let alive = handle.liveness();
        let frame_interval = self.frame_interval;
        let task = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !alive.get() {
                    break;
                }
                callback(Instant::now());
            }
        });
        handle.on_cancel(move || task.abort())
    }
}

type FrameSubscriber = (Rc<Cell<bool>>, FrameCallback);

struct Pump {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    frames: RefCell<Vec<FrameSubscriber>>,
}

/// A platform driven by its owner.
///
/// Spawned futures only make progress in [`PumpedPlatform::run_until_stalled`]
/// and frame callbacks only run in [`PumpedPlatform::fire_frame`]. Clones share
/// the same queues.
#[derive(Clone)]
pub struct PumpedPlatform {
    pump: Rc<Pump>,
}

impl PumpedPlatform {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pump: Rc::new(Pump {
                pool: RefCell::new(pool),
                spawner,
                frames: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Polls spawned futures until none of them can make progress.
    pub fn run_until_stalled(&self) {
        match self.pump.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => log::warn!("run_until_stalled called from within a pumped future, ignoring it."),
        }
    }

    /**
     * Delivers one tick to every live frame subscriber and returns how many
     * were called. Subscribers cancelled while the frame is delivered are
     * skipped; subscriptions made during it start with the next frame.
     */
    pub fn fire_frame(&self, now: Instant) -> usize {
        let mut frames = std::mem::take(&mut *self.pump.frames.borrow_mut());
        let mut delivered = 0;
        for (alive, callback) in frames.iter_mut() {
            if alive.get() {
                callback(now);
                delivered += 1;
            }
        }
        let mut registry = self.pump.frames.borrow_mut();
        frames.append(&mut registry);
        frames.retain(|(alive, _)| alive.get());
        *registry = frames;
        delivered
    }

    /// Number of frame subscriptions that have not been cancelled.
    pub fn frame_subscribers(&self) -> usize {
        self.pump
            .frames
            .borrow()
            .iter()
            .filter(|(alive, _)| alive.get())
            .count()
    }
}

impl Default for PumpedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PumpedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PumpedPlatform")
            .field("frame_subscribers", &self.frame_subscribers())
            .finish()
    }
}

impl Platform for PumpedPlatform {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.pump.spawner.spawn_local(future) {
            log::error!("Could not spawn a local task: {}", e);
        }
    }

    fn request_frames(&self, callback: FrameCallback) -> TickHandle {
        let handle = TickHandle::new();
        self.pump
            .frames
            .borrow_mut()
            .push((handle.liveness(), callback));
        handle
    }
}
