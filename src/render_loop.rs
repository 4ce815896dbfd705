//! Per-frame driving of the viewer.
//!
//! The [`RenderLoop`] owns the [`TickHandle`] of the display-synchronised
//! callback and the timing between ticks. Each tick produces a short-lived
//! [`FrameContext`]; [`RenderLoop::step`] then advances the installed model
//! (auto-rotation, animation) and hands a composed frame to the backend.
//!
//! Ticks that arrive before the viewer is attached, or after it was
//! detached, do nothing. Stopping the loop drops the tick handle, after which
//! the platform delivers no further ticks.

use instant::{Duration, Instant};

use crate::{
    camera::CameraRig,
    config::ViewConfig,
    lifecycle::ResourceManager,
    platform::TickHandle,
    render::RenderFrame,
};

/// Timing of a single frame. Discarded after the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    pub now: Instant,
    /// Wall-clock time since the previous tick; zero on the first tick.
    pub dt: Duration,
}

#[derive(Debug, Default)]
pub struct RenderLoop {
    ticker: Option<TickHandle>,
    last_tick: Option<Instant>,
    frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, ticker: TickHandle) {
        if self.ticker.replace(ticker).is_some() {
            log::debug!("Render loop restarted, previous ticker cancelled.");
        }
        self.last_tick = None;
    }

    /// Cancels the ticker. No tick is delivered afterwards.
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            log::debug!("Render loop stopped after {} frames", self.frames);
        }
        self.last_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(TickHandle::is_active)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn begin_frame(&mut self, now: Instant) -> FrameContext {
        let dt = match self.last_tick {
            Some(last) if now > last => now.duration_since(last),
            _ => Duration::ZERO,
        };
        self.last_tick = Some(now);
        self.frames += 1;
        FrameContext { now, dt }
    }

    /**
     * Runs one frame: auto-rotation by `rotate_speed` radians, animation by
     * the elapsed time, then rendering. Without a backend there is nothing to
     * render into and the frame ends early.
     */
    pub fn step(frame: &FrameContext, config: &ViewConfig, resources: &mut ResourceManager, rig: &CameraRig) {
        if let Some(model) = resources.active_mut() {
            if config.auto_rotate {
                model.rotate_y(config.rotate_speed);
            }
            model.advance(frame.dt);
        }

        let (model, backend) = resources.parts_mut();
        let Some(backend) = backend else {
            return;
        };
        let render_frame = RenderFrame::compose(model.map(|model| &*model), rig, config.background.clear_colour());
        backend.render(&render_frame);
    }
}
