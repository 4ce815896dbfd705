//! Touch gesture disambiguation.
//!
//! A single-finger drag over the viewer can mean two things: scroll the page
//! or spin the model. The [`GestureDisambiguator`] watches the first samples
//! of a gesture and decides once which one the user wants:
//!
//! ```text
//! Idle --start(1 contact)--> Pending --moved past threshold--> ClaimedHorizontal
//!                                                         \--> CededVertical
//! any --end / cancel--> Idle
//! ```
//!
//! The decision is sticky for the rest of the gesture. A claimed gesture
//! suppresses the native default action and produces rotation deltas; a ceded
//! gesture is left alone so the page scrolls. Multi-touch streams are ignored.
//!
//! Every call takes the current touch coordinate explicitly; the state machine
//! never looks at anything but its arguments and its own state.

/// Tuning of the disambiguation. The defaults are empirically chosen UX values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Movement in device pixels before a decision is made.
    pub threshold: f32,
    /// How dominant horizontal movement has to be over vertical movement to claim the gesture.
    pub ratio: f32,
    /// Radians of model rotation per pixel of horizontal movement.
    pub sensitivity: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold: 15.0,
            ratio: 2.0,
            sensitivity: 0.01,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Pending,
    ClaimedHorizontal,
    CededVertical,
}

/// Bookkeeping of the one live single-touch gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureState {
    pub start_x: f32,
    pub start_y: f32,
    pub last_x: f32,
    pub phase: GesturePhase,
}

/// What the host should do with the touch event that was just processed.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GestureResponse {
    /// Suppress the native default action (page scrolling) for this event.
    pub prevent_default: bool,
    /// Rotation around the model's Y axis to apply, in radians.
    pub rotation_delta: Option<f32>,
}

impl GestureResponse {
    fn claimed(rotation_delta: f32) -> Self {
        Self {
            prevent_default: true,
            rotation_delta: Some(rotation_delta),
        }
    }
}

#[derive(Debug, Default)]
pub struct GestureDisambiguator {
    config: GestureConfig,
    state: Option<GestureState>,
}

impl GestureDisambiguator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn phase(&self) -> GesturePhase {
        self.state
            .map(|state| state.phase)
            .unwrap_or(GesturePhase::Idle)
    }

    pub fn state(&self) -> Option<&GestureState> {
        self.state.as_ref()
    }

    /**
     * A touch started; `contacts` is the number of fingers now on the surface.
     *
     * Only a single contact starts a gesture. A start while another gesture
     * is still live is ambiguous (a second finger, or a lost end event), so
     * the old gesture is discarded first.
     */
    pub fn touch_start(&mut self, contacts: usize, x: f32, y: f32) {
        if self.state.take().is_some() {
            log::debug!("Touch start during a live gesture, discarding the previous gesture.");
        }
        if contacts != 1 || !x.is_finite() || !y.is_finite() {
            return;
        }
        self.state = Some(GestureState {
            start_x: x,
            start_y: y,
            last_x: x,
            phase: GesturePhase::Pending,
        });
    }

    pub fn touch_move(&mut self, contacts: usize, x: f32, y: f32) -> GestureResponse {
        if contacts != 1 || !x.is_finite() || !y.is_finite() {
            return GestureResponse::default();
        }
        let config = self.config;
        let Some(state) = self.state.as_mut() else {
            return GestureResponse::default();
        };
        match state.phase {
            GesturePhase::Idle | GesturePhase::CededVertical => GestureResponse::default(),
            GesturePhase::Pending => {
                let delta_x = (x - state.start_x).abs();
                let delta_y = (y - state.start_y).abs();
                if delta_x <= config.threshold && delta_y <= config.threshold {
                    return GestureResponse::default();
                }
                if delta_x > config.ratio * delta_y && delta_x > config.threshold {
                    state.phase = GesturePhase::ClaimedHorizontal;
                    GestureResponse::claimed(rotate(state, x, config.sensitivity))
                } else {
                    state.phase = GesturePhase::CededVertical;
                    GestureResponse::default()
                }
            }
            GesturePhase::ClaimedHorizontal => {
                GestureResponse::claimed(rotate(state, x, config.sensitivity))
            }
        }
    }

    pub fn touch_end(&mut self) {
        self.state = None;
    }

    pub fn touch_cancel(&mut self) {
        self.state = None;
    }
}

// incremental: the delta is taken against the previous sample, not the start
fn rotate(state: &mut GestureState, x: f32, sensitivity: f32) -> f32 {
    let delta = (x - state.last_x) * sensitivity;
    state.last_x = x;
    delta
}
