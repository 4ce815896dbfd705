//! Per-viewer state.
//!
//! A [`Context`] bundles everything one viewer instance owns: its parsed
//! configuration, the gesture state machine, the load coordinator, the
//! resource manager with the backend, the camera and the render loop. All
//! methods are synchronous and side-effect free beyond the context itself
//! and its backend; scheduling and event delivery live in
//! [`ModelViewer`](crate::viewer::ModelViewer).

use std::rc::Rc;

use instant::Instant;

use crate::{
    backend::RenderBackend,
    camera::CameraRig,
    config::{Attribute, ViewConfig},
    error::LoadFailure,
    gesture::{GestureConfig, GestureDisambiguator, GestureResponse},
    input::{TouchInput, TouchTracker},
    lifecycle::{ModelHandle, ModelInfo, ResourceManager},
    loading::{LoadCoordinator, LoadOutcome, LoadRequest},
    render_loop::RenderLoop,
    resources::LoadedAsset,
};

/// What an attribute change asks the caller to do.
#[derive(Debug, PartialEq)]
pub enum AttributeEffect {
    None,
    /// A model load has to be started for this request.
    Load(LoadRequest),
}

/// Something listeners of the viewer should hear about.
#[derive(Clone, Debug)]
pub enum ViewerEvent {
    ModelLoaded(ModelInfo),
    ModelError(Rc<LoadFailure>),
}

impl ViewerEvent {
    pub const MODEL_LOADED: &'static str = "model-loaded";
    pub const MODEL_ERROR: &'static str = "model-error";

    /// The DOM event type.
    pub fn name(&self) -> &'static str {
        match self {
            ViewerEvent::ModelLoaded(_) => Self::MODEL_LOADED,
            ViewerEvent::ModelError(_) => Self::MODEL_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub config: ViewConfig,
    pub gestures: GestureDisambiguator,
    pub touches: TouchTracker,
    pub coordinator: LoadCoordinator,
    pub resources: ResourceManager,
    pub rig: CameraRig,
    pub render_loop: RenderLoop,
    attached: bool,
}

impl Context {
    pub fn new(config: ViewConfig, gesture_config: GestureConfig) -> Self {
        Self {
            config,
            gestures: GestureDisambiguator::new(gesture_config),
            touches: TouchTracker::new(),
            coordinator: LoadCoordinator::new(),
            resources: ResourceManager::new(),
            rig: CameraRig::new(),
            render_loop: RenderLoop::new(),
            attached: false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /**
     * Takes `backend` into service and pushes the current configuration to
     * it. Returns the load to start if a `model-url` is already configured.
     */
    pub fn attach(&mut self, mut backend: Box<dyn RenderBackend>) -> Option<LoadRequest> {
        backend.set_clear_colour(self.config.background.clear_colour());
        backend.apply_dimensions(&self.config.width, &self.config.height);
        self.resources.attach_backend(backend);
        self.rig.reset();
        self.attached = true;
        log::info!("Viewer attached");
        let url = self.config.model_url.clone()?;
        Some(self.coordinator.issue(&url))
    }

    /// Stops everything and releases all resources. The context can be attached again.
    pub fn detach(&mut self) {
        if !self.attached {
            log::debug!("Detach on a viewer that is not attached");
        }
        self.coordinator.invalidate();
        self.gestures.touch_cancel();
        self.touches = TouchTracker::new();
        self.render_loop.stop();
        self.resources.teardown_all();
        self.rig.reset();
        self.attached = false;
        log::info!("Viewer detached");
    }

    /// Stores an attribute value and applies its effect.
    pub fn apply_attribute(&mut self, attribute: Attribute, value: Option<&str>) -> AttributeEffect {
        let changed = self.config.apply(attribute, value);
        if !self.attached {
            return AttributeEffect::None;
        }
        match attribute {
            // always reload, setting the same URL again is how hosts retry
            Attribute::ModelUrl => match self.config.model_url.clone() {
                Some(url) => return AttributeEffect::Load(self.coordinator.issue(&url)),
                None => {
                    self.coordinator.invalidate();
                    self.resources.uninstall();
                    self.rig.reset();
                }
            },
            _ if !changed => (),
            Attribute::Width | Attribute::Height => {
                if let Some(backend) = self.resources.backend_mut() {
                    backend.apply_dimensions(&self.config.width, &self.config.height);
                }
            }
            Attribute::Background => {
                let colour = self.config.background.clear_colour();
                if let Some(backend) = self.resources.backend_mut() {
                    backend.set_clear_colour(colour);
                }
            }
            Attribute::Scale => {
                let (scale, fovy) = (self.config.scale, self.rig.projection.fovy);
                if let Some(model) = self.resources.active_mut() {
                    model.set_scale(scale, fovy);
                }
            }
            // read every frame
            Attribute::AutoRotate | Attribute::RotateSpeed => (),
        }
        AttributeEffect::None
    }

    /// Settles a finished load. Returns the event to emit, if any.
    pub fn complete_load(&mut self, request: &LoadRequest, result: anyhow::Result<LoadedAsset>) -> Option<ViewerEvent> {
        match self.coordinator.resolve(request, result) {
            LoadOutcome::Install(asset) => {
                let handle = ModelHandle::new(request, asset);
                let framing = self
                    .resources
                    .install(handle, self.config.scale, &mut self.rig)?;
                self.resources
                    .active()
                    .map(|model| ViewerEvent::ModelLoaded(model.info(framing)))
            }
            LoadOutcome::Failed(failure) => Some(ViewerEvent::ModelError(Rc::new(failure))),
            LoadOutcome::Stale => None,
        }
    }

    /// Frames the installed model again, or returns to the default view.
    pub fn reset_camera(&mut self) {
        match self.resources.active() {
            Some(model) => {
                let framing = model.framing(self.rig.projection.fovy);
                self.rig.apply(&framing);
            }
            None => self.rig.reset(),
        }
    }

    pub fn handle_touch(&mut self, input: TouchInput) -> GestureResponse {
        let response = match input {
            TouchInput::Start { contacts, x, y } => {
                self.gestures.touch_start(contacts, x, y);
                GestureResponse::default()
            }
            TouchInput::Move { contacts, x, y } => self.gestures.touch_move(contacts, x, y),
            TouchInput::End => {
                self.gestures.touch_end();
                GestureResponse::default()
            }
            TouchInput::Cancel => {
                self.gestures.touch_cancel();
                GestureResponse::default()
            }
        };
        if let (Some(delta), Some(model)) = (response.rotation_delta, self.resources.active_mut()) {
            model.rotate_y(delta);
        }
        response
    }

    /// Zero sizes (minimised windows, hidden elements) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.rig.resize(width, height);
        if let Some(backend) = self.resources.backend_mut() {
            backend.resize(width, height);
        }
    }

    /// Runs one frame. Returns `false` when the viewer is not attached.
    pub fn frame(&mut self, now: Instant) -> bool {
        if !self.attached {
            return false;
        }
        let frame = self.render_loop.begin_frame(now);
        RenderLoop::step(&frame, &self.config, &mut self.resources, &self.rig);
        true
    }
}
