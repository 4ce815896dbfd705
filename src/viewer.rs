//! The embeddable model viewer.
//!
//! [`ModelViewer`] is a cheap, cloneable handle to one viewer instance. It
//! wires the [`Context`] to the outside world: it starts loads on the
//! [`AssetLoader`], drives frames through the [`Platform`] and delivers
//! [`ViewerEvent`]s to registered listeners.
//!
//! # Lifecycle
//!
//! 1. Construct the viewer with its attributes, a loader and a platform
//! 2. [`ModelViewer::attach`] hands over a backend, starts the render loop and
//!    loads `model-url` if set
//! 3. Attribute changes, touch input and resizes arrive at any time
//! 4. [`ModelViewer::detach`] stops the loop, invalidates pending loads and
//!    disposes everything; the viewer may be attached again later. Dropping
//!    the last handle of an attached viewer detaches it as well
//!
//! Hosts that manage elements through callbacks instead of method calls can
//! take the [`ElementHooks`] of a viewer.
//!
//! # Re-entrancy
//!
//! Everything runs on one thread. State is borrowed only for the duration of
//! a single operation and events are dispatched after the borrow ended, so
//! listeners may call back into the viewer (for example to load another
//! model from a `model-error` handler).

use std::{
    cell::{Cell, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
};

use instant::Instant;
use winit::event::WindowEvent;

use crate::{
    backend::RenderBackend,
    camera::{Camera, Projection},
    config::{Attribute, ViewConfig},
    context::{AttributeEffect, Context},
    gesture::{GestureConfig, GesturePhase, GestureResponse},
    input::TouchInput,
    lifecycle::ModelInfo,
    loading::{LoadCoordinator, LoadRequest},
    platform::Platform,
    resources::{AssetLoader, LoadedAsset, ProgressFn},
};

pub use crate::context::ViewerEvent;

type Listener = Box<dyn FnMut(&ViewerEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Inner {
    ctx: RefCell<Context>,
    loader: Rc<dyn AssetLoader>,
    platform: Rc<dyn Platform>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    // removals requested while the listeners are out for dispatch
    removed: RefCell<Vec<ListenerId>>,
    dispatching: Cell<u32>,
    next_listener: Cell<u64>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let ctx = self.ctx.get_mut();
        if ctx.is_attached() {
            log::debug!("Viewer dropped while attached, detaching");
            ctx.detach();
        }
    }
}

#[derive(Clone)]
pub struct ModelViewer {
    inner: Rc<Inner>,
}

impl fmt::Debug for ModelViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.ctx.try_borrow() {
            Ok(ctx) => f.debug_struct("ModelViewer").field("ctx", &*ctx).finish(),
            Err(_) => f.write_str("ModelViewer { <busy> }"),
        }
    }
}

impl ModelViewer {
    /// The attribute names hosts should observe and forward to [`Self::attribute_changed`].
    pub const OBSERVED_ATTRIBUTES: [&'static str; 7] = [
        "width",
        "height",
        "model-url",
        "background",
        "auto-rotate",
        "rotate-speed",
        "scale",
    ];

    pub fn new(config: ViewConfig, loader: impl AssetLoader + 'static, platform: impl Platform + 'static) -> Self {
        Self::with_gesture_config(config, GestureConfig::default(), loader, platform)
    }

    pub fn with_gesture_config(
        config: ViewConfig,
        gesture_config: GestureConfig,
        loader: impl AssetLoader + 'static,
        platform: impl Platform + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                ctx: RefCell::new(Context::new(config, gesture_config)),
                loader: Rc::new(loader),
                platform: Rc::new(platform),
                listeners: RefCell::new(Vec::new()),
                removed: RefCell::new(Vec::new()),
                dispatching: Cell::new(0),
                next_listener: Cell::new(0),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn ctx(&self, operation: &str) -> Option<RefMut<'_, Context>> {
        match self.inner.ctx.try_borrow_mut() {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                log::warn!("{} called re-entrantly while the viewer is busy, ignoring it.", operation);
                None
            }
        }
    }

    /**
     * Starts the viewer on `backend`: pushes the configuration, begins the
     * render loop and loads `model-url` if one is set. Attaching an already
     * attached viewer is ignored.
     */
    pub fn attach(&self, backend: Box<dyn RenderBackend>) {
        let request = {
            let Some(mut ctx) = self.ctx("attach") else {
                return;
            };
            if ctx.is_attached() {
                log::warn!("Viewer is already attached, ignoring the new backend.");
                return;
            }
            let request = ctx.attach(backend);
            let weak = Rc::downgrade(&self.inner);
            let ticker = self.inner.platform.request_frames(Box::new(move |now| {
                if let Some(viewer) = Self::from_weak(&weak) {
                    viewer.tick(now);
                }
            }));
            ctx.render_loop.start(ticker);
            request
        };
        if let Some(request) = request {
            self.start_load(request);
        }
    }

    /// Stops the render loop, drops pending loads and disposes the model and the backend.
    pub fn detach(&self) {
        if let Some(mut ctx) = self.ctx("detach") {
            ctx.detach();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner
            .ctx
            .try_borrow()
            .map(|ctx| ctx.is_attached())
            .unwrap_or(false)
    }

    /// Forwards an attribute change. `None` means the attribute was removed.
    /// Unknown attribute names are ignored.
    pub fn attribute_changed(&self, name: &str, value: Option<&str>) {
        let Some(attribute) = Attribute::from_name(name) else {
            log::debug!("Ignoring unknown attribute `{}`", name);
            return;
        };
        let effect = match self.ctx("attribute_changed") {
            Some(mut ctx) => ctx.apply_attribute(attribute, value),
            None => return,
        };
        if let AttributeEffect::Load(request) = effect {
            self.start_load(request);
        }
    }

    /// Shorthand for setting `model-url`.
    pub fn load(&self, url: &str) {
        self.attribute_changed(Attribute::ModelUrl.name(), Some(url));
    }

    /// Frames the installed model again, or returns to the default view without one.
    pub fn reset_camera(&self) {
        if let Some(mut ctx) = self.ctx("reset_camera") {
            ctx.reset_camera();
        }
    }

    pub fn handle_touch(&self, input: TouchInput) -> GestureResponse {
        self.ctx("handle_touch")
            .map(|mut ctx| ctx.handle_touch(input))
            .unwrap_or_default()
    }

    /// Consumes the window events a native host receives from winit.
    pub fn handle_window_event(&self, event: &WindowEvent) -> GestureResponse {
        let Some(mut ctx) = self.ctx("handle_window_event") else {
            return GestureResponse::default();
        };
        match event {
            WindowEvent::Touch(touch) => {
                let input = ctx.touches.translate(touch);
                ctx.handle_touch(input)
            }
            WindowEvent::Resized(size) => {
                ctx.resize(size.width, size.height);
                GestureResponse::default()
            }
            _ => GestureResponse::default(),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        if let Some(mut ctx) = self.ctx("resize") {
            ctx.resize(width, height);
        }
    }

    /// Runs one frame. Called by the platform ticker; hosts with their own
    /// frame scheduling may call it directly.
    pub fn tick(&self, now: Instant) {
        match self.inner.ctx.try_borrow_mut() {
            Ok(mut ctx) => {
                ctx.frame(now);
            }
            Err(_) => log::debug!("Viewer busy, skipping a frame"),
        }
    }

    pub fn add_event_listener(&self, listener: impl FnMut(&ViewerEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Removing a listener from within a listener takes effect once the current dispatch ends.
    pub fn remove_event_listener(&self, id: ListenerId) {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        if listeners.len() == before && self.inner.dispatching.get() > 0 {
            self.inner.removed.borrow_mut().push(id);
        }
    }

    pub fn camera(&self) -> Camera {
        self.inner.ctx.borrow().rig.camera
    }

    pub fn projection(&self) -> Projection {
        self.inner.ctx.borrow().rig.projection
    }

    pub fn config(&self) -> ViewConfig {
        self.inner.ctx.borrow().config.clone()
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        let ctx = self.inner.ctx.borrow();
        let model = ctx.resources.active()?;
        Some(model.info(model.framing(ctx.rig.projection.fovy)))
    }

    /// Accumulated Y rotation of the installed model.
    pub fn model_rotation(&self) -> Option<f32> {
        self.inner
            .ctx
            .borrow()
            .resources
            .active()
            .map(|model| model.transform().rotation_y)
    }

    pub fn gesture_phase(&self) -> GesturePhase {
        self.inner.ctx.borrow().gestures.phase()
    }

    pub fn is_rendering(&self) -> bool {
        self.inner.ctx.borrow().render_loop.is_running()
    }

    pub fn frames(&self) -> u64 {
        self.inner.ctx.borrow().render_loop.frames()
    }

    /// Lifecycle callbacks for hosts that drive elements through registrations.
    pub fn hooks(&self) -> ElementHooks {
        let (attach, detach, changed) = (self.clone(), self.clone(), self.clone());
        ElementHooks {
            attached: Box::new(move |backend| attach.attach(backend)),
            detached: Box::new(move || detach.detach()),
            attribute_changed: Box::new(move |name, value| changed.attribute_changed(name, value)),
        }
    }

    fn start_load(&self, request: LoadRequest) {
        let progress_request = request.clone();
        let progress: ProgressFn = Rc::new(move |progress| {
            LoadCoordinator::report_progress(&progress_request, progress)
        });
        let future = self.inner.loader.load(&request.url, progress);
        let weak = Rc::downgrade(&self.inner);
        self.inner.platform.spawn_local(Box::pin(async move {
            let result = future.await;
            match Self::from_weak(&weak) {
                Some(viewer) => viewer.finish_load(&request, result),
                None => log::debug!("Viewer dropped before load {} finished", request.id),
            }
        }));
    }

    fn finish_load(&self, request: &LoadRequest, result: anyhow::Result<LoadedAsset>) {
        let event = match self.ctx("finish_load") {
            Some(mut ctx) => ctx.complete_load(request, result),
            None => return,
        };
        if let Some(event) = event {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &ViewerEvent) {
        // listeners may register further listeners while being called
        let mut listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        let depth = &self.inner.dispatching;
        depth.set(depth.get() + 1);
        for (_, listener) in listeners.iter_mut() {
            listener(event);
        }
        depth.set(depth.get() - 1);
        let mut registry = self.inner.listeners.borrow_mut();
        listeners.append(&mut registry);
        // an enclosing dispatch still holds listeners the removals may refer to
        if depth.get() == 0 {
            let removed = std::mem::take(&mut *self.inner.removed.borrow_mut());
            listeners.retain(|(id, _)| !removed.contains(id));
        }
        *registry = listeners;
    }
}

/// Element lifecycle as plain callbacks.
pub struct ElementHooks {
    pub attached: Box<dyn FnMut(Box<dyn RenderBackend>)>,
    pub detached: Box<dyn FnMut()>,
    pub attribute_changed: Box<dyn FnMut(&str, Option<&str>)>,
}

impl fmt::Debug for ElementHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ElementHooks")
    }
}
