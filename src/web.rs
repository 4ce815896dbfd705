//! Browser bindings.
//!
//! - [`BrowserPlatform`] schedules frames with `requestAnimationFrame` and
//!   runs loads with `wasm-bindgen-futures`
//! - [`ElementBinding`] connects a viewer to its host element: touch listeners
//!   and DOM events
//! - [`StyledBackend`] applies `width` / `height` to the element's style
//!
//! Touch listeners are registered as non-passive so a claimed gesture can
//! suppress page scrolling with `preventDefault`. Viewer events are
//! re-dispatched as bubbling, composed `CustomEvent`s so they are observable
//! outside a shadow root.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::future::LocalBoxFuture;
use instant::Instant;
use wasm_bindgen::{JsCast, JsValue, prelude::Closure};
use web_sys::{AddEventListenerOptions, CustomEvent, CustomEventInit, EventTarget, HtmlElement, TouchEvent};

use crate::{
    backend::RenderBackend,
    context::ViewerEvent,
    data_structures::scene_graph::{Geometry, Material, SceneTree},
    input::TouchInput,
    lifecycle::ModelId,
    platform::{FrameCallback, Platform, TickHandle},
    render::RenderFrame,
    viewer::{ListenerId, ModelViewer},
};

type FrameSlot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserPlatform;

impl BrowserPlatform {
    pub fn new() -> Self {
        Self
    }
}

fn request_animation_frame(closure: &Closure<dyn FnMut()>) -> Option<i32> {
    let window = web_sys::window()?;
    match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        Ok(id) => Some(id),
        Err(e) => {
            log::error!("requestAnimationFrame failed: {:?}", e);
            None
        }
    }
}

impl Platform for BrowserPlatform {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(future);
    }

    fn request_frames(&self, mut callback: FrameCallback) -> TickHandle {
        let handle = TickHandle::new();
        let alive = handle.liveness();
        let slot: FrameSlot = Rc::new(RefCell::new(None));
        let frame_id = Rc::new(Cell::new(None));

        let next = slot.clone();
        let next_id = frame_id.clone();
        *slot.borrow_mut() = Some(Closure::new(move || {
            if !alive.get() {
                return;
            }
            callback(Instant::now());
            if !alive.get() {
                return;
            }
            if let Some(closure) = next.borrow().as_ref() {
                next_id.set(request_animation_frame(closure));
            }
        }));
        if let Some(closure) = slot.borrow().as_ref() {
            frame_id.set(request_animation_frame(closure));
        }

        handle.on_cancel(move || {
            if let (Some(window), Some(id)) = (web_sys::window(), frame_id.take()) {
                if let Err(e) = window.cancel_animation_frame(id) {
                    log::warn!("cancelAnimationFrame failed: {:?}", e);
                }
            }
            // the closure may be the one currently running, release it afterwards
            if let Ok(mut slot) = slot.try_borrow_mut() {
                let closure = slot.take();
                wasm_bindgen_futures::spawn_local(async move { drop(closure) });
            }
        })
    }
}

/// Dispatches `event` on `target` as a bubbling, composed `CustomEvent`.
///
/// The detail is the model URL for `model-loaded` and the error chain for
/// `model-error`.
pub fn dispatch_dom_event(target: &EventTarget, event: &ViewerEvent) -> Result<bool, JsValue> {
    let detail = match event {
        ViewerEvent::ModelLoaded(info) => JsValue::from_str(&info.url),
        ViewerEvent::ModelError(failure) => JsValue::from_str(&format!("{}: {:#}", failure, failure.cause)),
    };
    let init = CustomEventInit::new();
    init.set_bubbles(true);
    init.set_composed(true);
    init.set_detail(&detail);
    let dom_event = CustomEvent::new_with_event_init_dict(event.name(), &init)?;
    target.dispatch_event(&dom_event)
}

type TouchClosure = Closure<dyn FnMut(TouchEvent)>;

/// Non-passive touch listeners feeding a viewer. Removed on drop.
pub struct TouchBinding {
    element: HtmlElement,
    listeners: Vec<(&'static str, TouchClosure)>,
}

impl TouchBinding {
    pub fn new(viewer: &ModelViewer, element: &HtmlElement) -> Result<Self, JsValue> {
        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        let mut listeners = Vec::new();
        for event_type in ["touchstart", "touchmove", "touchend", "touchcancel"] {
            let viewer = viewer.clone();
            let closure = TouchClosure::new(move |event: TouchEvent| {
                let Some(input) = touch_input(&event) else {
                    return;
                };
                if viewer.handle_touch(input).prevent_default {
                    event.prevent_default();
                }
            });
            element.add_event_listener_with_callback_and_add_event_listener_options(
                event_type,
                closure.as_ref().unchecked_ref(),
                &options,
            )?;
            listeners.push((event_type, closure));
        }
        Ok(Self {
            element: element.clone(),
            listeners,
        })
    }
}

impl Drop for TouchBinding {
    fn drop(&mut self) {
        for (event_type, closure) in &self.listeners {
            if let Err(e) = self
                .element
                .remove_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref())
            {
                log::warn!("Could not remove the {} listener: {:?}", event_type, e);
            }
        }
    }
}

// coordinates in device pixels, like the gesture thresholds
fn touch_input(event: &TouchEvent) -> Option<TouchInput> {
    let touches = event.touches();
    let contacts = touches.length() as usize;
    let scale = web_sys::window()
        .map(|window| window.device_pixel_ratio() as f32)
        .unwrap_or(1.0);
    let position = || {
        touches
            .item(0)
            .map(|touch| (touch.client_x() as f32 * scale, touch.client_y() as f32 * scale))
    };
    match event.type_().as_str() {
        "touchstart" => position().map(|(x, y)| TouchInput::Start { contacts, x, y }),
        "touchmove" => position().map(|(x, y)| TouchInput::Move { contacts, x, y }),
        "touchend" => Some(TouchInput::End),
        "touchcancel" => Some(TouchInput::Cancel),
        _ => None,
    }
}

/// Everything that ties a viewer to its host element.
///
/// Create it when the element is connected, drop it when it is disconnected.
/// Dropping it removes the listeners and detaches the viewer, which disposes
/// the installed model and the backend.
pub struct ElementBinding {
    viewer: ModelViewer,
    listener: ListenerId,
    _touch: TouchBinding,
}

impl ElementBinding {
    pub fn new(viewer: &ModelViewer, element: &HtmlElement) -> Result<Self, JsValue> {
        let target: EventTarget = element.clone().into();
        let listener = viewer.add_event_listener(move |event| {
            if let Err(e) = dispatch_dom_event(&target, event) {
                log::error!("Could not dispatch {}: {:?}", event.name(), e);
            }
        });
        Ok(Self {
            viewer: viewer.clone(),
            listener,
            _touch: TouchBinding::new(viewer, element)?,
        })
    }
}

impl Drop for ElementBinding {
    fn drop(&mut self) {
        self.viewer.remove_event_listener(self.listener);
        if self.viewer.is_attached() {
            self.viewer.detach();
        }
    }
}

/// Wraps a backend and mirrors the `width` / `height` attributes onto the element style.
pub struct StyledBackend<B> {
    inner: B,
    element: HtmlElement,
}

impl<B: RenderBackend> StyledBackend<B> {
    pub fn new(inner: B, element: HtmlElement) -> Self {
        Self { inner, element }
    }
}

impl<B: RenderBackend> RenderBackend for StyledBackend<B> {
    fn add_model(&mut self, id: ModelId, scene: &SceneTree) {
        self.inner.add_model(id, scene);
    }

    fn remove_model(&mut self, id: ModelId) {
        self.inner.remove_model(id);
    }

    fn dispose_geometry(&mut self, geometry: &Geometry) {
        self.inner.dispose_geometry(geometry);
    }

    fn dispose_material(&mut self, material: &Material) {
        self.inner.dispose_material(material);
    }

    fn set_clear_colour(&mut self, colour: wgpu::Color) {
        self.inner.set_clear_colour(colour);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }

    fn apply_dimensions(&mut self, width: &str, height: &str) {
        let style = self.element.style();
        for (property, value) in [("width", width), ("height", height)] {
            if let Err(e) = style.set_property(property, value) {
                log::warn!("Could not set {} to {}: {:?}", property, value, e);
            }
        }
        self.inner.apply_dimensions(width, height);
    }

    fn render(&mut self, frame: &RenderFrame<'_>) {
        self.inner.render(frame);
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}
