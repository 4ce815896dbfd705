//! Native host: one viewer in a winit window.
//!
//! The event loop owns a [`PumpedPlatform`]. Pending loads are polled
//! whenever the loop is about to wait and a frame is delivered on every
//! redraw. Touch and resize events go straight to the viewer.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flow_viewer::{FileAssetLoader, HeadlessBackend, RenderBackend, ViewConfig, app};
//! use winit::window::Window;
//!
//! let config = ViewConfig::from_attributes([("model-url", "duck.glb"), ("auto-rotate", "")]);
//! let make_backend = |_window: &Arc<Window>| -> anyhow::Result<Box<dyn RenderBackend>> {
//!     Ok(Box::new(HeadlessBackend::new()))
//! };
//! app::run(config, FileAssetLoader::new(), Box::new(make_backend)).unwrap();
//! ```

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    backend::RenderBackend,
    config::ViewConfig,
    platform::PumpedPlatform,
    resources::AssetLoader,
    viewer::ModelViewer,
};

/// Creates the backend for a freshly opened window.
pub type BackendFactory = Box<dyn FnMut(&Arc<Window>) -> anyhow::Result<Box<dyn RenderBackend>>>;

pub struct ViewerApp {
    viewer: ModelViewer,
    platform: PumpedPlatform,
    make_backend: BackendFactory,
    window: Option<Arc<Window>>,
}

impl ViewerApp {
    pub fn new(config: ViewConfig, loader: impl AssetLoader + 'static, make_backend: BackendFactory) -> Self {
        let platform = PumpedPlatform::new();
        Self {
            viewer: ModelViewer::new(config, loader, platform.clone()),
            platform,
            make_backend,
            window: None,
        }
    }

    pub fn viewer(&self) -> &ModelViewer {
        &self.viewer
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes().with_title("flow-viewer");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create the viewer window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let backend = match (self.make_backend)(&window) {
            Ok(backend) => backend,
            Err(e) => {
                log::error!("Could not create the render backend: {:#}", e);
                event_loop.exit();
                return;
            }
        };
        let size = window.inner_size();
        self.viewer.attach(backend);
        self.viewer.resize(size.width, size.height);
        window.request_redraw();
        self.window = Some(window);
    }

    // the surface is gone on mobile platforms until the next resume
    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.viewer.detach();
        self.window = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.viewer.detach();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.platform.run_until_stalled();
                self.platform.fire_frame(Instant::now());
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            event => {
                self.viewer.handle_window_event(&event);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.platform.run_until_stalled();
    }
}

/// Opens a window showing one viewer and runs until it is closed.
pub fn run(config: ViewConfig, loader: impl AssetLoader + 'static, make_backend: BackendFactory) -> anyhow::Result<()> {
    crate::init_logging();
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = ViewerApp::new(config, loader, make_backend);
    event_loop.run_app(&mut app)?;
    Ok(())
}
